//! Loan model, status and fine policy

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::config::{CirculationConfig, MAX_BASKET_TTL_HOURS, MAX_LOAN_PERIOD_DAYS};

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Loan status.
///
/// Only `Borrowed` and `Returned` are ever stored. `Overdue` is what a
/// borrowed loan past its due date reports; it is used for display and
/// filtering and never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Borrowed,
    Returned,
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "borrowed" => Ok(LoanStatus::Borrowed),
            "returned" => Ok(LoanStatus::Returned),
            "overdue" => Ok(LoanStatus::Overdue),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as TEXT)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan model from storage
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: Uuid,
    pub item_ids: Vec<Uuid>,
    pub borrower_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: i64,
    pub status: LoanStatus,
}

impl Loan {
    /// Still out and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Borrowed && self.return_date.is_none() && self.due_date < now
    }

    /// Status as reported to readers
    pub fn observed_status(&self, now: DateTime<Utc>) -> LoanStatus {
        if self.is_overdue(now) {
            LoanStatus::Overdue
        } else {
            self.status
        }
    }
}

/// Data for a loan about to be written by a checkout
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub borrower_id: Uuid,
    pub item_ids: Vec<Uuid>,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Loan with computed status and fines for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: Uuid,
    pub item_ids: Vec<Uuid>,
    pub borrower_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    /// Fine charged at return time
    pub fine_amount: i64,
    pub status: LoanStatus,
    pub days_overdue: i64,
    /// Fine accruing right now on an unreturned loan
    pub accrued_fine: i64,
}

impl LoanDetails {
    pub fn new(loan: Loan, policy: &LoanPolicy, now: DateTime<Utc>) -> Self {
        let status = loan.observed_status(now);
        let (days_overdue, accrued_fine) = if status == LoanStatus::Overdue {
            let days = overdue_days(loan.due_date, now);
            (days, days * policy.fine_per_day)
        } else {
            (0, 0)
        };
        Self {
            id: loan.id,
            item_ids: loan.item_ids,
            borrower_id: loan.borrower_id,
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            fine_amount: loan.fine_amount,
            status,
            days_overdue,
            accrued_fine,
        }
    }
}

/// Loan listing query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    pub borrower_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Resolved listing filter handed to the repository
#[derive(Debug, Clone, PartialEq)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    pub borrower_id: Option<Uuid>,
    /// Reference time for the overdue split
    pub now: DateTime<Utc>,
    pub offset: i64,
    pub limit: i64,
}

impl LoanFilter {
    /// Whether a loan matches the status and borrower criteria
    pub fn matches(&self, loan: &Loan) -> bool {
        if let Some(borrower_id) = self.borrower_id {
            if loan.borrower_id != borrower_id {
                return false;
            }
        }
        match self.status {
            Some(status) => loan.observed_status(self.now) == status,
            None => true,
        }
    }
}

/// One page of loans
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanPage {
    pub loans: Vec<LoanDetails>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Administrative status correction request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLoanStatus {
    pub status: LoanStatus,
}

/// Loan period and fine rates
#[derive(Debug, Clone)]
pub struct LoanPolicy {
    pub loan_period: Duration,
    pub fine_per_day: i64,
    pub basket_ttl: Duration,
    pub fine_threshold: i64,
    pub max_overdue_days: i64,
}

impl LoanPolicy {
    pub fn due_date(&self, borrow_date: DateTime<Utc>) -> DateTime<Utc> {
        borrow_date + self.loan_period
    }

    /// Fine for a loan due at `due_date` and settled (or evaluated) at `at`
    pub fn fine(&self, due_date: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
        overdue_days(due_date, at) * self.fine_per_day
    }
}

impl From<&CirculationConfig> for LoanPolicy {
    fn from(config: &CirculationConfig) -> Self {
        Self {
            loan_period: Duration::days(config.loan_period_days.clamp(1, MAX_LOAN_PERIOD_DAYS)),
            fine_per_day: config.fine_per_day,
            basket_ttl: Duration::hours(config.basket_ttl_hours.clamp(1, MAX_BASKET_TTL_HOURS)),
            fine_threshold: config.fine_threshold,
            max_overdue_days: config.max_overdue_days,
        }
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self::from(&CirculationConfig::default())
    }
}

/// Started days between `due_date` and `at`; zero when `at` is not later
pub fn overdue_days(due_date: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let late_ms = (at - due_date).num_milliseconds();
    if late_ms <= 0 {
        0
    } else {
        (late_ms + DAY_MILLIS - 1) / DAY_MILLIS
    }
}
