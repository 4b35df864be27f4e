//! Borrower eligibility model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;

/// Whether a borrower may check out new loans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Eligibility {
    Active,
    Inactive,
}

impl Eligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Eligibility::Active => "active",
            Eligibility::Inactive => "inactive",
        }
    }
}

impl Default for Eligibility {
    fn default() -> Self {
        Eligibility::Active
    }
}

impl std::fmt::Display for Eligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Eligibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Eligibility::Active),
            "inactive" => Ok(Eligibility::Inactive),
            _ => Err(format!("Invalid eligibility status: {}", s)),
        }
    }
}

// SQLx conversion for Eligibility
impl sqlx::Type<Postgres> for Eligibility {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Eligibility {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Eligibility {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Borrower model from storage
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrower {
    pub id: Uuid,
    pub eligibility_status: Eligibility,
    /// Fines recorded by the last deactivating sweep
    pub total_fines: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Borrower {
    pub fn is_active(&self) -> bool {
        self.eligibility_status == Eligibility::Active
    }
}

/// Register borrower request (sent by the identity service)
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RegisterBorrower {
    pub eligibility_status: Option<Eligibility>,
}

/// Loan counts and fines for one borrower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BorrowerSummary {
    pub borrower_id: Uuid,
    pub eligibility_status: Eligibility,
    pub total_fines: i64,
    pub total_loans: i64,
    /// Borrowed and not yet past due
    pub borrowed_loans: i64,
    pub overdue_loans: i64,
    pub returned_loans: i64,
    /// Fines charged on returned loans
    pub charged_fines: i64,
    /// Fines accruing on overdue loans right now
    pub accrued_fines: i64,
}
