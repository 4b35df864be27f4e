//! Delinquency sweep: deactivates borrowers with heavy or long overdue loans

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::oneshot, task::JoinHandle, time::MissedTickBehavior};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{baskets::BasketService, locks::KeyedLocks};
use crate::{
    clock::Clock,
    error::AppResult,
    models::loan::{overdue_days, LoanPolicy},
    repository::Repository,
};

/// Outcome of one sweep run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    pub scanned: usize,
    pub deactivated: usize,
    pub failed: usize,
    pub purged_baskets: u64,
}

#[derive(Clone)]
pub struct DelinquencySweep {
    repository: Repository,
    baskets: BasketService,
    clock: Arc<dyn Clock>,
    policy: LoanPolicy,
    borrower_locks: Arc<KeyedLocks>,
}

impl DelinquencySweep {
    pub fn new(
        repository: Repository,
        baskets: BasketService,
        clock: Arc<dyn Clock>,
        policy: LoanPolicy,
        borrower_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            repository,
            baskets,
            clock,
            policy,
            borrower_locks,
        }
    }

    /// Assess every borrower once. A failing borrower is logged and skipped.
    pub async fn run(&self) -> AppResult<SweepReport> {
        let now = self.clock.now();
        let borrower_ids = self.repository.borrowers.list_ids().await?;
        let mut report = SweepReport {
            scanned: borrower_ids.len(),
            ..SweepReport::default()
        };

        tracing::info!("Delinquency sweep started over {} borrower(s)", report.scanned);

        for borrower_id in borrower_ids {
            match self.assess(borrower_id, now).await {
                Ok(true) => report.deactivated += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(borrower_id = %borrower_id, "Sweep skipped borrower: {}", e);
                }
            }
        }

        match self.baskets.purge_expired().await {
            Ok(purged) => report.purged_baskets = purged,
            Err(e) => tracing::warn!("Expired basket purge failed: {}", e),
        }

        tracing::info!(
            deactivated = report.deactivated,
            failed = report.failed,
            purged_baskets = report.purged_baskets,
            "Delinquency sweep finished"
        );
        Ok(report)
    }

    /// Returns whether the borrower was deactivated
    async fn assess(&self, borrower_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        // The overdue set must not go stale before the deactivation lands
        let _guard = self.borrower_locks.lock(borrower_id).await;

        let overdue = self
            .repository
            .loans
            .overdue_for_borrower(borrower_id, now)
            .await?;
        if overdue.is_empty() {
            return Ok(false);
        }

        let days: Vec<i64> = overdue
            .iter()
            .map(|loan| overdue_days(loan.due_date, now))
            .collect();
        let total_fine = days.iter().sum::<i64>() * self.policy.fine_per_day;
        let longest = days.iter().copied().max().unwrap_or(0);

        tracing::debug!(
            borrower_id = %borrower_id,
            overdue_loans = overdue.len(),
            total_fine,
            "Overdue loans found"
        );

        if total_fine > self.policy.fine_threshold || longest > self.policy.max_overdue_days {
            self.repository
                .borrowers
                .deactivate(borrower_id, total_fine, now)
                .await?;
            tracing::info!(
                borrower_id = %borrower_id,
                total_fine,
                longest_overdue_days = longest,
                "Borrower deactivated for overdue loans"
            );
            return Ok(true);
        }
        Ok(false)
    }
}

/// Background task running the sweep on a fixed period
pub struct SweepTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Start sweeping; the first run happens one period from now
    pub fn start(sweep: DelinquencySweep, period: StdDuration) -> Self {
        let (shutdown, mut stop) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => {
                        if let Err(e) = sweep.run().await {
                            tracing::error!("Delinquency sweep failed: {}", e);
                        }
                    }
                }
            }
            tracing::info!("Delinquency sweep task stopped");
        });
        Self { shutdown, handle }
    }

    /// Stop the task and wait for a run in progress to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::error!("Delinquency sweep task panicked: {}", e);
        }
    }
}
