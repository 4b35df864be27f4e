//! Business logic services

pub mod baskets;
pub mod borrowers;
pub mod catalog;
pub mod checkout;
pub mod ledger;
pub mod loans;
pub mod locks;
pub mod sweep;

use std::sync::Arc;

use crate::{clock::Clock, config::CirculationConfig, models::loan::LoanPolicy, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub ledger: ledger::InventoryLedger,
    pub baskets: baskets::BasketService,
    pub checkout: checkout::CheckoutService,
    pub loans: loans::LoansService,
    pub borrowers: borrowers::BorrowersService,
    pub catalog: catalog::CatalogService,
    pub sweep: sweep::DelinquencySweep,
}

impl Services {
    /// Create all services over the given repository.
    ///
    /// Basket edits, checkouts, return reverts, reactivation and sweep
    /// assessment of one borrower share a single set of borrower locks.
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, config: &CirculationConfig) -> Self {
        let policy = LoanPolicy::from(config);
        let borrower_locks = Arc::new(locks::KeyedLocks::new());

        let ledger = ledger::InventoryLedger::new(repository.clone());
        let baskets = baskets::BasketService::new(
            repository.clone(),
            clock.clone(),
            policy.basket_ttl,
            borrower_locks.clone(),
        );

        Self {
            checkout: checkout::CheckoutService::new(
                repository.clone(),
                ledger.clone(),
                baskets.clone(),
                clock.clone(),
                policy.clone(),
                borrower_locks.clone(),
            ),
            loans: loans::LoansService::new(
                repository.clone(),
                ledger.clone(),
                clock.clone(),
                config,
                borrower_locks.clone(),
            ),
            borrowers: borrowers::BorrowersService::new(
                repository.clone(),
                clock.clone(),
                policy.clone(),
                borrower_locks.clone(),
            ),
            catalog: catalog::CatalogService::new(repository.clone(), clock.clone()),
            sweep: sweep::DelinquencySweep::new(
                repository,
                baskets.clone(),
                clock,
                policy,
                borrower_locks,
            ),
            ledger,
            baskets,
        }
    }
}
