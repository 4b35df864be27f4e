//! Data models for the circulation engine

pub mod basket;
pub mod borrower;
pub mod item;
pub mod loan;

// Re-export commonly used types
pub use basket::{Basket, BasketView};
pub use borrower::{Borrower, BorrowerSummary, Eligibility};
pub use item::{Item, ItemSummary};
pub use loan::{Loan, LoanDetails, LoanPolicy, LoanStatus};
