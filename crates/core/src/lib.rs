//! General ledger posting and aggregation core for Fundbook.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence is reached only through [`repository::LedgerRepository`] and time
//! only through [`clock::Clock`].
//!
//! # Modules
//!
//! - `chart` - Chart of accounts
//! - `fiscal` - Fiscal years and periods
//! - `ledger` - Double-entry transactions and entry validation
//! - `workflow` - Transaction status lifecycle
//! - `balance` - Materialised account balances
//! - `budget` - Budgets, revisions and variance
//! - `reports` - Receivables aging

pub mod balance;
pub mod budget;
pub mod chart;
pub mod clock;
pub mod error;
pub mod fiscal;
pub mod guard;
pub mod ledger;
pub mod reports;
pub mod repository;
pub mod workflow;

mod facade;

pub use facade::LedgerCore;
pub use error::{ErrorCategory, LedgerError};
