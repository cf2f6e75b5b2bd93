//! Chart of accounts.
//!
//! Accounts are created once, then only toggled active/inactive or moved in
//! the parent tree. Accounts referenced by any entry are never deleted.

pub mod account;
pub mod service;

pub use account::{Account, AccountType, NewAccount, NormalBalance};
pub use service::ChartService;
