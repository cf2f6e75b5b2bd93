//! Double-entry transaction model.
//!
//! - Transaction lines (debits and credits)
//! - The transaction aggregate with settlement terms
//! - Pure business rule validation

pub mod entry;
pub mod transaction;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use entry::{EntryInput, EntrySide, TransactionEntry};
pub use transaction::{
    ApprovalRecord, Counterparty, NewSettlement, NewTransaction, Payment, Settlement,
    Transaction, TransactionKind, VoidRecord,
};
pub use validation::{
    validate_entries, validate_line_shape, validate_posting_period, EntryTotals, ValidationError,
};
