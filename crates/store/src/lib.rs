//! Reference persistence for the Fundbook ledger core.
//!
//! [`MemoryStore`] implements [`fundbook_core::repository::LedgerRepository`]
//! over in-process tables. Batch commits check every version expectation
//! before applying anything, matching what a transactional database backend
//! must provide.

mod memory;

pub use memory::MemoryStore;
