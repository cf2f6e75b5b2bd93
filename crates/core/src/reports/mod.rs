//! Receivables aging.
//!
//! Aging is derived on demand from posted invoices and their payments; nothing
//! is materialised.

pub mod aging;
pub mod types;


pub use aging::{build_aging_report, AgingEngine};
pub use types::*;
