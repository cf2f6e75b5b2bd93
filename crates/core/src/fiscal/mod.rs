//! Fiscal year and period management.

pub mod period;
pub mod service;

pub use period::{FiscalPeriod, FiscalPeriodStatus, FiscalYear};
pub use service::{FiscalCalendar, monthly_periods};
