//! Budgets, revisions and budget-vs-actual variance.
//!
//! A budget's items are embedded in the budget record, so a revision is a
//! single version-checked write of the budget plus an appended revision.

pub mod allocation;
pub mod error;
pub mod revision;
pub mod service;
pub mod types;
pub mod variance;

#[cfg(test)]
mod tests;

pub use allocation::{check_distribution, resolve_distribution, spread_evenly};
pub use error::BudgetError;
pub use revision::{plan_revision, BudgetRevisionEngine, RevisionPlan};
pub use service::BudgetService;
pub use types::{
    AppliedChange, Budget, BudgetAction, BudgetChange, BudgetItem, BudgetRevision, BudgetStatus,
    NewBudget, NewBudgetItem, PeriodType,
};
pub use variance::{
    slot_periods, BudgetVariance, PeriodSelector, VarianceEngine, VarianceLine, VarianceReport,
    VarianceStatus,
};
