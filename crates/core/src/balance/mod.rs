//! Balance aggregation.
//!
//! Posted transactions are folded into (account, fiscal period, fund)
//! buckets. Each posting is journaled so that it can be applied once and
//! reversed exactly, and the buckets can be rebuilt from the posted log.

pub mod aggregator;
pub mod deltas;
pub mod types;

pub use aggregator::BalanceAggregator;
pub use deltas::{fold_entries, posting_lines};
pub use types::{
    AccountBalance, BalanceBucket, BalanceKey, BalanceMismatch, FundFilter, Idempotent,
    PostingLine, PostingRecord, RebuildReport, RunningBalance, TrialBalance, TrialBalanceLine,
};
