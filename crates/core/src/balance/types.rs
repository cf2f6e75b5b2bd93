//! Balance bucket, posting journal and report types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use fundbook_shared::types::{AccountId, FiscalPeriodId, FiscalYearId, FundId, TransactionId};

use crate::chart::AccountType;

/// Identity of a materialised balance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// The account.
    pub account_id: AccountId,
    /// The fiscal period.
    pub fiscal_period_id: FiscalPeriodId,
    /// Fund attribution, `None` for unrestricted amounts.
    pub fund_id: Option<FundId>,
}

/// Activity of one account in one fiscal period for one fund.
///
/// `net_change` is signed by the account's normal balance: positive values
/// increase the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBucket {
    /// The account.
    pub account_id: AccountId,
    /// Fiscal year of the period.
    pub fiscal_year_id: FiscalYearId,
    /// The fiscal period.
    pub fiscal_period_id: FiscalPeriodId,
    /// Fund attribution.
    pub fund_id: Option<FundId>,
    /// Sum of posted debits.
    pub debit_total: Decimal,
    /// Sum of posted credits.
    pub credit_total: Decimal,
    /// Normal-signed net activity.
    pub net_change: Decimal,
    /// Optimistic concurrency counter.
    pub version: u64,
    /// Last write time.
    pub last_updated: DateTime<Utc>,
}

impl BalanceBucket {
    /// An unsaved bucket with zero activity.
    #[must_use]
    pub fn empty(key: BalanceKey, fiscal_year_id: FiscalYearId, now: DateTime<Utc>) -> Self {
        Self {
            account_id: key.account_id,
            fiscal_year_id,
            fiscal_period_id: key.fiscal_period_id,
            fund_id: key.fund_id,
            debit_total: Decimal::ZERO,
            credit_total: Decimal::ZERO,
            net_change: Decimal::ZERO,
            version: 0,
            last_updated: now,
        }
    }

    /// The bucket's key.
    #[must_use]
    pub fn key(&self) -> BalanceKey {
        BalanceKey {
            account_id: self.account_id,
            fiscal_period_id: self.fiscal_period_id,
            fund_id: self.fund_id,
        }
    }

    /// Adds (or, with `reverse`, subtracts) a posting line.
    pub fn apply(&mut self, line: &PostingLine, reverse: bool) {
        if reverse {
            self.debit_total -= line.debit;
            self.credit_total -= line.credit;
            self.net_change -= line.net_change;
        } else {
            self.debit_total += line.debit;
            self.credit_total += line.credit;
            self.net_change += line.net_change;
        }
    }

    /// Returns true if the bucket carries no activity.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.debit_total.is_zero() && self.credit_total.is_zero() && self.net_change.is_zero()
    }

    /// Returns true if the totals equal those of `other`.
    #[must_use]
    pub fn same_totals(&self, other: &Self) -> bool {
        self.debit_total == other.debit_total
            && self.credit_total == other.credit_total
            && self.net_change == other.net_change
    }
}

/// The delta one posting applies to one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingLine {
    /// The account.
    pub account_id: AccountId,
    /// Fiscal year of the period.
    pub fiscal_year_id: FiscalYearId,
    /// The fiscal period.
    pub fiscal_period_id: FiscalPeriodId,
    /// Fund attribution.
    pub fund_id: Option<FundId>,
    /// Debits folded into this line.
    pub debit: Decimal,
    /// Credits folded into this line.
    pub credit: Decimal,
    /// Normal-signed net change.
    pub net_change: Decimal,
}

impl PostingLine {
    /// Key of the bucket this line updates.
    #[must_use]
    pub fn key(&self) -> BalanceKey {
        BalanceKey {
            account_id: self.account_id,
            fiscal_period_id: self.fiscal_period_id,
            fund_id: self.fund_id,
        }
    }
}

/// Journal record of one applied posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRecord {
    /// Posted transaction.
    pub transaction_id: TransactionId,
    /// Exact deltas applied, sorted by key.
    pub lines: Vec<PostingLine>,
    /// When the deltas were applied.
    pub applied_at: DateTime<Utc>,
    /// When the deltas were reversed, if ever.
    pub reversed_at: Option<DateTime<Utc>>,
}

impl PostingRecord {
    /// Returns true if the posting has been reversed.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.reversed_at.is_some()
    }
}

/// Outcome of an operation that may already have been performed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Idempotent<T> {
    /// The operation ran.
    Executed(T),
    /// The operation had already run; nothing was written.
    Ignored,
}

impl<T> Idempotent<T> {
    /// Returns true if the operation was skipped.
    pub fn was_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

/// Selects which fund buckets a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fund_id", rename_all = "snake_case")]
pub enum FundFilter {
    /// Every bucket regardless of fund.
    #[default]
    All,
    /// Only unrestricted buckets.
    Unrestricted,
    /// Only buckets of one fund.
    Fund(FundId),
}

impl FundFilter {
    /// Returns true if a bucket with `fund_id` is selected.
    #[must_use]
    pub fn matches(self, fund_id: Option<FundId>) -> bool {
        match self {
            Self::All => true,
            Self::Unrestricted => fund_id.is_none(),
            Self::Fund(id) => fund_id == Some(id),
        }
    }
}

impl From<Option<FundId>> for FundFilter {
    fn from(fund_id: Option<FundId>) -> Self {
        fund_id.map_or(Self::Unrestricted, Self::Fund)
    }
}

/// Balance of one account in one period, as read by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account.
    pub account_id: AccountId,
    /// Fiscal year; `None` when the period is unknown.
    pub fiscal_year_id: Option<FiscalYearId>,
    /// Fiscal period.
    pub fiscal_period_id: FiscalPeriodId,
    /// Fund attribution.
    pub fund_id: Option<FundId>,
    /// Cumulative balance before this period within the fiscal year.
    pub opening_balance: Decimal,
    /// Opening balance plus this period's activity.
    pub current_balance: Decimal,
    /// Final balance, present once the period is closed.
    pub closing_balance: Option<Decimal>,
    /// Last write to the period's bucket.
    pub last_updated: Option<DateTime<Utc>>,
}

/// One step in a per-period running balance chain.
///
/// `previous_balance[n] == current_balance[n - 1]` and
/// `current_balance[n] == previous_balance[n] + net_change[n]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    /// Fiscal period.
    pub fiscal_period_id: FiscalPeriodId,
    /// Period number within the year.
    pub period_number: u32,
    /// Balance before the period.
    pub previous_balance: Decimal,
    /// Net activity in the period.
    pub net_change: Decimal,
    /// Balance after the period.
    pub current_balance: Decimal,
}

impl RunningBalance {
    /// First link of the chain.
    #[must_use]
    pub fn first_period(fiscal_period_id: FiscalPeriodId, period_number: u32, net_change: Decimal) -> Self {
        Self {
            fiscal_period_id,
            period_number,
            previous_balance: Decimal::ZERO,
            net_change,
            current_balance: net_change,
        }
    }

    /// Next link after `previous`.
    #[must_use]
    pub fn next_period(
        previous: &Self,
        fiscal_period_id: FiscalPeriodId,
        period_number: u32,
        net_change: Decimal,
    ) -> Self {
        Self {
            fiscal_period_id,
            period_number,
            previous_balance: previous.current_balance,
            net_change,
            current_balance: previous.current_balance + net_change,
        }
    }
}

/// A trial balance line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    /// Account ID.
    pub account_id: AccountId,
    /// Account number.
    pub number: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Balance shown in the debit column.
    pub debit_balance: Decimal,
    /// Balance shown in the credit column.
    pub credit_balance: Decimal,
}

/// Trial balance report as of the end of a fiscal period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    /// Fiscal year.
    pub fiscal_year_id: FiscalYearId,
    /// Period the balances run through.
    pub fiscal_period_id: FiscalPeriodId,
    /// Accounts with a non-zero balance, by account number.
    pub lines: Vec<TrialBalanceLine>,
    /// Total of the debit column.
    pub total_debits: Decimal,
    /// Total of the credit column.
    pub total_credits: Decimal,
}

impl TrialBalance {
    /// Returns true if the columns agree.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_debits == self.total_credits
    }
}

/// A stored bucket disagreeing with the posted-entry log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceMismatch {
    /// The bucket.
    pub key: BalanceKey,
    /// Stored debit total.
    pub stored_debit: Decimal,
    /// Stored credit total.
    pub stored_credit: Decimal,
    /// Debit total recomputed from the log.
    pub expected_debit: Decimal,
    /// Credit total recomputed from the log.
    pub expected_credit: Decimal,
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Accounts scanned.
    pub accounts_checked: usize,
    /// Stored buckets compared against the log.
    pub buckets_checked: usize,
    /// Buckets that were missing and have been restored.
    pub buckets_restored: usize,
}
