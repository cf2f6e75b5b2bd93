//! Receivables aging report types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use fundbook_shared::types::{CustomerId, TransactionId};

/// Days-past-due range an outstanding amount falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    /// Not yet due.
    Current,
    /// 1 to 30 days past due.
    Days1To30,
    /// 31 to 60 days past due.
    Days31To60,
    /// 61 to 90 days past due.
    Days61To90,
    /// More than 90 days past due.
    Over90,
}

impl AgingBucket {
    /// All buckets, youngest first.
    pub const ALL: [Self; 5] = [
        Self::Current,
        Self::Days1To30,
        Self::Days31To60,
        Self::Days61To90,
        Self::Over90,
    ];

    /// Bucket for an amount `days_overdue` days past its due date.
    #[must_use]
    pub fn for_days_overdue(days_overdue: i64) -> Self {
        match days_overdue {
            i64::MIN..=0 => Self::Current,
            1..=30 => Self::Days1To30,
            31..=60 => Self::Days31To60,
            61..=90 => Self::Days61To90,
            _ => Self::Over90,
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Days1To30 => "1-30",
            Self::Days31To60 => "31-60",
            Self::Days61To90 => "61-90",
            Self::Over90 => "90+",
        }
    }
}

/// Outstanding amounts split by bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingBuckets {
    /// Not yet due.
    pub current: Decimal,
    /// 1 to 30 days past due.
    pub days_1_30: Decimal,
    /// 31 to 60 days past due.
    pub days_31_60: Decimal,
    /// 61 to 90 days past due.
    pub days_61_90: Decimal,
    /// More than 90 days past due.
    pub over_90: Decimal,
}

impl AgingBuckets {
    /// Adds `amount` to `bucket`.
    pub fn add(&mut self, bucket: AgingBucket, amount: Decimal) {
        *self.slot_mut(bucket) += amount;
    }

    /// Adds every bucket of `other`.
    pub fn merge(&mut self, other: &Self) {
        for bucket in AgingBucket::ALL {
            self.add(bucket, other.get(bucket));
        }
    }

    /// Amount in `bucket`.
    #[must_use]
    pub fn get(&self, bucket: AgingBucket) -> Decimal {
        match bucket {
            AgingBucket::Current => self.current,
            AgingBucket::Days1To30 => self.days_1_30,
            AgingBucket::Days31To60 => self.days_31_60,
            AgingBucket::Days61To90 => self.days_61_90,
            AgingBucket::Over90 => self.over_90,
        }
    }

    /// Sum over all buckets.
    #[must_use]
    pub fn total(&self) -> Decimal {
        AgingBucket::ALL.iter().map(|b| self.get(*b)).sum()
    }

    fn slot_mut(&mut self, bucket: AgingBucket) -> &mut Decimal {
        match bucket {
            AgingBucket::Current => &mut self.current,
            AgingBucket::Days1To30 => &mut self.days_1_30,
            AgingBucket::Days31To60 => &mut self.days_31_60,
            AgingBucket::Days61To90 => &mut self.days_61_90,
            AgingBucket::Over90 => &mut self.over_90,
        }
    }
}

/// One outstanding invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingLine {
    /// Invoice.
    pub transaction_id: TransactionId,
    /// Invoice date.
    pub transaction_date: NaiveDate,
    /// Due date.
    pub due_date: NaiveDate,
    /// Amount originally due.
    pub amount_due: Decimal,
    /// Amount received.
    pub amount_paid: Decimal,
    /// Amount still owed.
    pub outstanding: Decimal,
    /// Days past due (negative when not yet due).
    pub days_overdue: i64,
    /// Bucket of `outstanding`.
    pub bucket: AgingBucket,
}

/// Aging of one customer's invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAging {
    /// Customer.
    pub customer_id: CustomerId,
    /// Outstanding invoices, oldest due date first.
    pub invoices: Vec<AgingLine>,
    /// Bucket totals.
    pub buckets: AgingBuckets,
    /// Total outstanding.
    pub total: Decimal,
}

/// Receivables aging as of a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingReport {
    /// Report date.
    pub as_of: NaiveDate,
    /// Per-customer aging, ordered by customer.
    pub customers: Vec<CustomerAging>,
    /// Bucket totals over all customers.
    pub buckets: AgingBuckets,
    /// Total outstanding.
    pub total: Decimal,
}
