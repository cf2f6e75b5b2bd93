//! Fiscal period types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use fundbook_shared::types::{FiscalPeriodId, FiscalYearId};

/// Fiscal year definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYear {
    /// Unique identifier.
    pub id: FiscalYearId,
    /// Year name (e.g., "FY2026").
    pub name: String,
    /// Start date of the fiscal year.
    pub start_date: NaiveDate,
    /// End date of the fiscal year.
    pub end_date: NaiveDate,
}

/// Status of a fiscal period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiscalPeriodStatus {
    /// Period is open for posting.
    Open,
    /// Period is closed; its balances are final.
    Closed,
}

/// A fiscal period within a fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    /// Unique identifier.
    pub id: FiscalPeriodId,
    /// Fiscal year this period belongs to.
    pub fiscal_year_id: FiscalYearId,
    /// Period number within the year, starting at 1.
    pub period_number: u32,
    /// Period name (e.g., "January 2026").
    pub name: String,
    /// Start date of the period.
    pub start_date: NaiveDate,
    /// End date of the period.
    pub end_date: NaiveDate,
    /// Current status.
    pub status: FiscalPeriodStatus,
}

impl FiscalPeriod {
    /// Returns true if transactions can be posted to this period.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == FiscalPeriodStatus::Open
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn january() -> FiscalPeriod {
        FiscalPeriod {
            id: FiscalPeriodId::new(),
            fiscal_year_id: FiscalYearId::new(),
            period_number: 1,
            name: "January 2026".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            status: FiscalPeriodStatus::Open,
        }
    }

    #[test]
    fn test_contains_date_is_inclusive() {
        let period = january();
        assert!(period.contains_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
        assert!(period.contains_date(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));
        assert!(!period.contains_date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
        assert!(!period.contains_date(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
    }
}
