//! Fiscal calendar setup and period closing.

use std::sync::Arc;

use chrono::{Days, Months, NaiveDate};
use tracing::info;
use fundbook_shared::types::{FiscalPeriodId, FiscalYearId};

use super::period::{FiscalPeriod, FiscalPeriodStatus, FiscalYear};
use crate::error::LedgerError;
use crate::guard::LedgerLocks;
use crate::ledger::ValidationError;
use crate::repository::LedgerRepository;

/// Builds twelve monthly periods starting at `start_date`.
///
/// # Errors
///
/// Fails if the calendar would run past chrono's date range.
pub fn monthly_periods(
    fiscal_year_id: FiscalYearId,
    start_date: NaiveDate,
) -> Result<Vec<FiscalPeriod>, ValidationError> {
    let out_of_range = || ValidationError::InvalidFiscalYear(start_date);

    (0..12u32)
        .map(|i| {
            let start = start_date
                .checked_add_months(Months::new(i))
                .ok_or_else(out_of_range)?;
            let end = start_date
                .checked_add_months(Months::new(i + 1))
                .and_then(|next| next.checked_sub_days(Days::new(1)))
                .ok_or_else(out_of_range)?;
            Ok(FiscalPeriod {
                id: FiscalPeriodId::new(),
                fiscal_year_id,
                period_number: i + 1,
                name: start.format("%B %Y").to_string(),
                start_date: start,
                end_date: end,
                status: FiscalPeriodStatus::Open,
            })
        })
        .collect()
}

/// Fiscal year setup and period closing.
pub struct FiscalCalendar<R: LedgerRepository> {
    repo: Arc<R>,
    locks: LedgerLocks,
}

impl<R: LedgerRepository> FiscalCalendar<R> {
    /// Create a new fiscal calendar service.
    #[must_use]
    pub fn new(repo: Arc<R>, locks: LedgerLocks) -> Self {
        Self { repo, locks }
    }

    /// Creates a fiscal year of twelve open monthly periods.
    pub async fn create_year(
        &self,
        name: impl Into<String>,
        start_date: NaiveDate,
    ) -> Result<(FiscalYear, Vec<FiscalPeriod>), LedgerError> {
        let id = FiscalYearId::new();
        let periods = monthly_periods(id, start_date)?;
        let end_date = periods
            .last()
            .map(|p| p.end_date)
            .ok_or(ValidationError::InvalidFiscalYear(start_date))?;

        let year = FiscalYear {
            id,
            name: name.into(),
            start_date,
            end_date,
        };
        self.repo.save_fiscal_year(year.clone()).await?;
        for period in &periods {
            self.repo.save_fiscal_period(period.clone()).await?;
        }

        info!(fiscal_year_id = %id, name = %year.name, %start_date, %end_date, "Fiscal year created");
        Ok((year, periods))
    }

    /// Closes a period. Every earlier period of the same year must already be
    /// closed. Closing a closed period is a no-op.
    pub async fn close_period(&self, id: FiscalPeriodId) -> Result<FiscalPeriod, LedgerError> {
        let _held = self.locks.period(id).await?;
        let mut period = self
            .repo
            .load_fiscal_period(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("fiscal period", id))?;
        if !period.is_open() {
            return Ok(period);
        }

        let siblings = self.repo.list_fiscal_periods(period.fiscal_year_id).await?;
        if siblings
            .iter()
            .any(|p| p.period_number < period.period_number && p.is_open())
        {
            return Err(ValidationError::EarlierPeriodsOpen(id).into());
        }

        period.status = FiscalPeriodStatus::Closed;
        self.repo.save_fiscal_period(period.clone()).await?;

        info!(
            fiscal_period_id = %id,
            period_number = period.period_number,
            "Fiscal period closed"
        );
        Ok(period)
    }

    /// Lists the periods of a year in order.
    pub async fn periods(&self, fiscal_year_id: FiscalYearId) -> Result<Vec<FiscalPeriod>, LedgerError> {
        Ok(self.repo.list_fiscal_periods(fiscal_year_id).await?)
    }
}
