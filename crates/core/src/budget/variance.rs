//! Budget vs actual variance.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use fundbook_shared::types::{AccountId, BudgetId, BudgetItemId, FiscalPeriodId};

use super::error::BudgetError;
use super::types::{Budget, BudgetItem};
use crate::balance::{BalanceAggregator, FundFilter};
use crate::chart::AccountType;
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::fiscal::FiscalPeriod;
use crate::repository::{load_accounts, LedgerRepository};

/// Which budget periods a variance report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "period", rename_all = "snake_case")]
pub enum PeriodSelector {
    /// One budget period, 1-based (month, quarter or the whole year).
    Period(usize),
    /// Every budget period that has started as of today.
    YearToDate,
    /// Every budget period.
    FullYear,
}

/// Whether a variance helps or hurts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceStatus {
    /// Revenue above budget, or spending below it.
    Favorable,
    /// Revenue below budget, or spending above it.
    Unfavorable,
    /// Actual equals budget.
    OnBudget,
}

/// Budget vs actual for one amount pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetVariance {
    /// Budgeted amount.
    pub budget_amount: Decimal,
    /// Actual amount.
    pub actual_amount: Decimal,
    /// Actual minus budget.
    pub variance: Decimal,
    /// Variance as a percentage of budget, 2dp; zero when the budget is zero.
    pub variance_percentage: Decimal,
    /// Favourability.
    pub status: VarianceStatus,
}

impl BudgetVariance {
    /// Compares `actual` with `budget` for an account of `account_type`.
    ///
    /// Revenue above budget is favourable; for every other type, actual above
    /// budget is unfavourable.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::VarianceOverflow`] if the difference or the
    /// percentage cannot be represented.
    pub fn calculate(
        budget: Decimal,
        actual: Decimal,
        account_type: AccountType,
    ) -> Result<Self, BudgetError> {
        let variance = actual
            .checked_sub(budget)
            .ok_or(BudgetError::VarianceOverflow)?;
        let variance_percentage =
            percentage_of(variance, budget).ok_or(BudgetError::VarianceOverflow)?;

        let over_budget = variance > Decimal::ZERO;
        let status = if variance.is_zero() {
            VarianceStatus::OnBudget
        } else if over_budget == (account_type == AccountType::Revenue) {
            VarianceStatus::Favorable
        } else {
            VarianceStatus::Unfavorable
        };

        Ok(Self {
            budget_amount: budget,
            actual_amount: actual,
            variance,
            variance_percentage,
            status,
        })
    }
}

/// `variance / budget * 100` at 2dp; zero for a zero budget, `None` on
/// overflow.
fn percentage_of(variance: Decimal, budget: Decimal) -> Option<Decimal> {
    if budget.is_zero() {
        return Some(Decimal::ZERO);
    }
    variance
        .checked_div(budget)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|pct| pct.round_dp(2))
}

/// Variance of one budget item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceLine {
    /// Budget item.
    pub item_id: BudgetItemId,
    /// Budgeted account.
    pub account_id: AccountId,
    /// Account number.
    pub account_number: String,
    /// Account name.
    pub account_name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Budget vs actual.
    #[serde(flatten)]
    pub variance: BudgetVariance,
}

/// Budget vs actual for a whole budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceReport {
    /// Budget.
    pub budget_id: BudgetId,
    /// Periods covered.
    pub selector: PeriodSelector,
    /// 1-based budget periods included.
    pub budget_periods: Vec<usize>,
    /// One line per item, in item order.
    pub lines: Vec<VarianceLine>,
    /// Sum of budget amounts.
    pub total_budget: Decimal,
    /// Sum of actual amounts.
    pub total_actual: Decimal,
    /// Sum of variances.
    pub total_variance: Decimal,
    /// Total variance as a percentage of total budget.
    pub total_variance_percentage: Decimal,
}

/// Groups the fiscal periods of a year into `slots` budget periods.
///
/// `periods` must be sorted by period number. With twelve monthly fiscal
/// periods, quarterly slots get three each.
#[must_use]
pub fn slot_periods(periods: &[FiscalPeriod], slots: usize) -> Vec<Vec<&FiscalPeriod>> {
    let mut grouped: Vec<Vec<&FiscalPeriod>> = vec![Vec::new(); slots];
    if slots == 0 || periods.is_empty() {
        return grouped;
    }
    for (i, period) in periods.iter().enumerate() {
        grouped[i * slots / periods.len()].push(period);
    }
    grouped
}

/// Computes budget-vs-actual reports from budgets and posted balances.
pub struct VarianceEngine<R: LedgerRepository> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    aggregator: Arc<BalanceAggregator<R>>,
}

impl<R: LedgerRepository> VarianceEngine<R> {
    /// Create a new variance engine.
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, aggregator: Arc<BalanceAggregator<R>>) -> Self {
        Self {
            repo,
            clock,
            aggregator,
        }
    }

    /// Compares a budget with posted activity over the selected periods.
    ///
    /// Actuals are normal-signed and, for a fund-restricted budget, limited to
    /// that fund.
    pub async fn compute_variance(
        &self,
        budget_id: BudgetId,
        selector: PeriodSelector,
    ) -> Result<VarianceReport, LedgerError> {
        let budget = self
            .repo
            .load_budget(budget_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("budget", budget_id))?;
        let periods = self.repo.list_fiscal_periods(budget.fiscal_year_id).await?;
        let slots = budget.period_type.slots();
        let grouped = slot_periods(&periods, slots);

        let selected = self.select_slots(selector, &grouped, slots)?;
        let fiscal_periods: Vec<FiscalPeriodId> = selected
            .iter()
            .flat_map(|slot| grouped[*slot].iter().map(|p| p.id))
            .collect();

        let accounts =
            load_accounts(self.repo.as_ref(), budget.items.iter().map(|i| i.account_id)).await?;
        let fund = budget.fund_id.map_or(FundFilter::All, FundFilter::Fund);

        let mut lines = Vec::with_capacity(budget.items.len());
        for item in &budget.items {
            let account = accounts
                .get(&item.account_id)
                .ok_or_else(|| LedgerError::not_found("account", item.account_id))?;
            let budgeted = budgeted_amount(item, &selected);
            let actual = self
                .aggregator
                .period_activity(item.account_id, &fiscal_periods, fund)
                .await?;
            lines.push(VarianceLine {
                item_id: item.id,
                account_id: account.id,
                account_number: account.number.clone(),
                account_name: account.name.clone(),
                account_type: account.account_type,
                variance: BudgetVariance::calculate(budgeted, actual, account.account_type)?,
            });
        }

        let report = summarize(&budget, selector, &selected, lines)?;
        debug!(
            %budget_id,
            lines = report.lines.len(),
            total_variance = %report.total_variance,
            "Variance computed"
        );
        Ok(report)
    }

    /// 0-based slot indices covered by `selector`.
    fn select_slots(
        &self,
        selector: PeriodSelector,
        grouped: &[Vec<&FiscalPeriod>],
        slots: usize,
    ) -> Result<Vec<usize>, BudgetError> {
        match selector {
            PeriodSelector::Period(period) if (1..=slots).contains(&period) => Ok(vec![period - 1]),
            PeriodSelector::Period(period) => Err(BudgetError::PeriodOutOfRange { period, slots }),
            PeriodSelector::FullYear => Ok((0..slots).collect()),
            PeriodSelector::YearToDate => {
                let today = self.clock.today();
                Ok(grouped
                    .iter()
                    .enumerate()
                    .filter(|(_, periods)| periods.first().is_some_and(|p| p.start_date <= today))
                    .map(|(slot, _)| slot)
                    .collect())
            }
        }
    }
}

fn budgeted_amount(item: &BudgetItem, slots: &[usize]) -> Decimal {
    slots
        .iter()
        .filter_map(|slot| item.period_distribution.get(*slot))
        .copied()
        .sum()
}

fn checked_total(mut amounts: impl Iterator<Item = Decimal>) -> Result<Decimal, BudgetError> {
    amounts
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or(BudgetError::VarianceOverflow)
}

fn summarize(
    budget: &Budget,
    selector: PeriodSelector,
    selected: &[usize],
    lines: Vec<VarianceLine>,
) -> Result<VarianceReport, BudgetError> {
    let total_budget = checked_total(lines.iter().map(|l| l.variance.budget_amount))?;
    let total_actual = checked_total(lines.iter().map(|l| l.variance.actual_amount))?;
    let totals = BudgetVariance::calculate(total_budget, total_actual, AccountType::Expense)?;

    Ok(VarianceReport {
        budget_id: budget.id,
        selector,
        budget_periods: selected.iter().map(|slot| slot + 1).collect(),
        lines,
        total_budget,
        total_actual,
        total_variance: totals.variance,
        total_variance_percentage: totals.variance_percentage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal::service::monthly_periods;
    use chrono::NaiveDate;
    use fundbook_shared::types::FiscalYearId;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(1000), dec!(1200), AccountType::Expense, dec!(200), dec!(20.00), VarianceStatus::Unfavorable)]
    #[case(dec!(1000), dec!(800), AccountType::Expense, dec!(-200), dec!(-20.00), VarianceStatus::Favorable)]
    #[case(dec!(1000), dec!(1200), AccountType::Revenue, dec!(200), dec!(20.00), VarianceStatus::Favorable)]
    #[case(dec!(1000), dec!(800), AccountType::Revenue, dec!(-200), dec!(-20.00), VarianceStatus::Unfavorable)]
    #[case(dec!(1000), dec!(1000), AccountType::Expense, dec!(0), dec!(0), VarianceStatus::OnBudget)]
    #[case(dec!(0), dec!(500), AccountType::Expense, dec!(500), dec!(0), VarianceStatus::Unfavorable)]
    #[case(dec!(300), dec!(100), AccountType::Expense, dec!(-200), dec!(-66.67), VarianceStatus::Favorable)]
    fn test_variance_calculation(
        #[case] budget: Decimal,
        #[case] actual: Decimal,
        #[case] account_type: AccountType,
        #[case] variance: Decimal,
        #[case] percentage: Decimal,
        #[case] status: VarianceStatus,
    ) {
        let result = BudgetVariance::calculate(budget, actual, account_type).unwrap();
        assert_eq!(result.variance, variance);
        assert_eq!(result.variance_percentage, percentage);
        assert_eq!(result.status, status);
    }

    #[test]
    fn test_variance_out_of_range_is_an_error() {
        let err = BudgetVariance::calculate(dec!(0.01), Decimal::MAX, AccountType::Expense)
            .unwrap_err();
        assert_eq!(err, BudgetError::VarianceOverflow);
        assert_eq!(err.error_code(), "VARIANCE_OUT_OF_RANGE");
        assert!(!err.is_state_error());

        let err = BudgetVariance::calculate(Decimal::MAX, Decimal::MIN, AccountType::Revenue)
            .unwrap_err();
        assert_eq!(err, BudgetError::VarianceOverflow);

        assert_eq!(
            checked_total([Decimal::MAX, dec!(1)].into_iter()),
            Err(BudgetError::VarianceOverflow)
        );
        assert_eq!(checked_total([dec!(1.50), dec!(2)].into_iter()), Ok(dec!(3.50)));
    }

    #[test]
    fn test_slot_periods_groups_months_into_quarters() {
        let start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let periods = monthly_periods(FiscalYearId::new(), start).unwrap();

        let quarters = slot_periods(&periods, 4);
        assert_eq!(quarters.len(), 4);
        for (q, group) in quarters.iter().enumerate() {
            let numbers: Vec<u32> = group.iter().map(|p| p.period_number).collect();
            let first = u32::try_from(q).unwrap() * 3 + 1;
            assert_eq!(numbers, vec![first, first + 1, first + 2]);
        }

        let annual = slot_periods(&periods, 1);
        assert_eq!(annual[0].len(), 12);

        let monthly = slot_periods(&periods, 12);
        assert!(monthly.iter().all(|group| group.len() == 1));
    }
}
