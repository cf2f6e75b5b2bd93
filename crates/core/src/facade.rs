//! Wiring of every service over one repository.

use std::sync::Arc;

use fundbook_shared::LedgerConfig;

use crate::balance::BalanceAggregator;
use crate::budget::{BudgetRevisionEngine, BudgetService, VarianceEngine};
use crate::chart::ChartService;
use crate::clock::Clock;
use crate::fiscal::FiscalCalendar;
use crate::guard::LedgerLocks;
use crate::reports::AgingEngine;
use crate::repository::LedgerRepository;
use crate::workflow::TransactionWorkflow;

/// Every ledger service, sharing one repository, clock and balance aggregator.
pub struct LedgerCore<R: LedgerRepository> {
    /// Chart of accounts.
    pub chart: ChartService<R>,
    /// Fiscal calendar.
    pub calendar: FiscalCalendar<R>,
    /// Transaction lifecycle.
    pub transactions: TransactionWorkflow<R>,
    /// Balance aggregation.
    pub balances: Arc<BalanceAggregator<R>>,
    /// Budget lifecycle.
    pub budgets: BudgetService<R>,
    /// Budget revisions.
    pub revisions: BudgetRevisionEngine<R>,
    /// Budget vs actual.
    pub variance: VarianceEngine<R>,
    /// Receivables aging.
    pub aging: AgingEngine<R>,
}

impl<R: LedgerRepository> LedgerCore<R> {
    /// Builds every service over `repo`.
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, config: &LedgerConfig) -> Self {
        let locks = LedgerLocks::new(config.lock_timeout());
        let balances = Arc::new(BalanceAggregator::new(
            Arc::clone(&repo),
            Arc::clone(&clock),
            locks.clone(),
        ));
        Self {
            chart: ChartService::new(Arc::clone(&repo), Arc::clone(&clock), locks.clone()),
            calendar: FiscalCalendar::new(Arc::clone(&repo), locks),
            transactions: TransactionWorkflow::new(
                Arc::clone(&repo),
                Arc::clone(&clock),
                Arc::clone(&balances),
            ),
            budgets: BudgetService::new(Arc::clone(&repo), Arc::clone(&clock)),
            revisions: BudgetRevisionEngine::new(Arc::clone(&repo), Arc::clone(&clock)),
            variance: VarianceEngine::new(Arc::clone(&repo), Arc::clone(&clock), Arc::clone(&balances)),
            aging: AgingEngine::new(repo),
            balances,
        }
    }
}
