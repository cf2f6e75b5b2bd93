//! In-memory implementation of [`LedgerRepository`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use fundbook_core::balance::{BalanceBucket, BalanceKey, PostingRecord};
use fundbook_core::budget::{Budget, BudgetRevision};
use fundbook_core::chart::Account;
use fundbook_core::fiscal::{FiscalPeriod, FiscalYear};
use fundbook_core::ledger::{Transaction, TransactionKind};
use fundbook_core::repository::{
    LedgerRepository, PostedEntry, PostingWrite, StoreError, Versioned, WriteBatch,
};
use fundbook_shared::types::{
    AccountId, BudgetId, CustomerId, FiscalPeriodId, FiscalYearId, TransactionId,
};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    fiscal_years: HashMap<FiscalYearId, FiscalYear>,
    fiscal_periods: HashMap<FiscalPeriodId, FiscalPeriod>,
    transactions: HashMap<TransactionId, Transaction>,
    balances: BTreeMap<BalanceKey, BalanceBucket>,
    postings: HashMap<TransactionId, PostingRecord>,
    budgets: HashMap<BudgetId, Budget>,
    budget_revisions: Vec<BudgetRevision>,
}

impl Tables {
    fn check_version(
        entity: &'static str,
        id: impl ToString,
        stored: Option<u64>,
        expected: u64,
    ) -> Result<(), StoreError> {
        let actual = stored.unwrap_or(0);
        if actual == expected {
            Ok(())
        } else {
            Err(StoreError::VersionConflict {
                entity,
                id: id.to_string(),
                expected,
                actual,
            })
        }
    }

    /// Checks every expectation in `batch` without writing anything.
    fn check_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        for write in &batch.transactions {
            let id = write.record.id;
            let stored = self.transactions.get(&id).map(|t| t.version);
            Self::check_version("transaction", id, stored, write.expected_version)?;
        }
        for write in &batch.balances {
            let key = write.record.key();
            let stored = self.balances.get(&key).map(|b| b.version);
            Self::check_version("balance", key.account_id, stored, write.expected_version)?;
        }
        for write in &batch.postings {
            match write {
                PostingWrite::Applied(record) => {
                    if self.postings.contains_key(&record.transaction_id) {
                        return Err(StoreError::Duplicate {
                            entity: "posting",
                            id: record.transaction_id.to_string(),
                        });
                    }
                }
                PostingWrite::Reversed { transaction_id, .. } => {
                    match self.postings.get(transaction_id) {
                        None => {
                            return Err(StoreError::NotFound {
                                entity: "posting",
                                id: transaction_id.to_string(),
                            });
                        }
                        Some(record) if record.is_reversed() => {
                            return Err(StoreError::Duplicate {
                                entity: "posting reversal",
                                id: transaction_id.to_string(),
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        if let Some(write) = &batch.budget {
            let id = write.record.id;
            let stored = self.budgets.get(&id).map(|b| b.version);
            Self::check_version("budget", id, stored, write.expected_version)?;
        }
        for revision in &batch.budget_revisions {
            let taken = self.budget_revisions.iter().any(|r| {
                r.budget_id == revision.budget_id && r.revision_number == revision.revision_number
            });
            if taken {
                return Err(StoreError::Duplicate {
                    entity: "budget revision",
                    id: format!("{}#{}", revision.budget_id, revision.revision_number),
                });
            }
        }
        Ok(())
    }

    fn apply_batch(&mut self, batch: WriteBatch) {
        for write in batch.transactions {
            self.transactions.insert(write.record.id, write.record);
        }
        for write in batch.balances {
            self.balances.insert(write.record.key(), write.record);
        }
        for write in batch.postings {
            match write {
                PostingWrite::Applied(record) => {
                    self.postings.insert(record.transaction_id, record);
                }
                PostingWrite::Reversed {
                    transaction_id,
                    reversed_at,
                } => {
                    if let Some(record) = self.postings.get_mut(&transaction_id) {
                        record.reversed_at = Some(reversed_at);
                    }
                }
            }
        }
        if let Some(write) = batch.budget {
            self.budgets.insert(write.record.id, write.record);
        }
        self.budget_revisions.extend(batch.budget_revisions);
    }

    fn sorted_accounts(&self, only_active: bool) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .values()
            .filter(|a| !only_active || a.is_active)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.number.cmp(&b.number));
        accounts
    }

    fn invoices(&self, customer: Option<CustomerId>) -> Vec<Transaction> {
        let mut invoices: Vec<Transaction> = self
            .transactions
            .values()
            .filter(|t| t.kind == TransactionKind::Invoice)
            .filter(|t| {
                customer.is_none_or(|c| {
                    t.settlement.as_ref().and_then(|s| s.customer_id()) == Some(c)
                })
            })
            .cloned()
            .collect();
        invoices.sort_by_key(|t| (t.transaction_date, t.id));
        invoices
    }
}

/// A [`LedgerRepository`] held entirely in memory.
///
/// Every call takes the table lock once, so each load and each commit is
/// atomic. An optional artificial latency is awaited before every call,
/// which lets tests interleave concurrent operations deterministically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    latency: Option<Duration>,
    failing_commits: AtomicUsize,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store that sleeps for `latency` before every call.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Makes the next `count` commits fail with a backend error.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Deletes materialised balances, for one account or all of them.
    ///
    /// Posting records and transactions are left alone; a rebuild restores
    /// the buckets.
    pub async fn drop_balances(&self, account_id: Option<AccountId>) -> usize {
        let mut tables = self.tables.write().await;
        let before = tables.balances.len();
        tables
            .balances
            .retain(|key, _| account_id.is_some_and(|id| id != key.account_id));
        before - tables.balances.len()
    }

    /// Overwrites a bucket without any version check.
    pub async fn force_balance(&self, bucket: BalanceBucket) {
        self.tables
            .write()
            .await
            .balances
            .insert(bucket.key(), bucket);
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.pause().await;
        if self.take_injected_failure() {
            warn!("Injected commit failure");
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }

        let mut tables = self.tables.write().await;
        tables.check_batch(&batch)?;
        debug!(
            transactions = batch.transactions.len(),
            balances = batch.balances.len(),
            postings = batch.postings.len(),
            "Committing batch"
        );
        tables.apply_batch(batch);
        Ok(())
    }
}

impl LedgerRepository for MemoryStore {
    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.sorted_accounts(false))
    }

    async fn list_active_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.sorted_accounts(true))
    }

    async fn save_account(&self, account: Account) -> Result<(), StoreError> {
        self.pause().await;
        self.tables
            .write()
            .await
            .accounts
            .insert(account.id, account);
        Ok(())
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        self.pause().await;
        self.tables
            .write()
            .await
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: id.to_string(),
            })
    }

    async fn account_has_entries(&self, id: AccountId) -> Result<bool, StoreError> {
        self.pause().await;
        Ok(self
            .tables
            .read()
            .await
            .transactions
            .values()
            .flat_map(|t| &t.entries)
            .any(|e| e.account_id == id))
    }

    async fn load_fiscal_year(&self, id: FiscalYearId) -> Result<Option<FiscalYear>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.fiscal_years.get(&id).cloned())
    }

    async fn save_fiscal_year(&self, year: FiscalYear) -> Result<(), StoreError> {
        self.pause().await;
        self.tables.write().await.fiscal_years.insert(year.id, year);
        Ok(())
    }

    async fn load_fiscal_period(
        &self,
        id: FiscalPeriodId,
    ) -> Result<Option<FiscalPeriod>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.fiscal_periods.get(&id).cloned())
    }

    async fn list_fiscal_periods(
        &self,
        fiscal_year_id: FiscalYearId,
    ) -> Result<Vec<FiscalPeriod>, StoreError> {
        self.pause().await;
        let tables = self.tables.read().await;
        let mut periods: Vec<FiscalPeriod> = tables
            .fiscal_periods
            .values()
            .filter(|p| p.fiscal_year_id == fiscal_year_id)
            .cloned()
            .collect();
        periods.sort_by_key(|p| p.period_number);
        Ok(periods)
    }

    async fn save_fiscal_period(&self, period: FiscalPeriod) -> Result<(), StoreError> {
        self.pause().await;
        self.tables
            .write()
            .await
            .fiscal_periods
            .insert(period.id, period);
        Ok(())
    }

    async fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn save_transaction(
        &self,
        transaction: Transaction,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        self.commit_batch(WriteBatch::transaction(transaction, expected_version))
            .await
    }

    async fn load_balance(&self, key: BalanceKey) -> Result<Option<BalanceBucket>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.balances.get(&key).cloned())
    }

    async fn list_balances(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<Vec<BalanceBucket>, StoreError> {
        self.pause().await;
        Ok(self
            .tables
            .read()
            .await
            .balances
            .values()
            .filter(|b| account_id.is_none_or(|id| b.account_id == id))
            .cloned()
            .collect())
    }

    async fn save_balance(
        &self,
        bucket: BalanceBucket,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        self.commit_batch(WriteBatch {
            balances: vec![Versioned::new(bucket, expected_version)],
            ..WriteBatch::default()
        })
        .await
    }

    async fn load_posting(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PostingRecord>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.postings.get(&transaction_id).cloned())
    }

    async fn load_budget(&self, id: BudgetId) -> Result<Option<Budget>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.budgets.get(&id).cloned())
    }

    async fn save_budget(&self, budget: Budget, expected_version: u64) -> Result<(), StoreError> {
        self.commit_batch(WriteBatch {
            budget: Some(Versioned::new(budget, expected_version)),
            ..WriteBatch::default()
        })
        .await
    }

    async fn append_budget_revision(&self, revision: BudgetRevision) -> Result<(), StoreError> {
        self.commit_batch(WriteBatch {
            budget_revisions: vec![revision],
            ..WriteBatch::default()
        })
        .await
    }

    async fn list_budget_revisions(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<BudgetRevision>, StoreError> {
        self.pause().await;
        let tables = self.tables.read().await;
        let mut revisions: Vec<BudgetRevision> = tables
            .budget_revisions
            .iter()
            .filter(|r| r.budget_id == budget_id)
            .cloned()
            .collect();
        revisions.sort_by_key(|r| r.revision_number);
        Ok(revisions)
    }

    async fn list_invoices(&self) -> Result<Vec<Transaction>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.invoices(None))
    }

    async fn list_invoices_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.pause().await;
        Ok(self.tables.read().await.invoices(Some(customer_id)))
    }

    async fn list_posted_entries_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<PostedEntry>, StoreError> {
        self.pause().await;
        let tables = self.tables.read().await;

        let mut rows: Vec<PostedEntry> = tables
            .transactions
            .values()
            .filter(|t| t.status.is_posted())
            .flat_map(|t| {
                t.entries
                    .iter()
                    .filter(|e| e.account_id == account_id)
                    .map(|e| PostedEntry {
                        transaction_id: t.id,
                        fiscal_year_id: t.fiscal_year_id,
                        fiscal_period_id: t.fiscal_period_id,
                        transaction_date: t.transaction_date,
                        entry: e.clone(),
                    })
            })
            .collect();
        rows.sort_by_key(|r| (r.transaction_date, r.transaction_id, r.entry.id));
        Ok(rows)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.commit_batch(batch).await
    }
}
