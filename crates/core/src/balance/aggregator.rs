//! Materialised balances maintained from posted transactions.
//!
//! Every write to a bucket happens while the owning account's lock is held
//! and is committed together with the posting journal in one batch. Locks
//! are acquired in account-id order with a timeout. A posting also holds its
//! period's lock, and re-reads the accounts and the period once locked.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use fundbook_shared::types::{AccountId, FiscalPeriodId, FiscalYearId, FundId};

use super::deltas::{fold_entries, posting_lines};
use super::types::{
    AccountBalance, BalanceBucket, BalanceKey, BalanceMismatch, FundFilter, Idempotent,
    PostingLine, PostingRecord, RebuildReport, RunningBalance, TrialBalance, TrialBalanceLine,
};
use crate::chart::{Account, NormalBalance};
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::fiscal::FiscalPeriod;
use crate::guard::LedgerLocks;
use crate::ledger::{validate_entries, validate_posting_period, Transaction, TransactionEntry, ValidationError};
use crate::repository::{load_accounts, LedgerRepository, PostingWrite, Versioned, WriteBatch};
use crate::workflow::{InvalidTransition, TransactionStatus, WorkflowAction};

/// Maintains per-account, per-period, per-fund balances.
pub struct BalanceAggregator<R: LedgerRepository> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    locks: LedgerLocks,
}

impl<R: LedgerRepository> BalanceAggregator<R> {
    /// Create a new balance aggregator.
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, locks: LedgerLocks) -> Self {
        Self { repo, clock, locks }
    }

    /// Applies a posted transaction's deltas.
    ///
    /// A transaction that already has a posting record is ignored.
    pub async fn apply_posting(
        &self,
        transaction: &Transaction,
    ) -> Result<Idempotent<PostingRecord>, LedgerError> {
        self.apply_posting_with(transaction, WriteBatch::new()).await
    }

    /// Applies a posted transaction's deltas, committing `batch` in the same
    /// atomic write. On [`Idempotent::Ignored`] nothing, including `batch`,
    /// is written.
    ///
    /// Every account must still be active and the period still open once
    /// their locks are held.
    pub async fn apply_posting_with(
        &self,
        transaction: &Transaction,
        mut batch: WriteBatch,
    ) -> Result<Idempotent<PostingRecord>, LedgerError> {
        if !transaction.status.is_posted() {
            return Err(InvalidTransition {
                from: transaction.status,
                action: WorkflowAction::Post,
            }
            .into());
        }

        let _period = self.locks.period(transaction.fiscal_period_id).await?;
        let _held = self
            .locks
            .accounts(transaction.entries.iter().map(|e| e.account_id).collect::<Vec<_>>())
            .await?;

        if self.repo.load_posting(transaction.id).await?.is_some() {
            debug!(transaction_id = %transaction.id, "Posting already applied, ignoring");
            return Ok(Idempotent::Ignored);
        }

        let accounts =
            load_accounts(self.repo.as_ref(), transaction.entries.iter().map(|e| e.account_id).collect::<Vec<_>>()).await?;
        validate_entries(&transaction.entries, |id| accounts.get(&id))?;
        let period = self
            .repo
            .load_fiscal_period(transaction.fiscal_period_id)
            .await?
            .ok_or(ValidationError::FiscalPeriodNotFound(transaction.fiscal_period_id))?;
        validate_posting_period(&period, transaction.transaction_date)?;
        let lines = posting_lines(transaction, &accounts)?;

        let now = self.clock.now();
        batch.balances.extend(self.bucket_writes(&lines, false, now).await?);
        let record = PostingRecord {
            transaction_id: transaction.id,
            lines,
            applied_at: now,
            reversed_at: None,
        };
        batch.postings.push(PostingWrite::Applied(record.clone()));

        self.repo.commit(batch).await.inspect_err(|err| {
            warn!(transaction_id = %transaction.id, error = %err, "Posting commit rejected");
        })?;

        info!(
            transaction_id = %transaction.id,
            buckets = record.lines.len(),
            amount = %transaction.amount,
            "Posting applied"
        );
        Ok(Idempotent::Executed(record))
    }

    /// Reverses exactly the deltas recorded for a voided transaction.
    ///
    /// A transaction that was never applied, or is already reversed, is
    /// ignored.
    pub async fn reverse_posting(
        &self,
        transaction: &Transaction,
    ) -> Result<Idempotent<PostingRecord>, LedgerError> {
        self.reverse_posting_with(transaction, WriteBatch::new()).await
    }

    /// Reverses a posting, committing `batch` in the same atomic write. On
    /// [`Idempotent::Ignored`] nothing, including `batch`, is written.
    pub async fn reverse_posting_with(
        &self,
        transaction: &Transaction,
        mut batch: WriteBatch,
    ) -> Result<Idempotent<PostingRecord>, LedgerError> {
        if transaction.status != TransactionStatus::Voided {
            return Err(InvalidTransition {
                from: transaction.status,
                action: WorkflowAction::Void,
            }
            .into());
        }

        let Some(record) = self.repo.load_posting(transaction.id).await? else {
            debug!(transaction_id = %transaction.id, "No posting to reverse, ignoring");
            return Ok(Idempotent::Ignored);
        };

        let _held = self
            .locks
            .accounts(record.lines.iter().map(|l| l.account_id))
            .await?;

        // re-read under the locks
        let record = match self.repo.load_posting(transaction.id).await? {
            Some(record) if !record.is_reversed() => record,
            _ => {
                debug!(transaction_id = %transaction.id, "Posting already reversed, ignoring");
                return Ok(Idempotent::Ignored);
            }
        };

        let now = self.clock.now();
        batch.balances.extend(self.bucket_writes(&record.lines, true, now).await?);
        batch.postings.push(PostingWrite::Reversed {
            transaction_id: transaction.id,
            reversed_at: now,
        });

        self.repo.commit(batch).await.inspect_err(|err| {
            warn!(transaction_id = %transaction.id, error = %err, "Reversal commit rejected");
        })?;

        info!(transaction_id = %transaction.id, buckets = record.lines.len(), "Posting reversed");
        Ok(Idempotent::Executed(PostingRecord {
            reversed_at: Some(now),
            ..record
        }))
    }

    async fn bucket_writes(
        &self,
        lines: &[PostingLine],
        reverse: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Versioned<BalanceBucket>>, LedgerError> {
        let mut writes = Vec::with_capacity(lines.len());
        for line in lines {
            let mut bucket = self
                .repo
                .load_balance(line.key())
                .await?
                .unwrap_or_else(|| BalanceBucket::empty(line.key(), line.fiscal_year_id, now));
            let expected = bucket.version;
            bucket.apply(line, reverse);
            bucket.version = expected + 1;
            bucket.last_updated = now;
            writes.push(Versioned::new(bucket, expected));
        }
        Ok(writes)
    }

    /// Balance of one (account, period, fund) bucket, with the opening
    /// balance carried from earlier periods of the same year. Missing
    /// buckets, unknown accounts and unknown periods all read as zero.
    pub async fn get_balance(
        &self,
        account_id: AccountId,
        fiscal_period_id: FiscalPeriodId,
        fund_id: Option<FundId>,
    ) -> Result<AccountBalance, LedgerError> {
        let Some(period) = self.repo.load_fiscal_period(fiscal_period_id).await? else {
            debug!(%account_id, %fiscal_period_id, "Unknown fiscal period, reading zero balance");
            return Ok(AccountBalance {
                account_id,
                fiscal_year_id: None,
                fiscal_period_id,
                fund_id,
                opening_balance: Decimal::ZERO,
                current_balance: Decimal::ZERO,
                closing_balance: None,
                last_updated: None,
            });
        };
        let numbers = self.period_numbers(period.fiscal_year_id).await?;
        let buckets = self.repo.list_balances(Some(account_id)).await?;

        let mut opening = Decimal::ZERO;
        let mut own: Option<&BalanceBucket> = None;
        for bucket in buckets.iter().filter(|b| b.fund_id == fund_id) {
            match numbers.get(&bucket.fiscal_period_id) {
                Some(n) if *n < period.period_number => opening += bucket.net_change,
                Some(_) if bucket.fiscal_period_id == period.id => own = Some(bucket),
                _ => {}
            }
        }

        let current = opening + own.map_or(Decimal::ZERO, |b| b.net_change);
        Ok(AccountBalance {
            account_id,
            fiscal_year_id: Some(period.fiscal_year_id),
            fiscal_period_id,
            fund_id,
            opening_balance: opening,
            current_balance: current,
            closing_balance: (!period.is_open()).then_some(current),
            last_updated: own.map(|b| b.last_updated),
        })
    }

    /// Cumulative balance from the start of the fiscal year through period
    /// number `through_period`.
    pub async fn balance_through(
        &self,
        account_id: AccountId,
        fiscal_year_id: FiscalYearId,
        through_period: u32,
        fund: FundFilter,
    ) -> Result<Decimal, LedgerError> {
        let numbers = self.period_numbers(fiscal_year_id).await?;
        let buckets = self.repo.list_balances(Some(account_id)).await?;

        Ok(buckets
            .iter()
            .filter(|b| fund.matches(b.fund_id))
            .filter(|b| {
                numbers
                    .get(&b.fiscal_period_id)
                    .is_some_and(|n| *n <= through_period)
            })
            .map(|b| b.net_change)
            .sum())
    }

    /// Period-by-period balance chain for one fiscal year.
    pub async fn running_balance(
        &self,
        account_id: AccountId,
        fiscal_year_id: FiscalYearId,
        fund: FundFilter,
    ) -> Result<Vec<RunningBalance>, LedgerError> {
        let periods = self.repo.list_fiscal_periods(fiscal_year_id).await?;
        let buckets = self.repo.list_balances(Some(account_id)).await?;

        let mut chain: Vec<RunningBalance> = Vec::with_capacity(periods.len());
        for period in &periods {
            let net: Decimal = buckets
                .iter()
                .filter(|b| b.fiscal_period_id == period.id && fund.matches(b.fund_id))
                .map(|b| b.net_change)
                .sum();
            let link = match chain.last() {
                None => RunningBalance::first_period(period.id, period.period_number, net),
                Some(prev) => RunningBalance::next_period(prev, period.id, period.period_number, net),
            };
            chain.push(link);
        }
        Ok(chain)
    }

    /// Net activity of an account over a set of periods.
    pub async fn period_activity(
        &self,
        account_id: AccountId,
        periods: &[FiscalPeriodId],
        fund: FundFilter,
    ) -> Result<Decimal, LedgerError> {
        let buckets = self.repo.list_balances(Some(account_id)).await?;
        Ok(buckets
            .iter()
            .filter(|b| periods.contains(&b.fiscal_period_id) && fund.matches(b.fund_id))
            .map(|b| b.net_change)
            .sum())
    }

    /// Trial balance of every account, cumulative from the start of the
    /// fiscal year through `fiscal_period_id`, across all funds.
    pub async fn trial_balance(
        &self,
        fiscal_period_id: FiscalPeriodId,
    ) -> Result<TrialBalance, LedgerError> {
        let period = self.load_period(fiscal_period_id).await?;
        let numbers = self.period_numbers(period.fiscal_year_id).await?;
        let accounts = self.repo.list_accounts().await?;
        let buckets = self.repo.list_balances(None).await?;

        let mut net_by_account: HashMap<AccountId, Decimal> = HashMap::new();
        for bucket in &buckets {
            if numbers
                .get(&bucket.fiscal_period_id)
                .is_some_and(|n| *n <= period.period_number)
            {
                *net_by_account.entry(bucket.account_id).or_default() += bucket.net_change;
            }
        }

        let mut lines = Vec::new();
        for account in accounts {
            let net = net_by_account.get(&account.id).copied().unwrap_or_default();
            if net.is_zero() {
                continue;
            }
            // a negative normal-signed balance sits in the opposite column
            let on_debit_side = match account.normal_balance {
                NormalBalance::Debit => net > Decimal::ZERO,
                NormalBalance::Credit => net < Decimal::ZERO,
            };
            let (debit_balance, credit_balance) = if on_debit_side {
                (net.abs(), Decimal::ZERO)
            } else {
                (Decimal::ZERO, net.abs())
            };
            lines.push(TrialBalanceLine {
                account_id: account.id,
                number: account.number,
                name: account.name,
                account_type: account.account_type,
                debit_balance,
                credit_balance,
            });
        }

        let total_debits = lines.iter().map(|l| l.debit_balance).sum();
        let total_credits = lines.iter().map(|l| l.credit_balance).sum();
        Ok(TrialBalance {
            fiscal_year_id: period.fiscal_year_id,
            fiscal_period_id,
            lines,
            total_debits,
            total_credits,
        })
    }

    /// Recomputes buckets from the posted-entry log.
    ///
    /// Holds the locks of every affected account for the whole run. Missing
    /// buckets are restored. If any stored bucket disagrees with the log,
    /// nothing is written and every mismatch is reported.
    pub async fn rebuild_from_log(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<RebuildReport, LedgerError> {
        let accounts = match account_id {
            Some(id) => vec![self.load_account(id).await?],
            None => self.repo.list_accounts().await?,
        };

        let _held = self
            .locks
            .accounts(accounts.iter().map(|a| a.id))
            .await?;

        let now = self.clock.now();
        let mut report = RebuildReport::default();
        let mut mismatches = Vec::new();
        let mut restores = Vec::new();

        for account in &accounts {
            report.accounts_checked += 1;
            let mut expected = self.expected_buckets(account, now).await?;

            for stored in self.repo.list_balances(Some(account.id)).await? {
                report.buckets_checked += 1;
                let key = stored.key();
                let recomputed = match expected.remove(&key) {
                    Some(recomputed) if stored.same_totals(&recomputed) => continue,
                    Some(recomputed) => recomputed,
                    None if stored.is_zero() => continue,
                    None => BalanceBucket::empty(key, stored.fiscal_year_id, now),
                };
                mismatches.push(BalanceMismatch {
                    key,
                    stored_debit: stored.debit_total,
                    stored_credit: stored.credit_total,
                    expected_debit: recomputed.debit_total,
                    expected_credit: recomputed.credit_total,
                });
            }

            for (_, mut missing) in expected {
                if missing.is_zero() {
                    continue;
                }
                missing.version = 1;
                restores.push(Versioned::new(missing, 0));
            }
        }

        if !mismatches.is_empty() {
            warn!(
                account_id = ?account_id,
                mismatches = mismatches.len(),
                "Balance rebuild found buckets disagreeing with the posted log"
            );
            return Err(LedgerError::Consistency { mismatches });
        }

        report.buckets_restored = restores.len();
        if !restores.is_empty() {
            self.repo
                .commit(WriteBatch {
                    balances: restores,
                    ..WriteBatch::default()
                })
                .await?;
        }

        info!(
            account_id = ?account_id,
            accounts = report.accounts_checked,
            checked = report.buckets_checked,
            restored = report.buckets_restored,
            "Balance rebuild complete"
        );
        Ok(report)
    }

    async fn expected_buckets(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<BalanceKey, BalanceBucket>, LedgerError> {
        let posted = self
            .repo
            .list_posted_entries_for_account(account.id)
            .await?;

        let mut by_period: BTreeMap<FiscalPeriodId, (FiscalYearId, Vec<TransactionEntry>)> =
            BTreeMap::new();
        for row in posted {
            by_period
                .entry(row.fiscal_period_id)
                .or_insert_with(|| (row.fiscal_year_id, Vec::new()))
                .1
                .push(row.entry);
        }

        let chart = HashMap::from([(account.id, account.clone())]);
        let mut expected = BTreeMap::new();
        for (period_id, (year_id, entries)) in by_period {
            for line in fold_entries(&entries, year_id, period_id, &chart)? {
                let mut bucket = BalanceBucket::empty(line.key(), year_id, now);
                bucket.apply(&line, false);
                expected.insert(line.key(), bucket);
            }
        }
        Ok(expected)
    }

    async fn load_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.repo
            .load_account(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    async fn load_period(&self, id: FiscalPeriodId) -> Result<FiscalPeriod, LedgerError> {
        self.repo
            .load_fiscal_period(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("fiscal period", id))
    }

    async fn period_numbers(
        &self,
        fiscal_year_id: FiscalYearId,
    ) -> Result<HashMap<FiscalPeriodId, u32>, LedgerError> {
        Ok(self
            .repo
            .list_fiscal_periods(fiscal_year_id)
            .await?
            .into_iter()
            .map(|p| (p.id, p.period_number))
            .collect())
    }
}
