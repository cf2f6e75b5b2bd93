//! Shared fixture for store-backed ledger tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use fundbook_core::LedgerCore;
use fundbook_core::chart::{Account, AccountType, NewAccount};
use fundbook_core::clock::FixedClock;
use fundbook_core::fiscal::{FiscalPeriod, FiscalYear};
use fundbook_core::ledger::{EntryInput, NewTransaction, Transaction};
use fundbook_shared::LedgerConfig;
use fundbook_shared::types::{AccountId, CustomerId, UserId};
use fundbook_store::MemoryStore;

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

/// The accounts every test ledger starts with.
pub struct Accounts {
    pub cash: Account,
    pub receivable: Account,
    pub net_assets: Account,
    pub revenue: Account,
    pub expense: Account,
}

/// A calendar-year 2026 ledger over a [`MemoryStore`], with the clock on
/// 15 March.
pub struct TestLedger {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub core: LedgerCore<MemoryStore>,
    pub year: FiscalYear,
    pub periods: Vec<FiscalPeriod>,
    pub accounts: Accounts,
    pub user: UserId,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::with_store(MemoryStore::new()).await
    }

    pub async fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let clock = Arc::new(FixedClock::at_date(date(3, 15)));
        let core = LedgerCore::new(store.clone(), clock.clone(), &LedgerConfig::default());

        let (year, periods) = core
            .calendar
            .create_year("FY 2026", date(1, 1))
            .await
            .unwrap();

        let cash = create(&core, "1000", "Cash", AccountType::Asset).await;
        let receivable = create(&core, "1200", "Accounts Receivable", AccountType::Asset).await;
        let net_assets = create(&core, "3000", "Net Assets", AccountType::Equity).await;
        let revenue = create(&core, "4000", "Program Revenue", AccountType::Revenue).await;
        let expense = create(&core, "5000", "Program Expense", AccountType::Expense).await;

        Self {
            store,
            clock,
            core,
            year,
            periods,
            accounts: Accounts {
                cash,
                receivable,
                net_assets,
                revenue,
                expense,
            },
            user: UserId::new(),
        }
    }

    /// Fiscal period by month number (1 = January).
    pub fn period(&self, month: u32) -> &FiscalPeriod {
        &self.periods[usize::try_from(month - 1).unwrap()]
    }

    /// Current balance of an account's unrestricted bucket in `month`.
    pub async fn balance(&self, account: AccountId, month: u32) -> Decimal {
        self.core
            .balances
            .get_balance(account, self.period(month).id, None)
            .await
            .unwrap()
            .current_balance
    }

    /// An approved journal entry dated the 10th of `month`.
    pub async fn approved_journal(&self, month: u32, entries: Vec<EntryInput>) -> Transaction {
        let input = NewTransaction::journal_entry(
            self.period(month).id,
            date(month, 10),
            "test journal",
            entries,
            self.user,
        );
        let draft = self.core.transactions.create_draft(input).await.unwrap();
        self.core
            .transactions
            .approve(draft.id, self.user)
            .await
            .unwrap()
    }

    /// A posted journal entry dated the 10th of `month`.
    pub async fn posted_journal(&self, month: u32, entries: Vec<EntryInput>) -> Transaction {
        let approved = self.approved_journal(month, entries).await;
        self.core
            .transactions
            .post(approved.id, self.user)
            .await
            .unwrap()
    }

    /// Posts `amount` of cash revenue in `month`.
    pub async fn post_revenue(&self, month: u32, amount: Decimal) -> Transaction {
        self.posted_journal(
            month,
            vec![
                EntryInput::debit(self.accounts.cash.id, amount),
                EntryInput::credit(self.accounts.revenue.id, amount),
            ],
        )
        .await
    }

    /// Posts `amount` of cash spending in `month`.
    pub async fn post_expense(&self, month: u32, amount: Decimal) -> Transaction {
        self.posted_journal(
            month,
            vec![
                EntryInput::debit(self.accounts.expense.id, amount),
                EntryInput::credit(self.accounts.cash.id, amount),
            ],
        )
        .await
    }

    /// A posted invoice issued on 10 January.
    pub async fn posted_invoice(
        &self,
        customer: CustomerId,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Transaction {
        let input = NewTransaction::invoice(
            self.period(1).id,
            date(1, 10),
            customer,
            due_date,
            vec![
                EntryInput::debit(self.accounts.receivable.id, amount),
                EntryInput::credit(self.accounts.revenue.id, amount),
            ],
            self.user,
        );
        let draft = self.core.transactions.create_draft(input).await.unwrap();
        self.core
            .transactions
            .approve(draft.id, self.user)
            .await
            .unwrap();
        self.core
            .transactions
            .post(draft.id, self.user)
            .await
            .unwrap()
    }
}

async fn create(
    core: &LedgerCore<MemoryStore>,
    number: &str,
    name: &str,
    account_type: AccountType,
) -> Account {
    core.chart
        .create_account(NewAccount::new(number, name, account_type))
        .await
        .unwrap()
}
