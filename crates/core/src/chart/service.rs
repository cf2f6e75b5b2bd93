//! Chart of accounts maintenance.

use std::sync::Arc;

use tracing::info;
use fundbook_shared::types::AccountId;

use super::account::{Account, NewAccount};
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::guard::{ClaimSet, LedgerLocks};
use crate::ledger::ValidationError;
use crate::repository::LedgerRepository;

/// Creates and maintains accounts.
pub struct ChartService<R: LedgerRepository> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    locks: LedgerLocks,
    numbers: ClaimSet<String>,
}

impl<R: LedgerRepository> ChartService<R> {
    /// Create a new chart service.
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, locks: LedgerLocks) -> Self {
        Self {
            repo,
            clock,
            locks,
            numbers: ClaimSet::new(),
        }
    }

    /// Creates an active account.
    ///
    /// # Errors
    ///
    /// Fails if the number is blank or taken, or the parent does not exist.
    pub async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let number = input.number.trim().to_string();
        if number.is_empty() {
            return Err(ValidationError::EmptyAccountNumber.into());
        }
        let _claim = self.numbers.claim(number.clone()).ok_or_else(|| {
            LedgerError::ConcurrentModification(format!("account number {number} is being created"))
        })?;

        let existing = self.repo.list_accounts().await?;
        if existing.iter().any(|a| a.number == number) {
            return Err(ValidationError::DuplicateAccountNumber(number).into());
        }
        if let Some(parent) = input.parent_id {
            if !existing.iter().any(|a| a.id == parent) {
                return Err(ValidationError::ParentNotFound(parent).into());
            }
        }

        let now = self.clock.now();
        let account = Account {
            id: AccountId::new(),
            number,
            name: input.name,
            account_type: input.account_type,
            subtype: input.subtype,
            normal_balance: input
                .normal_balance
                .unwrap_or_else(|| input.account_type.normal_balance()),
            is_active: true,
            parent_id: input.parent_id,
            fund_id: input.fund_id,
            created_at: now,
            updated_at: now,
        };
        self.repo.save_account(account.clone()).await?;

        info!(
            account_id = %account.id,
            number = %account.number,
            account_type = account.account_type.as_str(),
            "Account created"
        );
        Ok(account)
    }

    /// Marks an account inactive; it keeps its history but accepts no new lines.
    ///
    /// # Errors
    ///
    /// Fails if the account does not exist.
    pub async fn deactivate_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.set_active(id, false).await
    }

    /// Marks an account active again.
    ///
    /// # Errors
    ///
    /// Fails if the account does not exist.
    pub async fn reactivate_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<Account, LedgerError> {
        // waits out any posting that touches the account
        let _held = self.locks.accounts([id]).await?;
        let mut account = self.load(id).await?;
        if account.is_active == active {
            return Ok(account);
        }
        account.is_active = active;
        account.updated_at = self.clock.now();
        self.repo.save_account(account.clone()).await?;

        info!(account_id = %id, is_active = active, "Account activation changed");
        Ok(account)
    }

    /// Moves an account under `parent`, or to the top level with `None`.
    ///
    /// # Errors
    ///
    /// Fails if either account is missing or the move would create a cycle.
    pub async fn set_parent(
        &self,
        id: AccountId,
        parent: Option<AccountId>,
    ) -> Result<Account, LedgerError> {
        let mut account = self.load(id).await?;

        if let Some(parent_id) = parent {
            let accounts = self.repo.list_accounts().await?;
            if !accounts.iter().any(|a| a.id == parent_id) {
                return Err(ValidationError::ParentNotFound(parent_id).into());
            }
            // walk up from the new parent; reaching `id` means a cycle
            let mut cursor = Some(parent_id);
            while let Some(current) = cursor {
                if current == id {
                    return Err(ValidationError::AccountCycle {
                        account: id,
                        parent: parent_id,
                    }
                    .into());
                }
                cursor = accounts
                    .iter()
                    .find(|a| a.id == current)
                    .and_then(|a| a.parent_id);
            }
        }

        account.parent_id = parent;
        account.updated_at = self.clock.now();
        self.repo.save_account(account.clone()).await?;

        info!(account_id = %id, parent_id = ?parent, "Account re-parented");
        Ok(account)
    }

    /// Physically removes an account that nothing references.
    ///
    /// # Errors
    ///
    /// Fails if the account is missing, has children, or has entries.
    pub async fn delete_account(&self, id: AccountId) -> Result<(), LedgerError> {
        let _held = self.locks.accounts([id]).await?;
        self.load(id).await?;

        let accounts = self.repo.list_accounts().await?;
        if accounts.iter().any(|a| a.parent_id == Some(id)) {
            return Err(ValidationError::AccountHasChildren(id).into());
        }
        if self.repo.account_has_entries(id).await? {
            return Err(ValidationError::AccountReferenced(id).into());
        }

        self.repo.delete_account(id).await?;
        info!(account_id = %id, "Account deleted");
        Ok(())
    }

    /// Lists every account ordered by number.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.repo.list_accounts().await?)
    }

    async fn load(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.repo
            .load_account(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", id))
    }
}
