//! Account details as seen by the age gate
//!
//! The gate only needs the handful of persisted fields below. The SQLite
//! implementation lives in [`crate::storage::SqliteAccountStore`]; the
//! in-memory one here backs tests and hosts that persist elsewhere.

use super::AgeDecision;
use crate::error::{Result, ShelfError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persisted account details consulted and updated by the age gate
///
/// Only the gate worker calls the setters, so implementations do not need
/// to guard against interleaved read-modify-write from the gate itself.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Account currently signed in, if any
    async fn current_account_id(&self) -> Result<Option<String>>;

    /// Whether the library behind this account requires the age check
    async fn requires_age_gate(&self, account_id: &str) -> Result<bool>;

    /// Stored age decision
    async fn age_decision(&self, account_id: &str) -> Result<AgeDecision>;

    /// Store a new age decision
    async fn set_age_decision(&self, account_id: &str, decision: AgeDecision) -> Result<()>;

    /// Whether the user has already been shown the prompt
    async fn prompted(&self, account_id: &str) -> Result<bool>;

    /// Store the prompted flag
    async fn set_prompted(&self, account_id: &str, prompted: bool) -> Result<()>;

    /// Store the decision and the prompted flag in one write
    ///
    /// Either both fields change or neither does. The gate records every
    /// prompt outcome through this.
    async fn set_age_state(
        &self,
        account_id: &str,
        decision: AgeDecision,
        prompted: bool,
    ) -> Result<()>;
}

/// Age-related fields of one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgeState {
    pub requires_age_gate: bool,
    pub decision: AgeDecision,
    pub prompted: bool,
}

#[derive(Debug, Default)]
struct MemoryInner {
    current: Option<String>,
    accounts: HashMap<String, AgeState>,
}

/// Account store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an account
    pub async fn insert_account(&self, account_id: &str, state: AgeState) {
        let mut inner = self.inner.write().await;
        inner.accounts.insert(account_id.to_string(), state);
    }

    /// Make an account current; `None` signs out
    pub async fn set_current(&self, account_id: Option<&str>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(id) = account_id {
            if !inner.accounts.contains_key(id) {
                return Err(ShelfError::account_not_found(id));
            }
        }
        inner.current = account_id.map(str::to_string);
        Ok(())
    }

    /// Snapshot of an account's age fields
    pub async fn state(&self, account_id: &str) -> Option<AgeState> {
        self.inner.read().await.accounts.get(account_id).copied()
    }

    async fn update<F>(&self, account_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut AgeState) + Send,
    {
        let mut inner = self.inner.write().await;
        let state = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| ShelfError::account_not_found(account_id))?;
        f(state);
        Ok(())
    }

    async fn read<T, F>(&self, account_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&AgeState) -> T + Send,
    {
        let inner = self.inner.read().await;
        inner
            .accounts
            .get(account_id)
            .map(f)
            .ok_or_else(|| ShelfError::account_not_found(account_id))
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn current_account_id(&self) -> Result<Option<String>> {
        Ok(self.inner.read().await.current.clone())
    }

    async fn requires_age_gate(&self, account_id: &str) -> Result<bool> {
        self.read(account_id, |s| s.requires_age_gate).await
    }

    async fn age_decision(&self, account_id: &str) -> Result<AgeDecision> {
        self.read(account_id, |s| s.decision).await
    }

    async fn set_age_decision(&self, account_id: &str, decision: AgeDecision) -> Result<()> {
        self.update(account_id, |s| s.decision = decision).await
    }

    async fn prompted(&self, account_id: &str) -> Result<bool> {
        self.read(account_id, |s| s.prompted).await
    }

    async fn set_prompted(&self, account_id: &str, prompted: bool) -> Result<()> {
        self.update(account_id, |s| s.prompted = prompted).await
    }

    async fn set_age_state(
        &self,
        account_id: &str,
        decision: AgeDecision,
        prompted: bool,
    ) -> Result<()> {
        self.update(account_id, |s| {
            s.decision = decision;
            s.prompted = prompted;
        })
        .await
    }
}
