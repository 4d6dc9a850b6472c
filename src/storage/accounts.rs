// ShelfReader - Library E-Reader Core for Mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Account storage operations
//!
//! Functions for saving and retrieving library accounts from SQLite, plus
//! [`SqliteAccountStore`], the persisted backing of the age gate.

use crate::age_gate::{AccountStore, AgeDecision};
use crate::error::{Result, ShelfError};
use crate::storage::database::Database;
use crate::storage::models::{Account, AccountRow, NewAccount};
use crate::util::date::format_timestamp;
use async_trait::async_trait;
use sqlx::SqlitePool;

const CURRENT_ACCOUNT_KEY: &str = "current_account_id";

fn now() -> String {
    format_timestamp(chrono::Utc::now())
}

/// Save or update account in database
///
/// Updating an existing account keeps its stored age decision and prompted
/// flag; only the name and gating requirement change.
pub async fn save_account(pool: &SqlitePool, account: &NewAccount) -> Result<()> {
    account.validate()?;
    let now = now();

    sqlx::query(
        r#"
        INSERT INTO Accounts (
            account_id,
            display_name,
            requires_age_gate,
            created_at,
            updated_at
        ) VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(account_id) DO UPDATE SET
            display_name = excluded.display_name,
            requires_age_gate = excluded.requires_age_gate,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&account.account_id)
    .bind(&account.display_name)
    .bind(account.requires_age_gate)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get account from database by account_id
pub async fn get_account(pool: &SqlitePool, account_id: &str) -> Result<Option<Account>> {
    let row = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT
            account_id,
            display_name,
            requires_age_gate,
            user_above_age_limit,
            age_prompted,
            created_at,
            updated_at
        FROM Accounts
        WHERE account_id = ?
        "#,
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    row.map(Account::try_from).transpose()
}

/// List all accounts, oldest first
pub async fn list_accounts(pool: &SqlitePool) -> Result<Vec<Account>> {
    let rows = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT
            account_id,
            display_name,
            requires_age_gate,
            user_above_age_limit,
            age_prompted,
            created_at,
            updated_at
        FROM Accounts
        ORDER BY created_at ASC, account_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Account::try_from).collect()
}

/// Delete account from database
///
/// Deleting the current account signs out.
pub async fn delete_account(pool: &SqlitePool, account_id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM Accounts WHERE account_id = ?")
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM AppSettings WHERE key = ? AND value = ?")
        .bind(CURRENT_ACCOUNT_KEY)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Make an account current, or sign out with `None`
pub async fn set_current_account(pool: &SqlitePool, account_id: Option<&str>) -> Result<()> {
    match account_id {
        Some(id) => {
            if get_account(pool, id).await?.is_none() {
                return Err(ShelfError::account_not_found(id));
            }
            sqlx::query(
                r#"
                INSERT INTO AppSettings (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(CURRENT_ACCOUNT_KEY)
            .bind(id)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query("DELETE FROM AppSettings WHERE key = ?")
                .bind(CURRENT_ACCOUNT_KEY)
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}

/// Sign out of the current account, forgetting its age answer
///
/// Returns the account that was signed out. Switching between accounts with
/// [`set_current_account`] keeps each account's answer; signing out is what
/// lets a user who declined be asked again.
pub async fn sign_out(pool: &SqlitePool) -> Result<String> {
    let mut tx = pool.begin().await?;

    let account_id: String = sqlx::query_scalar("SELECT value FROM AppSettings WHERE key = ?")
        .bind(CURRENT_ACCOUNT_KEY)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ShelfError::NoActiveAccount)?;

    sqlx::query(
        "UPDATE Accounts SET user_above_age_limit = NULL, age_prompted = 0, updated_at = ? WHERE account_id = ?",
    )
    .bind(now())
    .bind(&account_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM AppSettings WHERE key = ?")
        .bind(CURRENT_ACCOUNT_KEY)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(account_id)
}

/// Get the id of the account currently signed in
pub async fn get_current_account_id(pool: &SqlitePool) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM AppSettings WHERE key = ?")
        .bind(CURRENT_ACCOUNT_KEY)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

/// Update the stored age decision and prompted flag together
pub async fn update_age_state(
    pool: &SqlitePool,
    account_id: &str,
    decision: AgeDecision,
    prompted: bool,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE Accounts
        SET user_above_age_limit = ?,
            age_prompted = ?,
            updated_at = ?
        WHERE account_id = ?
        "#,
    )
    .bind(decision.to_db())
    .bind(prompted)
    .bind(now())
    .bind(account_id)
    .execute(pool)
    .await?;

    expect_one_row(result.rows_affected(), account_id)
}

/// Forget the age answer so the user is asked again
pub async fn reset_age_state(pool: &SqlitePool, account_id: &str) -> Result<()> {
    update_age_state(pool, account_id, AgeDecision::Unknown, false).await
}

async fn set_age_decision(pool: &SqlitePool, account_id: &str, decision: AgeDecision) -> Result<()> {
    let result = sqlx::query(
        "UPDATE Accounts SET user_above_age_limit = ?, updated_at = ? WHERE account_id = ?",
    )
    .bind(decision.to_db())
    .bind(now())
    .bind(account_id)
    .execute(pool)
    .await?;

    expect_one_row(result.rows_affected(), account_id)
}

async fn set_age_prompted(pool: &SqlitePool, account_id: &str, prompted: bool) -> Result<()> {
    let result = sqlx::query(
        "UPDATE Accounts SET age_prompted = ?, updated_at = ? WHERE account_id = ?",
    )
    .bind(prompted)
    .bind(now())
    .bind(account_id)
    .execute(pool)
    .await?;

    expect_one_row(result.rows_affected(), account_id)
}

fn expect_one_row(rows_affected: u64, account_id: &str) -> Result<()> {
    if rows_affected == 0 {
        Err(ShelfError::account_not_found(account_id))
    } else {
        Ok(())
    }
}

/// Age gate account store backed by SQLite
#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    db: Database,
}

impl SqliteAccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn account(&self, account_id: &str) -> Result<Account> {
        get_account(self.db.pool(), account_id)
            .await?
            .ok_or_else(|| ShelfError::account_not_found(account_id))
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn current_account_id(&self) -> Result<Option<String>> {
        get_current_account_id(self.db.pool()).await
    }

    async fn requires_age_gate(&self, account_id: &str) -> Result<bool> {
        Ok(self.account(account_id).await?.requires_age_gate)
    }

    async fn age_decision(&self, account_id: &str) -> Result<AgeDecision> {
        Ok(self.account(account_id).await?.age_decision)
    }

    async fn set_age_decision(&self, account_id: &str, decision: AgeDecision) -> Result<()> {
        set_age_decision(self.db.pool(), account_id, decision).await
    }

    async fn prompted(&self, account_id: &str) -> Result<bool> {
        Ok(self.account(account_id).await?.age_prompted)
    }

    async fn set_prompted(&self, account_id: &str, prompted: bool) -> Result<()> {
        set_age_prompted(self.db.pool(), account_id, prompted).await
    }

    async fn set_age_state(
        &self,
        account_id: &str,
        decision: AgeDecision,
        prompted: bool,
    ) -> Result<()> {
        update_age_state(self.db.pool(), account_id, decision, prompted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, gated: bool) -> NewAccount {
        NewAccount::new(id.to_string(), format!("Library {}", id), gated)
    }

    #[tokio::test]
    async fn test_save_and_get_account() {
        let db = Database::new_in_memory().await.unwrap();

        save_account(db.pool(), &card("23910001", true)).await.unwrap();

        let account = get_account(db.pool(), "23910001")
            .await
            .unwrap()
            .expect("Account not found");

        assert_eq!(account.display_name, "Library 23910001");
        assert!(account.requires_age_gate);
        assert_eq!(account.age_decision, AgeDecision::Unknown);
        assert!(!account.age_prompted);
    }

    #[tokio::test]
    async fn test_resave_keeps_age_state() {
        let db = Database::new_in_memory().await.unwrap();
        save_account(db.pool(), &card("a", true)).await.unwrap();
        update_age_state(db.pool(), "a", AgeDecision::Denied, true).await.unwrap();

        save_account(db.pool(), &card("a", false)).await.unwrap();

        let account = get_account(db.pool(), "a").await.unwrap().unwrap();
        assert!(!account.requires_age_gate);
        assert_eq!(account.age_decision, AgeDecision::Denied);
        assert!(account.age_prompted);
    }

    #[tokio::test]
    async fn test_current_account() {
        let db = Database::new_in_memory().await.unwrap();
        save_account(db.pool(), &card("first", false)).await.unwrap();
        save_account(db.pool(), &card("second", false)).await.unwrap();

        assert_eq!(get_current_account_id(db.pool()).await.unwrap(), None);

        set_current_account(db.pool(), Some("second")).await.unwrap();
        assert_eq!(
            get_current_account_id(db.pool()).await.unwrap().as_deref(),
            Some("second")
        );

        assert!(matches!(
            set_current_account(db.pool(), Some("ghost")).await,
            Err(ShelfError::AccountNotFound(_))
        ));

        set_current_account(db.pool(), None).await.unwrap();
        assert_eq!(get_current_account_id(db.pool()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_current_signs_out() {
        let db = Database::new_in_memory().await.unwrap();
        save_account(db.pool(), &card("a", false)).await.unwrap();
        save_account(db.pool(), &card("b", false)).await.unwrap();
        set_current_account(db.pool(), Some("a")).await.unwrap();

        delete_account(db.pool(), "b").await.unwrap();
        assert_eq!(get_current_account_id(db.pool()).await.unwrap().as_deref(), Some("a"));

        delete_account(db.pool(), "a").await.unwrap();
        assert_eq!(get_current_account_id(db.pool()).await.unwrap(), None);
        assert!(list_accounts(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_switching_keeps_age_answer() {
        let db = Database::new_in_memory().await.unwrap();
        save_account(db.pool(), &card("a", true)).await.unwrap();
        save_account(db.pool(), &card("b", true)).await.unwrap();
        set_current_account(db.pool(), Some("a")).await.unwrap();
        update_age_state(db.pool(), "a", AgeDecision::Allowed, true).await.unwrap();

        set_current_account(db.pool(), Some("b")).await.unwrap();
        set_current_account(db.pool(), Some("a")).await.unwrap();

        let account = get_account(db.pool(), "a").await.unwrap().unwrap();
        assert_eq!(account.age_decision, AgeDecision::Allowed);
        assert!(account.age_prompted);
    }

    #[tokio::test]
    async fn test_sign_out_resets_departing_account() {
        let db = Database::new_in_memory().await.unwrap();
        save_account(db.pool(), &card("a", true)).await.unwrap();
        save_account(db.pool(), &card("b", true)).await.unwrap();
        update_age_state(db.pool(), "a", AgeDecision::Denied, true).await.unwrap();
        update_age_state(db.pool(), "b", AgeDecision::Allowed, true).await.unwrap();
        set_current_account(db.pool(), Some("a")).await.unwrap();

        assert_eq!(sign_out(db.pool()).await.unwrap(), "a");
        assert_eq!(get_current_account_id(db.pool()).await.unwrap(), None);

        let a = get_account(db.pool(), "a").await.unwrap().unwrap();
        assert_eq!(a.age_decision, AgeDecision::Unknown);
        assert!(!a.age_prompted);
        let b = get_account(db.pool(), "b").await.unwrap().unwrap();
        assert_eq!(b.age_decision, AgeDecision::Allowed);

        assert!(matches!(
            sign_out(db.pool()).await,
            Err(ShelfError::NoActiveAccount)
        ));
    }

    #[tokio::test]
    async fn test_reset_age_state() {
        let db = Database::new_in_memory().await.unwrap();
        save_account(db.pool(), &card("a", true)).await.unwrap();
        update_age_state(db.pool(), "a", AgeDecision::Denied, true).await.unwrap();

        reset_age_state(db.pool(), "a").await.unwrap();

        let account = get_account(db.pool(), "a").await.unwrap().unwrap();
        assert_eq!(account.age_decision, AgeDecision::Unknown);
        assert!(!account.age_prompted);
    }

    #[tokio::test]
    async fn test_update_missing_account() {
        let db = Database::new_in_memory().await.unwrap();
        let result = update_age_state(db.pool(), "nobody", AgeDecision::Allowed, true).await;
        assert!(matches!(result, Err(ShelfError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_store_trait() {
        let db = Database::new_in_memory().await.unwrap();
        save_account(db.pool(), &card("a", true)).await.unwrap();
        set_current_account(db.pool(), Some("a")).await.unwrap();

        let store = SqliteAccountStore::new(db);
        assert_eq!(store.current_account_id().await.unwrap().as_deref(), Some("a"));
        assert!(store.requires_age_gate("a").await.unwrap());

        store.set_age_decision("a", AgeDecision::Allowed).await.unwrap();
        store.set_prompted("a", true).await.unwrap();

        assert_eq!(store.age_decision("a").await.unwrap(), AgeDecision::Allowed);
        assert!(store.prompted("a").await.unwrap());

        store.set_age_state("a", AgeDecision::Denied, false).await.unwrap();
        assert_eq!(store.age_decision("a").await.unwrap(), AgeDecision::Denied);
        assert!(!store.prompted("a").await.unwrap());
    }
}
