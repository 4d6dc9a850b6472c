// ShelfReader - Library E-Reader Core for Mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Database models
//!
//! Rows are read into `*Row` structs with raw column types and converted
//! into domain structs, so decoding errors surface as `CorruptRecord`
//! instead of panics.

use crate::age_gate::AgeDecision;
use crate::error::{Result, ShelfError};
use crate::util::date::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A library account (one library card) signed in on this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Library card barcode or provider account id
    pub account_id: String,

    /// Name shown in the account switcher
    pub display_name: String,

    /// The library's authentication document asks for an age check
    pub requires_age_gate: bool,

    /// Stored answer to the age prompt
    pub age_decision: AgeDecision,

    /// The age prompt has been shown for this account
    pub age_prompted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to add an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub account_id: String,
    pub display_name: String,
    pub requires_age_gate: bool,
}

impl NewAccount {
    pub fn new(account_id: String, display_name: String, requires_age_gate: bool) -> Self {
        Self {
            account_id,
            display_name,
            requires_age_gate,
        }
    }

    /// Reject blank identifiers before they reach the database
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(ShelfError::AccountValidationFailed {
                field: "account_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.display_name.trim().is_empty() {
            return Err(ShelfError::AccountValidationFailed {
                field: "display_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Raw `Accounts` row
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub account_id: String,
    pub display_name: String,
    pub requires_age_gate: bool,
    pub user_above_age_limit: Option<i64>,
    pub age_prompted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<AccountRow> for Account {
    type Error = ShelfError;

    fn try_from(row: AccountRow) -> Result<Self> {
        let created_at = parse_timestamp(&row.created_at)
            .ok_or_else(|| ShelfError::corrupt("created_at", &row.created_at))?;
        let updated_at = parse_timestamp(&row.updated_at)
            .ok_or_else(|| ShelfError::corrupt("updated_at", &row.updated_at))?;

        Ok(Account {
            age_decision: AgeDecision::from_db(row.user_above_age_limit)?,
            account_id: row.account_id,
            display_name: row.display_name,
            requires_age_gate: row.requires_age_gate,
            age_prompted: row.age_prompted,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> AccountRow {
        AccountRow {
            account_id: "23910001234567".to_string(),
            display_name: "Brooklyn Public Library".to_string(),
            requires_age_gate: true,
            user_above_age_limit: Some(1),
            age_prompted: true,
            created_at: "2025-03-01T10:00:00+00:00".to_string(),
            updated_at: "2025-03-02 11:30:00".to_string(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let account = Account::try_from(row()).unwrap();
        assert_eq!(account.age_decision, AgeDecision::Allowed);
        assert!(account.updated_at > account.created_at);
    }

    #[test]
    fn test_corrupt_timestamp() {
        let mut bad = row();
        bad.created_at = "yesterday".to_string();
        assert!(matches!(
            Account::try_from(bad),
            Err(ShelfError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let account = NewAccount::new("  ".to_string(), "NYPL".to_string(), false);
        assert!(account.validate().is_err());
    }
}
