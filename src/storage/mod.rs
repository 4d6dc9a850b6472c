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


//! Database storage and models
//!
//! This module handles all database operations using SQLite via sqlx.
//!
//! # Database Schema
//! - Accounts: library cards signed in on this device, with the persisted
//!   age decision and "already prompted" flag
//! - AppSettings: key/value pairs, currently just the active account
//!
//! # Usage Example
//! ```no_run
//! use shelf_core::storage::{accounts, Database, NewAccount};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./shelf.db").await?;
//!
//! let card = NewAccount::new(
//!     "23910001234567".to_string(),
//!     "Brooklyn Public Library".to_string(),
//!     true,
//! );
//! accounts::save_account(db.pool(), &card).await?;
//! accounts::set_current_account(db.pool(), Some("23910001234567")).await?;
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod database;
pub mod migrations;
pub mod models;

// Re-export commonly used types
pub use accounts::SqliteAccountStore;
pub use database::Database;
pub use models::{Account, NewAccount};
