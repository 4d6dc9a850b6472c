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


//! Age verification gate
//!
//! Some library accounts only lend age-restricted content once the user has
//! confirmed they are above the library's age threshold. The confirmation is
//! asked once per account and remembered.
//!
//! # Collaborators
//! - [`AccountStore`] - persisted decision and "already prompted" flag
//! - [`AgePromptPresenter`] - platform UI showing the yes/no question
//!
//! # Flow
//! 1. No active account: deny
//! 2. Account not gated, or decision already `Allowed`: permit
//! 3. Already prompted without being allowed: deny, never re-ask
//! 4. Otherwise show the prompt, or queue behind the one already showing
//! 5. When the prompt resolves, persist and answer every queued caller
//!
//! # Usage Example
//! ```no_run
//! use std::sync::Arc;
//! use shelf_core::age_gate::{AgeGate, MemoryAccountStore, CallbackPresenter};
//! use shelf_core::config::AgeGateConfig;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryAccountStore::new());
//! let presenter = Arc::new(CallbackPresenter::new(|_prompt, responder| {
//!     // Hand the responder to the UI; it answers later.
//!     responder.answer(true);
//! }));
//!
//! let gate = AgeGate::new(store, presenter, AgeGateConfig::default());
//! gate.verify_age_requirement(|permitted| {
//!     println!("permitted: {permitted}");
//! });
//! # }
//! ```

pub mod gate;
pub mod presenter;
pub mod store;

pub use gate::{AgeGate, GateStatus};
pub use presenter::{AgePrompt, AgePromptPresenter, CallbackPresenter, PromptResponder};
pub use store::{AccountStore, MemoryAccountStore};

use crate::error::{Result, ShelfError};
use serde::{Deserialize, Serialize};

/// Persisted answer to "is the user old enough"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeDecision {
    /// Never answered
    #[default]
    Unknown,
    /// At or above the threshold
    Allowed,
    /// Below the threshold
    Denied,
}

impl AgeDecision {
    /// Decision matching a prompt answer
    pub fn from_answer(above_threshold: bool) -> Self {
        if above_threshold {
            AgeDecision::Allowed
        } else {
            AgeDecision::Denied
        }
    }

    /// Whether this decision grants access
    pub fn permits(&self) -> bool {
        matches!(self, AgeDecision::Allowed)
    }

    /// Encode for the nullable `user_above_age_limit` column
    pub fn to_db(self) -> Option<i64> {
        match self {
            AgeDecision::Unknown => None,
            AgeDecision::Allowed => Some(1),
            AgeDecision::Denied => Some(0),
        }
    }

    /// Decode the nullable `user_above_age_limit` column
    pub fn from_db(value: Option<i64>) -> Result<Self> {
        match value {
            None => Ok(AgeDecision::Unknown),
            Some(1) => Ok(AgeDecision::Allowed),
            Some(0) => Ok(AgeDecision::Denied),
            Some(other) => Err(ShelfError::corrupt("user_above_age_limit", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_encoding() {
        for decision in [AgeDecision::Unknown, AgeDecision::Allowed, AgeDecision::Denied] {
            assert_eq!(AgeDecision::from_db(decision.to_db()).unwrap(), decision);
        }
        assert!(AgeDecision::from_db(Some(7)).is_err());
    }

    #[test]
    fn test_only_allowed_permits() {
        assert!(AgeDecision::Allowed.permits());
        assert!(!AgeDecision::Denied.permits());
        assert!(!AgeDecision::Unknown.permits());
        assert_eq!(AgeDecision::from_answer(false), AgeDecision::Denied);
    }
}
