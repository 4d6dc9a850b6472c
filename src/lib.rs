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


//! Native core of the ShelfReader library e-reader
//!
//! - [`age_gate`] - one-time "are you old enough" check shared by all callers
//! - [`storage`] - SQLite persistence of library accounts
//! - [`reader`] - reading module selection and settings mapping
//! - [`util`] - timestamp parsing and formatting
//! - [`config`] - JSON configuration with defaults
//! - [`ios_bridge`] - C FFI consumed by the Swift module

uniffi::setup_scaffolding!();

pub mod age_gate;
pub mod config;
pub mod error;
pub mod ios_bridge;
pub mod reader;
pub mod storage;
pub mod util;

pub use error::{Result, ShelfError};

use reader::{RangeMapping, ReaderFormat};

/// Pick the reading module for an acquisition link's media type
#[uniffi::export]
pub fn select_reader_format(media_type: String) -> Option<ReaderFormat> {
    ReaderFormat::from_media_type(&media_type)
}

/// Map a value between two ranges, clamped to the source range
#[uniffi::export]
pub fn map_setting(value: f64, from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> f64 {
    RangeMapping {
        from: (from_min, from_max),
        to: (to_min, to_max),
    }
    .map(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_reader_format() {
        assert_eq!(
            select_reader_format("application/pdf".to_string()),
            Some(ReaderFormat::Pdf)
        );
        assert_eq!(select_reader_format("image/png".to_string()), None);
    }

    #[test]
    fn test_map_setting() {
        assert_eq!(map_setting(50.0, 0.0, 100.0, 0.0, 1.0), 0.5);
    }
}
