//! Small shared helpers

pub mod date;

pub use date::{days_until, format_timestamp, parse_timestamp};
