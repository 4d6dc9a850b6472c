//! Reader-side helpers
//!
//! Format selection decides which reading module opens a publication;
//! settings mapping converts the settings sheet's sliders to engine units.
//! Rendering and decryption themselves belong to the platform reading SDK.

pub mod format;
pub mod settings;

pub use format::ReaderFormat;
pub use settings::{EngineSettings, RangeMapping, ReaderSettings};
