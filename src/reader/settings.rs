//! Reader settings mapping
//!
//! The settings sheet works in slider percentages; the rendering engine wants
//! its own units. Each setting is a straight linear mapping between the two.

use crate::error::{Result, ShelfError};
use serde::{Deserialize, Serialize};

/// Linear mapping from one numeric range onto another
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeMapping {
    pub from: (f64, f64),
    pub to: (f64, f64),
}

impl RangeMapping {
    pub fn new(from: (f64, f64), to: (f64, f64)) -> Result<Self> {
        let bounds = [from.0, from.1, to.0, to.1];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(ShelfError::InvalidRange(format!(
                "{:?} -> {:?}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// Map `value`, clamped to the source range first
    ///
    /// A source range of zero (or non-finite) width maps everything to `to.0`.
    pub fn map(&self, value: f64) -> f64 {
        let (a, b) = self.from;
        let width = b - a;
        if width == 0.0 || !width.is_finite() {
            return self.to.0;
        }

        let clamped = value.clamp(a.min(b), a.max(b));
        let t = (clamped - a) / width;
        self.to.0 + t * (self.to.1 - self.to.0)
    }

    /// The reverse mapping
    pub fn invert(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

/// Slider range every setting is presented in
pub const SLIDER_RANGE: (f64, f64) = (0.0, 100.0);

/// Engine font size, percent of the publication's base size
pub const FONT_SIZE_RANGE: (f64, f64) = (75.0, 250.0);

/// Engine line height multiplier
pub const LINE_HEIGHT_RANGE: (f64, f64) = (1.0, 2.0);

/// Screen brightness as the platform expects it
pub const BRIGHTNESS_RANGE: (f64, f64) = (0.0, 1.0);

/// Settings as stored for the settings sheet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub font_size: f64,
    pub line_height: f64,
    pub brightness: f64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            font_size: 20.0,
            line_height: 50.0,
            brightness: 50.0,
        }
    }
}

/// Settings in engine units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub font_size_percent: f64,
    pub line_height: f64,
    pub brightness: f64,
}

fn mapping(to: (f64, f64)) -> RangeMapping {
    RangeMapping { from: SLIDER_RANGE, to }
}

impl ReaderSettings {
    pub fn engine_values(&self) -> EngineSettings {
        EngineSettings {
            font_size_percent: mapping(FONT_SIZE_RANGE).map(self.font_size),
            line_height: mapping(LINE_HEIGHT_RANGE).map(self.line_height),
            brightness: mapping(BRIGHTNESS_RANGE).map(self.brightness),
        }
    }

    pub fn from_engine_values(engine: &EngineSettings) -> Self {
        Self {
            font_size: mapping(FONT_SIZE_RANGE).invert().map(engine.font_size_percent),
            line_height: mapping(LINE_HEIGHT_RANGE).invert().map(engine.line_height),
            brightness: mapping(BRIGHTNESS_RANGE).invert().map(engine.brightness),
        }
    }
}
