//! Machine limits.
//!
//! Loaded once per compilation run and passed explicitly to every
//! component that clamps against it. Engines never look limits up from
//! ambient state.

use serde::{Deserialize, Serialize};

use crate::{ModelError, Result};

/// Machine-level limits and defaults.
///
/// Every emitted power and speed value is clamped against these; every
/// emitted coordinate is quantized to `resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineLimits {
    /// Maximum S value the controller supports.
    pub max_power: f64,
    /// Maximum feed rate in mm/min.
    pub max_speed: f64,
    /// Rapid travel speed in mm/min.
    pub travel_speed: f64,
    /// Minimum distinguishable coordinate step in mm.
    pub resolution: f64,
    /// Laser kerf width in mm, used to compensate contour offsets.
    pub kerf_width: f64,
}

/// Floor applied when clamping speeds, mm/min. GRBL rejects F0, but any
/// strictly positive feed is valid, so only zero and negative requests
/// get lifted.
const MIN_SPEED: f64 = 1e-3;

impl Default for MachineLimits {
    fn default() -> Self {
        Self {
            max_power: 1000.0,
            max_speed: 6000.0,
            travel_speed: 4000.0,
            resolution: 0.1,
            kerf_width: 0.0,
        }
    }
}

impl MachineLimits {
    /// Validate that the limits can drive a compilation run.
    pub fn validate(&self) -> Result<()> {
        if self.max_power <= 0.0 {
            return Err(ModelError::InvalidLimits("max_power must be positive".into()));
        }
        if self.max_speed <= 0.0 || self.travel_speed <= 0.0 {
            return Err(ModelError::InvalidLimits("speeds must be positive".into()));
        }
        if self.resolution <= 0.0 {
            return Err(ModelError::InvalidLimits("resolution must be positive".into()));
        }
        if self.kerf_width < 0.0 {
            return Err(ModelError::InvalidLimits("kerf_width must be non-negative".into()));
        }
        Ok(())
    }

    /// Clamp a power value to `[0, max_power]`.
    pub fn clamp_power(&self, value: f64) -> f64 {
        value.clamp(0.0, self.max_power)
    }

    /// Clamp a feed rate to `(0, max_speed]` mm/min.
    pub fn clamp_speed(&self, value: f64) -> f64 {
        value.clamp(MIN_SPEED, self.max_speed)
    }
}
