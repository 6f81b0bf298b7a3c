//! Laser job descriptors.
//!
//! A job is one laser operation (cut, fill, or raster) on a layer. Jobs
//! are persisted by the host as one JSON object per job with the common
//! keys `id`, `type`, `active`, `speed`, `power`, `order` and the
//! type-specific keys flattened alongside them. Unknown extra keys are
//! ignored; missing common keys fail that job's decode.

use serde::{Deserialize, Serialize};

use crate::{ModelError, Result};

/// Laser job type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Trace shape outlines.
    Cut,
    /// Hatch the interior of closed shapes.
    Fill,
    /// Engrave an image by power modulation.
    Raster,
}

/// GRBL laser activation command family.
///
/// Constant power holds the programmed S value; dynamic power scales it
/// with actual head speed so accel/decel phases do not over-burn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaserMode {
    /// `M3` — constant power.
    #[default]
    #[serde(rename = "M3", alias = "constant")]
    Constant,
    /// `M4` — power scaled with speed.
    #[serde(rename = "M4", alias = "dynamic")]
    Dynamic,
}

/// Raster scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanDirection {
    /// Scan along X, advance along Y.
    #[default]
    Horizontal,
    /// Scan along Y, advance along X.
    Vertical,
}

fn default_passes() -> u32 {
    1
}

fn default_angle() -> f64 {
    45.0
}

fn default_spacing() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

fn default_dpi() -> f64 {
    300.0
}

fn default_power_max() -> f64 {
    600.0
}

/// Type-specific job parameters, tagged by the `type` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobParams {
    /// Contour tracing parameters.
    Cut {
        /// Contour offset in mm, positive = outward.
        #[serde(default)]
        offset: f64,
        /// Number of repeated passes over the same geometry.
        #[serde(default = "default_passes")]
        passes: u32,
        /// Laser activation command family.
        #[serde(default)]
        laser_mode: LaserMode,
    },
    /// Scanline hatching parameters.
    Fill {
        /// Hatch angle in degrees, wraps modulo 360.
        #[serde(default = "default_angle")]
        angle: f64,
        /// Distance between hatch lines in mm.
        #[serde(default = "default_spacing")]
        spacing: f64,
        /// Reverse every other scanline (boustrophedon travel).
        #[serde(default = "default_true")]
        alternate: bool,
        /// Laser activation command family.
        #[serde(default)]
        laser_mode: LaserMode,
    },
    /// Image engraving parameters.
    Raster {
        /// Output resolution in dots per inch.
        #[serde(default = "default_dpi")]
        dpi: f64,
        /// Scan direction.
        #[serde(default)]
        scan_direction: ScanDirection,
        /// Power emitted for fully white samples.
        #[serde(default)]
        power_min: f64,
        /// Power emitted for fully black samples.
        #[serde(default = "default_power_max")]
        power_max: f64,
        /// Laser activation command family. Raster defaults to dynamic
        /// power so scanline turnarounds do not over-burn.
        #[serde(default = "raster_laser_mode")]
        laser_mode: LaserMode,
    },
}

fn raster_laser_mode() -> LaserMode {
    LaserMode::Dynamic
}

impl JobParams {
    /// The job kind this parameter set belongs to.
    pub fn kind(&self) -> JobKind {
        match self {
            JobParams::Cut { .. } => JobKind::Cut,
            JobParams::Fill { .. } => JobKind::Fill,
            JobParams::Raster { .. } => JobKind::Raster,
        }
    }

    /// The laser activation family for this job.
    pub fn laser_mode(&self) -> LaserMode {
        match self {
            JobParams::Cut { laser_mode, .. }
            | JobParams::Fill { laser_mode, .. }
            | JobParams::Raster { laser_mode, .. } => *laser_mode,
        }
    }
}

/// A single laser operation on a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque unique identifier.
    pub id: String,
    /// Whether this job participates in compilation.
    pub active: bool,
    /// Feed rate in mm/min.
    pub speed: f64,
    /// Laser power (S value on the 0-1000 scale).
    pub power: f64,
    /// Execution position within the owning layer.
    pub order: u32,
    /// Type-specific parameters (carries the `type` tag on the wire).
    #[serde(flatten)]
    pub params: JobParams,
}

impl Job {
    /// Decode a job from its persisted JSON descriptor.
    pub fn from_json(raw: &str) -> Result<Self> {
        let job: Job = serde_json::from_str(raw)?;
        job.validate()?;
        Ok(job)
    }

    /// Encode the job to its persisted JSON descriptor.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The job kind.
    pub fn kind(&self) -> JobKind {
        self.params.kind()
    }

    /// Validate value ranges after decoding.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(ModelError::InvalidJob {
                id: self.id.clone(),
                reason: reason.into(),
            })
        };
        if self.speed <= 0.0 {
            return fail("speed must be positive");
        }
        if self.power < 0.0 {
            return fail("power must be non-negative");
        }
        match &self.params {
            JobParams::Cut { passes, .. } => {
                if *passes < 1 {
                    return fail("passes must be at least 1");
                }
            }
            JobParams::Fill { spacing, .. } => {
                if *spacing <= 0.0 {
                    return fail("spacing must be positive");
                }
            }
            JobParams::Raster {
                dpi,
                power_min,
                power_max,
                ..
            } => {
                if *dpi <= 0.0 {
                    return fail("dpi must be positive");
                }
                if *power_min < 0.0 || *power_max < *power_min {
                    return fail("power range must satisfy 0 <= min <= max");
                }
            }
        }
        Ok(())
    }
}
