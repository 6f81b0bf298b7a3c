#![warn(missing_docs)]

//! Toolpath engines for the grblc laser G-code compiler.
//!
//! Converts raw layer geometry into ordered toolpath segments:
//!
//! - [`contour`] traces shape outlines with offset and multi-pass repeats
//! - [`hatch`] fills closed shapes with parallel scanlines
//! - [`raster`] converts grayscale images into power-modulated scan lines
//! - [`optimize`] reorders independent segments to shorten travel moves
//!
//! Engines are pure: geometry and parameters in, segments plus a
//! [`DiagnosticReport`](grblc_model::DiagnosticReport) out. Nothing here
//! touches machine limits; clamping belongs to the emitter.

pub mod contour;
pub mod hatch;
pub mod optimize;
pub mod polyline;
pub mod raster;
pub mod segment;

pub use contour::generate_cut;
pub use hatch::generate_hatch;
pub use optimize::{optimize, plan, travel_distance, OptimizeScope, OptimizeStats};
pub use polyline::{flatten_path, BoundingBox, Polyline};
pub use raster::{generate_raster, pixel_power};
pub use segment::{LaserState, Segment};

/// Chordal tolerance for Bezier flattening, mm.
pub const CURVE_TOLERANCE: f64 = 0.1;

/// Start/end distance below which a path counts as closed, mm.
pub const CLOSED_PATH_TOLERANCE: f64 = 0.01;

/// Mapped raster power at or below this is treated as laser-off travel.
pub const POWER_OFF_EPS: f64 = 1e-6;
