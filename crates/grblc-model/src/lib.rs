#![warn(missing_docs)]

//! Document and machine data model for the grblc laser G-code compiler.
//!
//! This crate defines the read-only snapshot the compiler consumes: layers
//! with their ordered laser jobs and raw geometry, the machine limits used
//! for clamping, and the diagnostic report every recovered condition lands
//! in. The host editor owns the mutable side (dialogs, document nodes) and
//! hands the core one immutable snapshot per compilation run.

pub mod diag;
pub mod error;
pub mod geometry;
pub mod job;
pub mod layer;
pub mod machine;

pub use diag::{Diagnostic, DiagnosticKind, DiagnosticReport};
pub use error::ModelError;
pub use geometry::{Element, ImageGrid, PathCommand, PathGeometry, Point2D};
pub use job::{Job, JobKind, JobParams, LaserMode, ScanDirection};
pub use layer::{Document, Layer};
pub use machine::MachineLimits;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
