#![warn(missing_docs)]

//! G-code emission and the compile pipeline for the grblc laser compiler.
//!
//! [`compile`] takes a document snapshot, machine limits, and options,
//! and produces one GRBL 1.1 program plus a diagnostic report and run
//! statistics. [`emit::GcodeEmitter`] is the lower-level writer with
//! modal state tracking and coordinate quantization; the pipeline feeds
//! it toolpath segments generated by the engine crates.

pub mod emit;
pub mod pipeline;

pub use emit::GcodeEmitter;
pub use pipeline::{
    compile, CancelToken, CompileError, CompileOptions, CompileOutput, CompileStats,
    OptimizeConfig,
};
