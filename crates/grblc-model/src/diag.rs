//! Diagnostics collected across a compilation run.
//!
//! The compiler never fails silently: every recovered condition lands in
//! the report as a `Diagnostic` attributed, where possible, to the layer
//! and job it came from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What sort of condition a diagnostic records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A malformed per-job input; that job was skipped.
    FatalInput,
    /// Degenerate geometry recovered with a best-effort substitute or skip.
    Degenerate,
    /// A requested power/speed value was clamped to machine limits.
    LimitViolation,
}

/// One recovered condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Condition category.
    pub kind: DiagnosticKind,
    /// Layer label, when attributable.
    pub layer: Option<String>,
    /// Job id, when attributable.
    pub job_id: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// New diagnostic without attribution.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            layer: None,
            job_id: None,
            message: message.into(),
        }
    }

    /// Shorthand for a `Degenerate` diagnostic.
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Degenerate, message)
    }

    /// Shorthand for a `LimitViolation` diagnostic.
    pub fn limit(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::LimitViolation, message)
    }

    /// Shorthand for a `FatalInput` diagnostic.
    pub fn fatal_input(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::FatalInput, message)
    }

    /// Attribute the diagnostic to a layer.
    pub fn with_layer(mut self, label: impl Into<String>) -> Self {
        self.layer = Some(label.into());
        self
    }

    /// Attribute the diagnostic to a job.
    pub fn with_job(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(id.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DiagnosticKind::FatalInput => write!(f, "input error")?,
            DiagnosticKind::Degenerate => write!(f, "degenerate geometry")?,
            DiagnosticKind::LimitViolation => write!(f, "limit violation")?,
        }
        if let Some(layer) = &self.layer {
            write!(f, " [layer '{layer}']")?;
        }
        if let Some(job) = &self.job_id {
            write!(f, " [job {job}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// All diagnostics from one compilation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticReport {
    entries: Vec<Diagnostic>,
}

impl DiagnosticReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one diagnostic.
    pub fn push(&mut self, diag: Diagnostic) {
        self.entries.push(diag);
    }

    /// Absorb another report, preserving order.
    pub fn merge(&mut self, other: DiagnosticReport) {
        self.entries.extend(other.entries);
    }

    /// Fill in missing layer/job attribution on every entry.
    ///
    /// Engines record diagnostics without knowing which job invoked
    /// them; the pipeline attributes the whole batch afterwards.
    pub fn attributed(mut self, layer: &str, job_id: &str) -> Self {
        for entry in &mut self.entries {
            entry.layer.get_or_insert_with(|| layer.to_owned());
            entry.job_id.get_or_insert_with(|| job_id.to_owned());
        }
        self
    }

    /// All entries in the order they were recorded.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Whether the run recorded nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries of a given kind.
    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribution_and_display() {
        let d = Diagnostic::degenerate("odd intersection count on scanline 12")
            .with_layer("engrave")
            .with_job("j-7");
        let text = d.to_string();
        assert!(text.contains("degenerate geometry"));
        assert!(text.contains("engrave"));
        assert!(text.contains("j-7"));
    }

    #[test]
    fn test_report_counts() {
        let mut report = DiagnosticReport::new();
        report.push(Diagnostic::degenerate("a"));
        report.push(Diagnostic::limit("b"));
        report.push(Diagnostic::degenerate("c"));
        assert_eq!(report.count_of(DiagnosticKind::Degenerate), 2);
        assert_eq!(report.count_of(DiagnosticKind::FatalInput), 0);
        assert_eq!(report.entries().len(), 3);
    }
}
