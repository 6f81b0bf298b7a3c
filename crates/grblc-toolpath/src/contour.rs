//! Contour (cut) engine.
//!
//! Traces path outlines with an optional parallel offset and repeated
//! passes. Passes re-burn identical geometry; the pass count multiplies
//! segments, never changes them.

use grblc_math::Point2;
use grblc_model::{Diagnostic, DiagnosticReport};

use crate::{Polyline, Segment};

/// Generate cut segments for a set of flattened paths.
///
/// `offset` is the job's contour offset (positive = outward);
/// `kerf_width` is the machine beam width, half of which is added to the
/// effective offset of closed paths so the cut lands on the drawn line.
/// Open paths are traced as-is; an offset requested for an open path is
/// skipped with a diagnostic.
pub fn generate_cut(
    paths: &[Polyline],
    offset: f64,
    passes: u32,
    kerf_width: f64,
    report: &mut DiagnosticReport,
) -> Vec<Segment> {
    let mut segments = Vec::new();

    for path in paths {
        if path.len() < 2 {
            continue;
        }

        let traced = if path.closed {
            let effective = offset + kerf_width / 2.0;
            if effective.abs() > f64::EPSILON {
                match path.offset(effective, report) {
                    Some(offset_path) => offset_path,
                    // Degenerate offset already reported; cut the
                    // original outline instead.
                    None => path.clone(),
                }
            } else {
                path.clone()
            }
        } else {
            if offset.abs() > f64::EPSILON {
                report.push(Diagnostic::degenerate(
                    "contour offset skipped for open path",
                ));
            }
            path.clone()
        };

        let points = trace_points(&traced);
        for _ in 0..passes.max(1) {
            segments.push(Segment::uniform(points.clone(), traced.closed));
        }
    }

    segments
}

/// Vertices in trace order; closed paths return to their start vertex.
fn trace_points(path: &Polyline) -> Vec<Point2> {
    let mut points = path.points.clone();
    if path.closed {
        if let Some(&first) = points.first() {
            points.push(first);
        }
    }
    points
}
