//! Hatch (fill) engine.
//!
//! Scanline fill: rotate the polygon so hatch lines become horizontal,
//! cast scanlines at the job spacing, pair edge crossings left-to-right
//! under the even-odd rule, and rotate the resulting spans back.

use grblc_math::{distance, Point2, Rotation2};
use grblc_model::{Diagnostic, DiagnosticReport};

use crate::{Polyline, Segment};

/// Generate hatch segments for a set of flattened paths.
///
/// Non-closed paths are skipped with a `Degenerate` diagnostic. With
/// `alternate` set, every other scanline runs right-to-left so the head
/// sweeps boustrophedon instead of flying back.
pub fn generate_hatch(
    paths: &[Polyline],
    angle: f64,
    spacing: f64,
    alternate: bool,
    report: &mut DiagnosticReport,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    if spacing <= 0.0 {
        report.push(Diagnostic::degenerate("hatch spacing must be positive"));
        return segments;
    }

    for path in paths {
        if !path.closed || path.len() < 3 {
            report.push(Diagnostic::degenerate(
                "skipping non-closed path for fill job",
            ));
            continue;
        }
        hatch_polygon(path, angle, spacing, alternate, report, &mut segments);
    }

    segments
}

fn hatch_polygon(
    path: &Polyline,
    angle: f64,
    spacing: f64,
    alternate: bool,
    report: &mut DiagnosticReport,
    out: &mut Vec<Segment>,
) {
    let rot = Rotation2::from_degrees(-angle);
    let back = rot.inverse();

    let rotated: Vec<Point2> = path.points.iter().map(|&p| rot.apply(p)).collect();
    let (y_min, y_max) = match rotated
        .iter()
        .map(|p| p.y)
        .fold(None, |acc: Option<(f64, f64)>, y| match acc {
            None => Some((y, y)),
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        }) {
        Some(range) => range,
        None => return,
    };

    let mut y = y_min + spacing;
    let mut line_idx = 0usize;

    while y < y_max {
        let mut crossings = scanline_crossings(&rotated, y);
        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        if crossings.len() % 2 == 1 {
            // Numerical degeneracy (scanline grazing a vertex); drop the
            // unmatched crossing and keep going.
            crossings.pop();
            report.push(Diagnostic::degenerate(format!(
                "odd intersection count on hatch line {line_idx}"
            )));
        }

        let reversed = alternate && line_idx % 2 == 1;
        let mut spans: Vec<(f64, f64)> = crossings.chunks(2).map(|c| (c[0], c[1])).collect();
        if reversed {
            spans.reverse();
        }

        for (x_enter, x_exit) in spans {
            let mut a = back.apply(Point2::new(x_enter, y));
            let mut b = back.apply(Point2::new(x_exit, y));
            if reversed {
                std::mem::swap(&mut a, &mut b);
            }
            // Tangent scanlines produce zero-width spans; nothing to burn.
            if distance(a, b) < 1e-9 {
                continue;
            }
            out.push(Segment::uniform(vec![a, b], false));
        }

        y += spacing;
        line_idx += 1;
    }
}

/// X coordinates where the horizontal line at `y` crosses polygon edges.
///
/// Each edge is half-open (`y1 <= y < y2`) so a scanline passing exactly
/// through a vertex counts the crossing once, not twice.
fn scanline_crossings(polygon: &[Point2], y: f64) -> Vec<f64> {
    let n = polygon.len();
    let mut xs = Vec::new();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if a.y == b.y {
            continue;
        }
        if (a.y <= y && y < b.y) || (b.y <= y && y < a.y) {
            let t = (y - a.y) / (b.y - a.y);
            xs.push(a.x + t * (b.x - a.x));
        }
    }
    xs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;
    use approx::assert_relative_eq;
    use grblc_model::DiagnosticKind;

    fn square(side: f64) -> Polyline {
        Polyline::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(side, 0.0),
                Point2::new(side, side),
                Point2::new(0.0, side),
            ],
            true,
        )
    }

    #[test]
    fn test_horizontal_hatch_square() {
        let mut report = DiagnosticReport::new();
        let segments = generate_hatch(&[square(10.0)], 0.0, 1.0, false, &mut report);
        // scanlines at y = 1..9
        assert_eq!(segments.len(), 9);
        for seg in &segments {
            assert_eq!(seg.points.len(), 2);
            assert_relative_eq!(seg.length(), 10.0, epsilon = 1e-9);
        }
        assert!(report.is_empty());
    }

    #[test]
    fn test_spacing_controls_count() {
        let mut report = DiagnosticReport::new();
        let fine = generate_hatch(&[square(10.0)], 0.0, 0.5, false, &mut report);
        let coarse = generate_hatch(&[square(10.0)], 0.0, 2.0, false, &mut report);
        assert!(fine.len() > coarse.len());
    }

    #[test]
    fn test_alternate_reverses_every_other_line() {
        let mut report = DiagnosticReport::new();
        let segments = generate_hatch(&[square(10.0)], 0.0, 1.0, true, &mut report);
        assert_relative_eq!(segments[0].start().x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(segments[1].start().x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(segments[2].start().x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_angled_hatch_stays_inside_bbox() {
        let mut report = DiagnosticReport::new();
        let segments = generate_hatch(&[square(10.0)], 37.0, 0.7, true, &mut report);
        assert!(!segments.is_empty());
        let bbox = BoundingBox {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(10.0, 10.0),
        };
        for seg in &segments {
            for &p in &seg.points {
                assert!(bbox.contains(p, 1e-6), "point {p:?} escaped the square");
            }
        }
    }

    #[test]
    fn test_no_consecutive_identical_points() {
        let mut report = DiagnosticReport::new();
        let segments = generate_hatch(&[square(10.0)], 45.0, 0.5, true, &mut report);
        for seg in &segments {
            for w in seg.points.windows(2) {
                assert!(distance(w[0], w[1]) > 1e-9);
            }
        }
    }

    #[test]
    fn test_open_path_skipped_with_one_diagnostic() {
        let open = Polyline::new(
            vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)],
            false,
        );
        let mut report = DiagnosticReport::new();
        let segments = generate_hatch(&[open], 0.0, 1.0, true, &mut report);
        assert!(segments.is_empty());
        assert_eq!(report.count_of(DiagnosticKind::Degenerate), 1);
    }

    #[test]
    fn test_concave_polygon_splits_spans() {
        // U shape: scanlines through the notch produce two spans
        let u = Polyline::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(7.0, 10.0),
                Point2::new(7.0, 4.0),
                Point2::new(3.0, 4.0),
                Point2::new(3.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
            true,
        );
        let mut report = DiagnosticReport::new();
        let segments = generate_hatch(&[u], 0.0, 1.0, false, &mut report);
        // above y=4 each scanline yields two spans
        let at_y7: Vec<_> = segments
            .iter()
            .filter(|s| (s.start().y - 7.0).abs() < 1e-9)
            .collect();
        assert_eq!(at_y7.len(), 2);
        // spans avoid the notch interior
        for seg in &at_y7 {
            let xs = [seg.start().x, seg.end().x];
            assert!(xs.iter().all(|&x| !(3.0 + 1e-9..7.0 - 1e-9).contains(&x)));
        }
    }
}
