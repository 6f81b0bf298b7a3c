//! Geometry primitives: polylines, bounding boxes, offsetting, and
//! Bezier flattening.

use grblc_math::{distance, Point2, Vec2};
use grblc_model::{Diagnostic, DiagnosticReport, PathCommand, PathGeometry, Point2D};

use crate::{CLOSED_PATH_TOLERANCE, CURVE_TOLERANCE};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point2,
    /// Maximum corner.
    pub max: Point2,
}

impl BoundingBox {
    /// Smallest box containing all `points`, or `None` when empty.
    pub fn of(points: &[Point2]) -> Option<Self> {
        let first = *points.first()?;
        let mut bbox = Self {
            min: first,
            max: first,
        };
        for p in &points[1..] {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    /// Whether `p` lies inside the box, padded by `tol` on every side.
    pub fn contains(&self, p: Point2, tol: f64) -> bool {
        p.x >= self.min.x - tol
            && p.x <= self.max.x + tol
            && p.y >= self.min.y - tol
            && p.y <= self.max.y + tol
    }
}

/// A flattened path: ordered vertices plus an explicit closed flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    /// Vertices in order. A closed polyline does not repeat its first
    /// vertex at the end.
    pub points: Vec<Point2>,
    /// Whether the last vertex connects back to the first.
    pub closed: bool,
}

impl Polyline {
    /// Create a polyline.
    pub fn new(points: Vec<Point2>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the polyline has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Signed area by the shoelace formula.
    ///
    /// Positive for counter-clockwise winding; zero for open or
    /// degenerate polylines.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if !self.closed || n < 3 {
            return 0.0;
        }
        let mut area = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area / 2.0
    }

    /// Is the winding counter-clockwise?
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Bounding box of the vertices.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of(&self.points)
    }

    /// Traced length, including the closing edge for closed polylines.
    pub fn length(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        let mut len: f64 = self.points.windows(2).map(|w| distance(w[0], w[1])).sum();
        if self.closed {
            len += distance(self.points[n - 1], self.points[0]);
        }
        len
    }

    /// Parallel offset of a closed polyline along its vertex normals.
    ///
    /// Positive `dist` moves outward (along the outward normal implied by
    /// the winding sense), negative inward. Near-zero-length edges are
    /// skipped with a diagnostic. Returns `None` when the offset polygon
    /// collapses; callers fall back to the original path.
    pub fn offset(&self, dist: f64, report: &mut DiagnosticReport) -> Option<Polyline> {
        let n = self.points.len();
        if !self.closed || n < 3 {
            return None;
        }

        // Outward normals: rotate edge directions -90 deg for CCW
        // winding, +90 deg for CW.
        let sign = if self.is_ccw() { -1.0 } else { 1.0 };

        let mut offset_points = Vec::with_capacity(n);
        let mut sources = Vec::with_capacity(n);
        let mut skipped = 0usize;
        for i in 0..n {
            let prev = self.points[(i + n - 1) % n];
            let here = self.points[i];
            let next = self.points[(i + 1) % n];

            let e1 = here - prev;
            let e2 = next - here;
            if e1.norm() < 1e-12 || e2.norm() < 1e-12 {
                skipped += 1;
                continue;
            }
            let e1 = e1.normalize();
            let e2 = e2.normalize();

            let n1 = Vec2::new(-e1.y * sign, e1.x * sign);
            let n2 = Vec2::new(-e2.y * sign, e2.x * sign);

            let bisector = n1 + n2;
            if bisector.norm() < 1e-9 {
                // 180 degree spike, no usable normal direction
                skipped += 1;
                continue;
            }
            let bisector = bisector.normalize();

            // Miter length grows at sharp corners; clamp to avoid
            // shooting past self-intersection.
            let dot = n1.dot(&bisector);
            let miter = if dot.abs() > 1e-3 { dist / dot } else { dist };
            let miter = miter.clamp(-2.0 * dist.abs(), 2.0 * dist.abs());

            offset_points.push(here + bisector * miter);
            sources.push(i);
        }

        if skipped > 0 {
            report.push(Diagnostic::degenerate(format!(
                "offset skipped {skipped} degenerate vertices"
            )));
        }
        if offset_points.len() < 3 {
            report.push(Diagnostic::degenerate(
                "offset collapsed below three vertices",
            ));
            return None;
        }

        let result = Polyline::new(offset_points, true);
        if result.signed_area().abs() < 1e-10 {
            report.push(Diagnostic::degenerate("offset polygon has zero area"));
            return None;
        }
        // An offset past the medial axis turns the polygon inside out.
        // Winding and a plausible area can both survive that (vertices
        // point-reflected through the center keep their cyclic order),
        // but reflection reverses every edge. Require each offset edge
        // to run the same way as the original edge between its source
        // vertices, and the area to move the way the offset direction
        // demands: outward grows it, inward shrinks it.
        let m = result.points.len();
        let edges_flipped = (0..m).any(|k| {
            let orig = self.points[sources[(k + 1) % m]] - self.points[sources[k]];
            let moved = result.points[(k + 1) % m] - result.points[k];
            orig.norm() > 1e-12 && orig.dot(&moved) <= 0.0
        });
        let inverted = edges_flipped
            || result.is_ccw() != self.is_ccw()
            || (dist > 0.0 && result.signed_area().abs() <= self.signed_area().abs())
            || (dist < 0.0 && result.signed_area().abs() >= self.signed_area().abs());
        if inverted {
            report.push(Diagnostic::degenerate("offset polygon inverted"));
            return None;
        }
        Some(result)
    }
}

fn to_point(p: Point2D) -> Point2 {
    Point2::new(p.x, p.y)
}

/// Flatten a path's commands into a polyline.
///
/// Cubic Beziers are subdivided until the control polygon deviates from
/// its chord by less than [`CURVE_TOLERANCE`]. A path whose endpoints
/// coincide within [`CLOSED_PATH_TOLERANCE`] is treated as closed even
/// without the explicit flag.
pub fn flatten_path(geom: &PathGeometry) -> Polyline {
    let mut points = vec![to_point(geom.start)];

    for cmd in &geom.commands {
        match *cmd {
            PathCommand::Line { to } => points.push(to_point(to)),
            PathCommand::Cubic { c1, c2, to } => {
                let from = *points.last().expect("points never empty");
                flatten_cubic(from, to_point(c1), to_point(c2), to_point(to), 0, &mut points);
            }
        }
    }

    let mut closed = geom.closed;
    if !closed
        && points.len() > 2
        && distance(points[0], *points.last().expect("non-empty")) < CLOSED_PATH_TOLERANCE
    {
        closed = true;
    }
    // Closed polylines store each vertex once.
    if closed && points.len() > 1 {
        let last = *points.last().expect("non-empty");
        if distance(points[0], last) < CLOSED_PATH_TOLERANCE {
            points.pop();
        }
    }

    Polyline::new(points, closed)
}

/// Recursive de Casteljau subdivision; appends interior and end points.
fn flatten_cubic(p0: Point2, p1: Point2, p2: Point2, p3: Point2, depth: u32, out: &mut Vec<Point2>) {
    const MAX_DEPTH: u32 = 16;
    if depth >= MAX_DEPTH || cubic_is_flat(p0, p1, p2, p3) {
        out.push(p3);
        return;
    }
    let mid = |a: Point2, b: Point2| Point2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    let p01 = mid(p0, p1);
    let p12 = mid(p1, p2);
    let p23 = mid(p2, p3);
    let p012 = mid(p01, p12);
    let p123 = mid(p12, p23);
    let p0123 = mid(p012, p123);
    flatten_cubic(p0, p01, p012, p0123, depth + 1, out);
    flatten_cubic(p0123, p123, p23, p3, depth + 1, out);
}

/// Control-point deviation from the chord, against [`CURVE_TOLERANCE`].
fn cubic_is_flat(p0: Point2, p1: Point2, p2: Point2, p3: Point2) -> bool {
    let d1 = point_line_distance(p1, p0, p3);
    let d2 = point_line_distance(p2, p0, p3);
    d1.max(d2) < CURVE_TOLERANCE
}

fn point_line_distance(p: Point2, a: Point2, b: Point2) -> f64 {
    let ab = b - a;
    let len = ab.norm();
    if len < 1e-12 {
        return distance(p, a);
    }
    ((p.x - a.x) * ab.y - (p.y - a.y) * ab.x).abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

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
    fn test_signed_area_ccw() {
        let sq = square(10.0);
        assert_relative_eq!(sq.signed_area(), 100.0);
        assert!(sq.is_ccw());
    }

    #[test]
    fn test_open_polyline_has_no_area() {
        let mut line = square(10.0);
        line.closed = false;
        assert_relative_eq!(line.signed_area(), 0.0);
    }

    #[test]
    fn test_bounding_box() {
        let sq = square(10.0);
        let bbox = sq.bounding_box().unwrap();
        assert_relative_eq!(bbox.min.x, 0.0);
        assert_relative_eq!(bbox.max.y, 10.0);
        assert!(bbox.contains(Point2::new(5.0, 5.0), 0.0));
        assert!(!bbox.contains(Point2::new(11.0, 5.0), 0.0));
    }

    #[test]
    fn test_offset_outward_grows_area() {
        let sq = square(10.0);
        let mut report = DiagnosticReport::new();
        let out = sq.offset(1.0, &mut report).unwrap();
        // 10x10 grows to 12x12 under a 1mm outward offset
        assert_relative_eq!(out.signed_area().abs(), 144.0, epsilon = 1.0);
        assert!(report.is_empty());
    }

    #[test]
    fn test_offset_inward_shrinks_area() {
        let sq = square(10.0);
        let mut report = DiagnosticReport::new();
        let inner = sq.offset(-1.0, &mut report).unwrap();
        assert_relative_eq!(inner.signed_area().abs(), 64.0, epsilon = 1.0);
    }

    #[test]
    fn test_offset_collapse_returns_none() {
        let sq = square(1.0);
        let mut report = DiagnosticReport::new();
        // Inward offset past the centerline collapses the square
        assert!(sq.offset(-2.0, &mut report).is_none());
        assert!(!report.is_empty());
    }

    #[test]
    fn test_offset_past_medial_axis_rejected_despite_winding() {
        // An inward offset past the inradius point-reflects the vertices
        // through the center: winding and nonzero area both survive, so
        // the inversion must be caught by the area-direction check.
        let sq = square(1.0);
        let mut report = DiagnosticReport::new();
        for dist in [-0.6, -1.0, -2.0, -5.0] {
            assert!(
                sq.offset(dist, &mut report).is_none(),
                "inward offset {dist} on a unit square must collapse"
            );
        }
        assert!(!report.is_empty());
    }

    #[test]
    fn test_offset_skips_zero_length_edge() {
        let mut points = square(10.0).points;
        points.insert(1, Point2::new(10.0, 0.0)); // duplicate vertex
        let poly = Polyline::new(points, true);
        let mut report = DiagnosticReport::new();
        let out = poly.offset(1.0, &mut report);
        assert!(out.is_some());
        assert!(!report.is_empty());
    }

    #[test]
    fn test_flatten_line_path() {
        let geom = PathGeometry::polyline(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)], false);
        let poly = flatten_path(&geom);
        assert_eq!(poly.len(), 3);
        assert!(!poly.closed);
    }

    #[test]
    fn test_flatten_detects_closure_by_distance() {
        let geom = PathGeometry::polyline(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.005)],
            false,
        );
        let poly = flatten_path(&geom);
        assert!(poly.closed);
        // coincident endpoint dropped
        assert_eq!(poly.len(), 4);
    }

    #[test]
    fn test_flatten_cubic_stays_near_curve() {
        let geom = PathGeometry {
            start: Point2D::new(0.0, 0.0),
            commands: vec![PathCommand::Cubic {
                c1: Point2D::new(0.0, 10.0),
                c2: Point2D::new(10.0, 10.0),
                to: Point2D::new(10.0, 0.0),
            }],
            closed: false,
        };
        let poly = flatten_path(&geom);
        assert!(poly.len() > 4, "curve should subdivide, got {}", poly.len());
        let bbox = poly.bounding_box().unwrap();
        // The curve lives inside its control hull
        assert!(bbox.max.y <= 10.0 + 1e-9);
        assert!(bbox.min.y >= -1e-9);
    }
}
