//! Toolpath segments.

use grblc_math::{distance, Point2};

/// Laser state for one motion step of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaserState {
    /// Laser off (travel).
    Off,
    /// Laser on at the given S power.
    On(f64),
}

/// An ordered run of machine motions with laser state.
///
/// Produced by the engines and immutable afterwards: the optimizer may
/// reorder or reverse whole segments but never edits their contents.
///
/// `steps`, when present, holds one laser state per motion (so its length
/// is `points.len() - 1`); when absent every motion burns at the owning
/// job's uniform power.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Vertices in traversal order.
    pub points: Vec<Point2>,
    /// Per-step laser states for power-modulated segments.
    pub steps: Option<Vec<LaserState>>,
    /// Whether the segment traces a closed loop.
    pub closed: bool,
}

impl Segment {
    /// A uniform-power segment (cut outlines, hatch spans).
    pub fn uniform(points: Vec<Point2>, closed: bool) -> Self {
        Self {
            points,
            steps: None,
            closed,
        }
    }

    /// A power-modulated segment (raster scan lines).
    pub fn modulated(points: Vec<Point2>, steps: Vec<LaserState>) -> Self {
        debug_assert_eq!(steps.len() + 1, points.len());
        Self {
            points,
            steps: Some(steps),
            closed: false,
        }
    }

    /// Whether the segment has fewer than two points.
    pub fn is_empty(&self) -> bool {
        self.points.len() < 2
    }

    /// First point, or the origin for an empty segment.
    pub fn start(&self) -> Point2 {
        self.points.first().copied().unwrap_or_else(Point2::origin)
    }

    /// Last point, or the origin for an empty segment.
    pub fn end(&self) -> Point2 {
        self.points.last().copied().unwrap_or_else(Point2::origin)
    }

    /// Total traced length.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| distance(w[0], w[1])).sum()
    }

    /// Whether the optimizer may traverse this segment backwards.
    ///
    /// Closed loops restart anywhere in principle but keep their seam
    /// here; power-modulated segments would need their state sequence
    /// mirrored, so both are excluded.
    pub fn reversible(&self) -> bool {
        !self.closed && self.steps.is_none()
    }

    /// A reversed copy.
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        let steps = self.steps.as_ref().map(|s| {
            let mut s = s.clone();
            s.reverse();
            s
        });
        Self {
            points,
            steps,
            closed: self.closed,
        }
    }
}
