//! Travel-path optimization.
//!
//! Greedy nearest-neighbor reordering of independent toolpath segments.
//! A local heuristic, not globally optimal: segment contents are never
//! touched, only their order and (for reversible segments) direction.

use grblc_math::{distance, Point2};
use serde::{Deserialize, Serialize};

use crate::Segment;

/// Granularity at which segments are pooled for reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeScope {
    /// Reorder within each job's segments only.
    #[default]
    PerJob,
    /// Pool all jobs of a layer before reordering.
    PerLayer,
    /// Pool every segment of the document.
    Document,
}

/// Travel metrics from one optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizeStats {
    /// Travel distance of the identity ordering.
    pub original_travel: f64,
    /// Travel distance after reordering.
    pub optimized_travel: f64,
    /// Segments traversed backwards.
    pub reversed: usize,
}

impl OptimizeStats {
    /// Travel saved, as a percentage of the original.
    pub fn savings_percent(&self) -> f64 {
        if self.original_travel <= 0.0 {
            return 0.0;
        }
        (self.original_travel - self.optimized_travel) / self.original_travel * 100.0
    }

    /// Accumulate another pass's metrics.
    pub fn merge(&mut self, other: OptimizeStats) {
        self.original_travel += other.original_travel;
        self.optimized_travel += other.optimized_travel;
        self.reversed += other.reversed;
    }
}

/// Total laser-off travel for a segment sequence starting at `start`.
pub fn travel_distance(segments: &[Segment], start: Point2) -> f64 {
    let mut pos = start;
    let mut total = 0.0;
    for seg in segments {
        total += distance(pos, seg.start());
        pos = seg.end();
    }
    total
}

/// Plan a greedy nearest-neighbor ordering without moving any segment.
///
/// Returns `(original_index, reverse)` pairs in visit order. When
/// `allow_reverse` is set, open uniform-power segments may be traversed
/// backwards if their far end is closer. Ties go to the lowest original
/// index, so the result is deterministic. The plan is always a
/// permutation of `0..segments.len()`.
pub fn plan(segments: &[Segment], start: Point2, allow_reverse: bool) -> Vec<(usize, bool)> {
    let mut visited = vec![false; segments.len()];
    let mut order = Vec::with_capacity(segments.len());
    let mut pos = start;

    for _ in 0..segments.len() {
        let mut best_idx = usize::MAX;
        let mut best_reverse = false;
        let mut best_dist = f64::INFINITY;

        for (idx, seg) in segments.iter().enumerate() {
            if visited[idx] {
                continue;
            }
            let d_start = distance(pos, seg.start());
            if d_start < best_dist {
                best_dist = d_start;
                best_idx = idx;
                best_reverse = false;
            }
            if allow_reverse && seg.reversible() {
                let d_end = distance(pos, seg.end());
                if d_end < best_dist {
                    best_dist = d_end;
                    best_idx = idx;
                    best_reverse = true;
                }
            }
        }

        visited[best_idx] = true;
        let seg = &segments[best_idx];
        pos = if best_reverse { seg.start() } else { seg.end() };
        order.push((best_idx, best_reverse));
    }

    order
}

/// Reorder `segments` by greedy nearest-neighbor from `start`.
///
/// Applies [`plan`]; the output is a permutation (plus reversals) of
/// the input with contents untouched.
pub fn optimize(
    segments: Vec<Segment>,
    start: Point2,
    allow_reverse: bool,
) -> (Vec<Segment>, OptimizeStats) {
    let mut stats = OptimizeStats {
        original_travel: travel_distance(&segments, start),
        ..Default::default()
    };
    if segments.len() < 2 {
        stats.optimized_travel = stats.original_travel;
        return (segments, stats);
    }

    let order = plan(&segments, start, allow_reverse);
    let mut slots: Vec<Option<Segment>> = segments.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    for (idx, reverse) in order {
        let seg = slots[idx].take().expect("plan is a permutation");
        if reverse {
            stats.reversed += 1;
            ordered.push(seg.reversed());
        } else {
            ordered.push(seg);
        }
    }

    stats.optimized_travel = travel_distance(&ordered, start);
    (ordered, stats)
}
