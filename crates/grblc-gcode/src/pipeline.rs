//! The compile pipeline: document snapshot in, one GRBL program out.
//!
//! Layers are processed in document order and jobs in their `order`
//! within each layer. Toolpath generation is independent per job and
//! runs in parallel; emission is serialized afterwards so the output is
//! deterministic regardless of scheduling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use grblc_math::Point2;
use grblc_model::{
    Diagnostic, DiagnosticReport, Document, Element, Job, JobParams, MachineLimits, ModelError,
};
use grblc_toolpath::{
    flatten_path, generate_cut, generate_hatch, generate_raster, optimize, plan, travel_distance,
    OptimizeScope, OptimizeStats, Polyline, Segment,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emit::GcodeEmitter;

/// Errors that abort a whole compilation run before any output exists.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The machine limits cannot drive a run.
    #[error("unusable machine limits: {0}")]
    InvalidLimits(#[from] ModelError),

    /// No visible layer carries an active job.
    #[error("document has no active jobs")]
    NoActiveJobs,

    /// The run was cancelled; partial output is discarded.
    #[error("compilation cancelled")]
    Cancelled,
}

/// Cooperative cancellation flag, checked between jobs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Compilation options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Reorder segments to shorten travel.
    pub optimize: OptimizeConfig,
    /// Cancellation token shared with the host.
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

/// Travel optimization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeConfig {
    /// Enable nearest-neighbor reordering.
    pub enabled: bool,
    /// Allow reversing open uniform-power segments.
    pub allow_reverse: bool,
    /// Pooling granularity for the reorder pass.
    pub scope: OptimizeScope,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_reverse: true,
            scope: OptimizeScope::PerJob,
        }
    }
}

/// Statistics from one compilation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileStats {
    /// Jobs compiled into the program.
    pub jobs_compiled: usize,
    /// Jobs skipped for malformed input.
    pub jobs_skipped: usize,
    /// Toolpath segments emitted.
    pub segments: usize,
    /// Travel optimization metrics, summed over all pools.
    pub travel: OptimizeStats,
}

/// A finished compilation run.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The GRBL 1.1 program text.
    pub gcode: String,
    /// Every recovered condition of the run.
    pub report: DiagnosticReport,
    /// Run statistics.
    pub stats: CompileStats,
}

/// One job's generated toolpath, waiting for emission.
struct JobToolpath {
    layer_idx: usize,
    layer_label: String,
    job: Job,
    segments: Vec<Segment>,
    pending_report: Option<DiagnosticReport>,
}

/// Compile a document snapshot into one GRBL 1.1 program.
pub fn compile(
    document: &Document,
    limits: &MachineLimits,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileError> {
    limits.validate()?;
    if document.active_job_count() == 0 {
        return Err(CompileError::NoActiveJobs);
    }

    let mut report = DiagnosticReport::new();
    let mut stats = CompileStats::default();

    // Collect work: one item per (visible layer, active job), already in
    // document order. Malformed jobs skip themselves, not the run.
    let mut work: Vec<(usize, String, Job)> = Vec::new();
    for (layer_idx, layer) in document.layers.iter().enumerate() {
        if !layer.visible {
            continue;
        }
        for job in layer.active_jobs() {
            if let Err(err) = job.validate() {
                report.push(
                    Diagnostic::fatal_input(err.to_string())
                        .with_layer(&layer.label)
                        .with_job(&job.id),
                );
                stats.jobs_skipped += 1;
                continue;
            }
            work.push((layer_idx, layer.label.clone(), job.clone()));
        }
    }
    if work.is_empty() {
        return Err(CompileError::NoActiveJobs);
    }

    // Toolpath generation is pure per job; fan out, then restore
    // document order for everything that follows.
    let cancel = options.cancel.clone().unwrap_or_default();
    let mut toolpaths: Vec<JobToolpath> = work
        .into_par_iter()
        .map(|(layer_idx, layer_label, job)| {
            if cancel.is_cancelled() {
                return JobToolpath {
                    layer_idx,
                    layer_label,
                    job,
                    segments: Vec::new(),
                    pending_report: None,
                };
            }
            let mut job_report = DiagnosticReport::new();
            let segments = generate_job(
                &document.layers[layer_idx].elements,
                &job,
                limits,
                &mut job_report,
            );
            let pending = job_report.attributed(&layer_label, &job.id);
            JobToolpath {
                layer_idx,
                layer_label,
                job,
                segments,
                pending_report: Some(pending),
            }
        })
        .collect();
    if cancel.is_cancelled() {
        return Err(CompileError::Cancelled);
    }
    for tp in &mut toolpaths {
        if let Some(r) = tp.pending_report.take() {
            report.merge(r);
        }
    }

    // Travel optimization at the configured scope, then emission in
    // document order.
    let mut emitter = GcodeEmitter::new(*limits);
    emitter.header(&document.name);

    if options.optimize.enabled {
        stats.travel = optimize_toolpaths(&mut toolpaths, &options.optimize);
    }

    let mut last_layer = usize::MAX;
    for tp in &toolpaths {
        if cancel.is_cancelled() {
            return Err(CompileError::Cancelled);
        }
        if tp.segments.is_empty() {
            continue;
        }
        if tp.layer_idx != last_layer {
            emitter.comment(&format!("Layer: {}", tp.layer_label));
            last_layer = tp.layer_idx;
        }
        emitter.comment(&format!(
            "Job: {} {} (order {})",
            job_kind_name(&tp.job),
            tp.job.id,
            tp.job.order
        ));
        let mode = tp.job.params.laser_mode();
        for seg in &tp.segments {
            emitter.segment(seg, mode, tp.job.power, tp.job.speed);
            stats.segments += 1;
        }
        stats.jobs_compiled += 1;
    }

    emitter.footer();
    let (gcode, emit_report) = emitter.finish();
    report.merge(emit_report);

    Ok(CompileOutput {
        gcode,
        report,
        stats,
    })
}

fn job_kind_name(job: &Job) -> &'static str {
    match job.params {
        JobParams::Cut { .. } => "cut",
        JobParams::Fill { .. } => "fill",
        JobParams::Raster { .. } => "raster",
    }
}

/// Run the engine matching the job kind over a layer's geometry.
fn generate_job(
    elements: &[Element],
    job: &Job,
    limits: &MachineLimits,
    report: &mut DiagnosticReport,
) -> Vec<Segment> {
    let paths: Vec<Polyline> = elements
        .iter()
        .filter_map(|e| match e {
            Element::Path(geom) => Some(flatten_path(geom)),
            Element::Image(_) => None,
        })
        .collect();

    match &job.params {
        JobParams::Cut { offset, passes, .. } => {
            generate_cut(&paths, *offset, *passes, limits.kerf_width, report)
        }
        JobParams::Fill {
            angle,
            spacing,
            alternate,
            ..
        } => generate_hatch(&paths, *angle, *spacing, *alternate, report),
        JobParams::Raster {
            dpi,
            scan_direction,
            power_min,
            power_max,
            ..
        } => {
            let min = limits.clamp_power(*power_min);
            let max = limits.clamp_power(*power_max);
            if min != *power_min || max != *power_max {
                report.push(Diagnostic::limit(format!(
                    "raster power range [{power_min}, {power_max}] clamped to [{min}, {max}]"
                )));
            }
            let mut segments = Vec::new();
            for element in elements {
                if let Element::Image(image) = element {
                    segments.extend(generate_raster(
                        image,
                        *dpi,
                        *scan_direction,
                        min,
                        max,
                        report,
                    ));
                }
            }
            segments
        }
    }
}

/// Apply nearest-neighbor reordering at the configured scope.
///
/// Per-job pools keep each job's segments separate; wider scopes pool
/// neighboring jobs (same layer, or the whole document) and reorder
/// across them, splitting the result back onto the owning jobs in visit
/// order. The head position carries across pools so travel between jobs
/// is accounted for.
fn optimize_toolpaths(toolpaths: &mut [JobToolpath], config: &OptimizeConfig) -> OptimizeStats {
    let mut total = OptimizeStats::default();
    let mut head = Point2::origin();

    match config.scope {
        OptimizeScope::PerJob => {
            for tp in toolpaths.iter_mut() {
                let segments = std::mem::take(&mut tp.segments);
                let (ordered, pass) = optimize(segments, head, config.allow_reverse);
                if let Some(last) = ordered.last() {
                    head = last.end();
                }
                tp.segments = ordered;
                total.merge(pass);
            }
        }
        OptimizeScope::PerLayer | OptimizeScope::Document => {
            let mut start = 0;
            while start < toolpaths.len() {
                let end = match config.scope {
                    OptimizeScope::Document => toolpaths.len(),
                    _ => {
                        let layer = toolpaths[start].layer_idx;
                        toolpaths[start..]
                            .iter()
                            .position(|tp| tp.layer_idx != layer)
                            .map(|off| start + off)
                            .unwrap_or(toolpaths.len())
                    }
                };
                head = optimize_pool(&mut toolpaths[start..end], head, config, &mut total);
                start = end;
            }
        }
    }

    total
}

/// Reorder a pooled slice of jobs' segments as one candidate set.
fn optimize_pool(
    pool: &mut [JobToolpath],
    head: Point2,
    config: &OptimizeConfig,
    total: &mut OptimizeStats,
) -> Point2 {
    // Flatten the pool, remembering which job owns each segment.
    let mut owners = Vec::new();
    let mut segments = Vec::new();
    for (job_pos, tp) in pool.iter_mut().enumerate() {
        for seg in std::mem::take(&mut tp.segments) {
            owners.push(job_pos);
            segments.push(seg);
        }
    }

    let mut pass = OptimizeStats {
        original_travel: travel_distance(&segments, head),
        ..Default::default()
    };

    let order = plan(&segments, head, config.allow_reverse);
    let mut slots: Vec<Option<Segment>> = segments.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    let mut new_head = head;
    for &(idx, reverse) in &order {
        let seg = slots[idx].take().expect("plan is a permutation");
        let seg = if reverse {
            pass.reversed += 1;
            seg.reversed()
        } else {
            seg
        };
        new_head = seg.end();
        ordered.push((owners[idx], seg));
    }
    pass.optimized_travel = {
        let segs: Vec<&Segment> = ordered.iter().map(|(_, s)| s).collect();
        let mut pos = head;
        let mut travel = 0.0;
        for s in segs {
            travel += grblc_math::distance(pos, s.start());
            pos = s.end();
        }
        travel
    };
    total.merge(pass);

    // Hand segments back to their owners in visit order; emission walks
    // jobs in document order, so cross-job interleaving degrades to the
    // per-job visit order within each job.
    for (job_pos, seg) in ordered {
        pool[job_pos].segments.push(seg);
    }
    new_head
}

#[cfg(test)]
mod tests {
    use super::*;
    use grblc_model::{
        DiagnosticKind, ImageGrid, JobParams, LaserMode, Layer, PathGeometry, Point2D,
        ScanDirection,
    };

    fn cut_job(id: &str, order: u32) -> Job {
        Job {
            id: id.into(),
            active: true,
            speed: 800.0,
            power: 600.0,
            order,
            params: JobParams::Cut {
                offset: 0.0,
                passes: 1,
                laser_mode: LaserMode::Constant,
            },
        }
    }

    fn square_layer(label: &str) -> Layer {
        let mut layer = Layer::new(label);
        layer.elements.push(Element::Path(PathGeometry::polyline(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
            true,
        )));
        layer
    }

    fn limits() -> MachineLimits {
        MachineLimits::default()
    }

    #[test]
    fn test_square_cut_program() {
        let mut doc = Document::new("square");
        let mut layer = square_layer("outline");
        layer.jobs.push(cut_job("c1", 0));
        doc.layers.push(layer);

        let out = compile(&doc, &limits(), &CompileOptions::default()).unwrap();
        assert!(out.report.is_empty());
        assert_eq!(out.stats.jobs_compiled, 1);
        assert_eq!(out.stats.segments, 1);

        let g = &out.gcode;
        assert_eq!(g.matches("G21").count(), 1);
        assert_eq!(g.matches("G90").count(), 1);
        assert!(g.contains("M3 S600"));
        assert_eq!(g.lines().filter(|l| l.starts_with("G1 ")).count(), 4);
        assert!(g.contains("G0 X0 Y0"));
        assert!(g.trim_end().ends_with("M2 ; Program end"));
    }

    #[test]
    fn test_no_active_jobs_is_fatal() {
        let mut doc = Document::new("empty");
        doc.layers.push(square_layer("outline"));
        let err = compile(&doc, &limits(), &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::NoActiveJobs));
    }

    #[test]
    fn test_invalid_limits_is_fatal() {
        let mut doc = Document::new("doc");
        let mut layer = square_layer("outline");
        layer.jobs.push(cut_job("c1", 0));
        doc.layers.push(layer);

        let bad = MachineLimits {
            max_speed: 0.0,
            ..limits()
        };
        let err = compile(&doc, &bad, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidLimits(_)));
    }

    #[test]
    fn test_hidden_layer_contributes_nothing() {
        let mut doc = Document::new("doc");
        let mut shown = square_layer("shown");
        shown.jobs.push(cut_job("c1", 0));
        let mut hidden = square_layer("hidden");
        hidden.visible = false;
        hidden.jobs.push(cut_job("c2", 0));
        doc.layers = vec![shown, hidden];

        let out = compile(&doc, &limits(), &CompileOptions::default()).unwrap();
        assert_eq!(out.stats.jobs_compiled, 1);
        assert!(!out.gcode.contains("hidden"));
        assert!(!out.gcode.contains("c2"));
    }

    #[test]
    fn test_malformed_job_skipped_with_diagnostic() {
        let mut doc = Document::new("doc");
        let mut layer = square_layer("outline");
        let mut bad = cut_job("bad", 0);
        bad.speed = -5.0;
        layer.jobs.push(bad);
        layer.jobs.push(cut_job("good", 1));
        doc.layers.push(layer);

        let out = compile(&doc, &limits(), &CompileOptions::default()).unwrap();
        assert_eq!(out.stats.jobs_skipped, 1);
        assert_eq!(out.stats.jobs_compiled, 1);
        assert_eq!(out.report.count_of(DiagnosticKind::FatalInput), 1);
        let diag = &out.report.entries()[0];
        assert_eq!(diag.job_id.as_deref(), Some("bad"));
        assert!(!out.gcode.contains("Job: cut bad"));
        assert!(out.gcode.contains("Job: cut good"));
    }

    #[test]
    fn test_open_fill_reports_degenerate() {
        let mut doc = Document::new("doc");
        let mut layer = Layer::new("shade");
        layer.elements.push(Element::Path(PathGeometry::polyline(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
            false,
        )));
        layer.jobs.push(Job {
            id: "f1".into(),
            active: true,
            speed: 800.0,
            power: 600.0,
            order: 0,
            params: JobParams::Fill {
                angle: 45.0,
                spacing: 0.5,
                alternate: true,
                laser_mode: LaserMode::Constant,
            },
        });
        doc.layers.push(layer);

        let out = compile(&doc, &limits(), &CompileOptions::default()).unwrap();
        assert_eq!(out.report.count_of(DiagnosticKind::Degenerate), 1);
        let diag = &out.report.entries()[0];
        assert_eq!(diag.layer.as_deref(), Some("shade"));
        assert_eq!(diag.job_id.as_deref(), Some("f1"));
        assert_eq!(out.stats.segments, 0);
    }

    #[test]
    fn test_raster_power_clamped_with_diagnostic() {
        let mut doc = Document::new("doc");
        let mut layer = Layer::new("photo");
        layer.elements.push(Element::Image(ImageGrid {
            width: 2,
            height: 1,
            pixels: vec![0, 0],
            origin: Point2D::new(0.0, 0.0),
            size_x: 2.0,
            size_y: 1.0,
        }));
        layer.jobs.push(Job {
            id: "r1".into(),
            active: true,
            speed: 1500.0,
            power: 600.0,
            order: 0,
            params: JobParams::Raster {
                dpi: 25.4,
                scan_direction: ScanDirection::Horizontal,
                power_min: 0.0,
                power_max: 5000.0,
                laser_mode: LaserMode::Dynamic,
            },
        });
        doc.layers.push(layer);

        let out = compile(&doc, &limits(), &CompileOptions::default()).unwrap();
        assert_eq!(out.report.count_of(DiagnosticKind::LimitViolation), 1);
        assert!(out.gcode.contains("M4"));
        assert!(out.gcode.contains("S1000"));
        assert!(!out.gcode.contains("S5000"));
    }

    #[test]
    fn test_cancellation_discards_output() {
        let mut doc = Document::new("doc");
        let mut layer = square_layer("outline");
        layer.jobs.push(cut_job("c1", 0));
        doc.layers.push(layer);

        let cancel = CancelToken::new();
        cancel.cancel();
        let options = CompileOptions {
            cancel: Some(cancel),
            ..Default::default()
        };
        let err = compile(&doc, &limits(), &options).unwrap_err();
        assert!(matches!(err, CompileError::Cancelled));
    }

    #[test]
    fn test_job_order_respected_within_layer() {
        let mut doc = Document::new("doc");
        let mut layer = square_layer("outline");
        layer.jobs.push(cut_job("second", 5));
        layer.jobs.push(cut_job("first", 1));
        doc.layers.push(layer);

        let out = compile(&doc, &limits(), &CompileOptions::default()).unwrap();
        let first = out.gcode.find("Job: cut first").unwrap();
        let second = out.gcode.find("Job: cut second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_document_scope_pools_jobs() {
        // Two layers of disjoint squares; document scope still emits in
        // document order, and total travel never exceeds the unoptimized
        // order travel.
        let mut doc = Document::new("doc");
        for (i, x) in [(0usize, 0.0f64), (1, 40.0)] {
            let mut layer = Layer::new(format!("l{i}"));
            layer.elements.push(Element::Path(PathGeometry::polyline(
                &[(x, 0.0), (x + 10.0, 0.0), (x + 10.0, 10.0), (x, 10.0)],
                true,
            )));
            layer.jobs.push(cut_job(&format!("c{i}"), 0));
            doc.layers.push(layer);
        }

        let options = CompileOptions {
            optimize: OptimizeConfig {
                enabled: true,
                allow_reverse: true,
                scope: OptimizeScope::Document,
            },
            cancel: None,
        };
        let out = compile(&doc, &limits(), &options).unwrap();
        assert_eq!(out.stats.jobs_compiled, 2);
        assert!(out.stats.travel.optimized_travel <= out.stats.travel.original_travel + 1e-9);
        let l0 = out.gcode.find("Layer: l0").unwrap();
        let l1 = out.gcode.find("Layer: l1").unwrap();
        assert!(l0 < l1);
    }

    #[test]
    fn test_optimization_disabled_keeps_input_order() {
        let mut doc = Document::new("doc");
        let mut layer = square_layer("outline");
        layer.jobs.push(cut_job("c1", 0));
        doc.layers.push(layer);

        let options = CompileOptions {
            optimize: OptimizeConfig {
                enabled: false,
                ..Default::default()
            },
            cancel: None,
        };
        let out = compile(&doc, &limits(), &options).unwrap();
        assert_eq!(out.stats.travel, OptimizeStats::default());
    }
}
