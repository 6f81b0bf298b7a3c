//! grblc CLI - compile laser job documents to GRBL 1.1 G-code.
//!
//! Thin host adapter around the compiler crates: loads a document
//! snapshot from JSON (or builds one from a PNG), runs the compiler,
//! and writes the program to a `.nc` file. Diagnostics go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use grblc_gcode::{compile, CompileOptions, OptimizeConfig};
use grblc_model::{
    Document, Element, ImageGrid, Job, JobParams, LaserMode, Layer, MachineLimits, Point2D,
    ScanDirection,
};
use grblc_toolpath::OptimizeScope;

#[derive(Parser)]
#[command(name = "grblc")]
#[command(about = "Compile laser job documents to GRBL 1.1 G-code", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a document JSON file to a G-code program
    Compile {
        /// Input document (.json)
        input: PathBuf,
        /// Output program file (default: input with .nc extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Machine limits JSON file (default: GRBL defaults)
        #[arg(short, long)]
        machine: Option<PathBuf>,
        /// Disable travel optimization
        #[arg(long)]
        no_optimize: bool,
        /// Keep every segment's original direction
        #[arg(long)]
        no_reverse: bool,
        /// Optimization pooling scope
        #[arg(long, value_enum, default_value_t = ScopeArg::Job)]
        scope: ScopeArg,
    },
    /// Compile a single PNG image as one raster engraving job
    Raster {
        /// Input image (.png, converted to grayscale)
        input: PathBuf,
        /// Output program file (default: input with .nc extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Machine limits JSON file (default: GRBL defaults)
        #[arg(short, long)]
        machine: Option<PathBuf>,
        /// Physical width of the engraving in mm (height keeps aspect)
        #[arg(long, default_value_t = 50.0)]
        width: f64,
        /// Output resolution in dots per inch
        #[arg(long, default_value_t = 300.0)]
        dpi: f64,
        /// Feed rate in mm/min
        #[arg(long, default_value_t = 1500.0)]
        speed: f64,
        /// Power for fully black samples (S units)
        #[arg(long, default_value_t = 600.0)]
        power: f64,
        /// Scan along columns instead of rows
        #[arg(long)]
        vertical: bool,
    },
    /// Display information about a document JSON file
    Info {
        /// Path to the document file
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    /// Reorder within each job
    Job,
    /// Pool all jobs of a layer
    Layer,
    /// Pool the whole document
    Document,
}

impl From<ScopeArg> for OptimizeScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Job => OptimizeScope::PerJob,
            ScopeArg::Layer => OptimizeScope::PerLayer,
            ScopeArg::Document => OptimizeScope::Document,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            machine,
            no_optimize,
            no_reverse,
            scope,
        } => {
            let document = load_document(&input)?;
            let limits = load_limits(machine.as_deref())?;
            let options = CompileOptions {
                optimize: OptimizeConfig {
                    enabled: !no_optimize,
                    allow_reverse: !no_reverse,
                    scope: scope.into(),
                },
                cancel: None,
            };
            run_compile(&document, &limits, &options, &input, output)?;
        }
        Commands::Raster {
            input,
            output,
            machine,
            width,
            dpi,
            speed,
            power,
            vertical,
        } => {
            let document = document_from_png(&input, width, dpi, speed, power, vertical)?;
            let limits = load_limits(machine.as_deref())?;
            run_compile(
                &document,
                &limits,
                &CompileOptions::default(),
                &input,
                output,
            )?;
        }
        Commands::Info { file } => {
            show_info(&file)?;
        }
    }

    Ok(())
}

/// Wire mirror of a layer with jobs kept as raw JSON, so one malformed
/// job descriptor drops that job instead of the whole document.
#[derive(serde::Deserialize)]
struct LayerWire {
    label: String,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    jobs: Vec<serde_json::Value>,
    #[serde(default)]
    elements: Vec<Element>,
}

fn default_visible() -> bool {
    true
}

#[derive(serde::Deserialize)]
struct DocumentWire {
    name: String,
    #[serde(default)]
    layers: Vec<LayerWire>,
}

fn load_document(path: &Path) -> Result<Document> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading document {}", path.display()))?;
    let wire: DocumentWire = serde_json::from_str(&json)
        .with_context(|| format!("parsing document {}", path.display()))?;

    let mut document = Document::new(wire.name);
    for wire_layer in wire.layers {
        let mut layer = Layer::new(&wire_layer.label);
        layer.visible = wire_layer.visible;
        layer.elements = wire_layer.elements;
        for raw in wire_layer.jobs {
            match serde_json::from_value::<Job>(raw) {
                Ok(job) => layer.jobs.push(job),
                Err(err) => {
                    eprintln!(
                        "warning: layer '{}': dropped malformed job descriptor: {err}",
                        layer.label
                    );
                }
            }
        }
        document.layers.push(layer);
    }
    Ok(document)
}

fn load_limits(path: Option<&Path>) -> Result<MachineLimits> {
    let Some(path) = path else {
        return Ok(MachineLimits::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading machine limits {}", path.display()))?;
    let limits: MachineLimits = serde_json::from_str(&json)
        .with_context(|| format!("parsing machine limits {}", path.display()))?;
    Ok(limits)
}

fn run_compile(
    document: &Document,
    limits: &MachineLimits,
    options: &CompileOptions,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let out = compile(document, limits, options)?;

    for diag in out.report.entries() {
        eprintln!("warning: {diag}");
    }

    let target = output.unwrap_or_else(|| input.with_extension("nc"));
    fs::write(&target, &out.gcode)
        .with_context(|| format!("writing program {}", target.display()))?;

    eprintln!(
        "compiled {} job(s), {} segment(s) to {}",
        out.stats.jobs_compiled,
        out.stats.segments,
        target.display()
    );
    if options.optimize.enabled && out.stats.travel.original_travel > 0.0 {
        eprintln!(
            "travel: {:.1}mm -> {:.1}mm ({:.0}% saved, {} segment(s) reversed)",
            out.stats.travel.original_travel,
            out.stats.travel.optimized_travel,
            out.stats.travel.savings_percent(),
            out.stats.travel.reversed
        );
    }
    Ok(())
}

/// Wrap a PNG in a single-layer, single-job document.
fn document_from_png(
    path: &Path,
    width: f64,
    dpi: f64,
    speed: f64,
    power: f64,
    vertical: bool,
) -> Result<Document> {
    let img = image::open(path)
        .with_context(|| format!("reading image {}", path.display()))?
        .to_luma8();
    let (px_w, px_h) = img.dimensions();
    anyhow::ensure!(px_w > 0 && px_h > 0, "image has zero dimension");

    let height = width * px_h as f64 / px_w as f64;
    let grid = ImageGrid {
        width: px_w,
        height: px_h,
        pixels: img.into_raw(),
        origin: Point2D::new(0.0, 0.0),
        size_x: width,
        size_y: height,
    };

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("raster")
        .to_string();

    let mut layer = Layer::new(&name);
    layer.elements.push(Element::Image(grid));
    layer.jobs.push(Job {
        id: "raster".into(),
        active: true,
        speed,
        power,
        order: 0,
        params: JobParams::Raster {
            dpi,
            scan_direction: if vertical {
                ScanDirection::Vertical
            } else {
                ScanDirection::Horizontal
            },
            power_min: 0.0,
            power_max: power,
            laser_mode: LaserMode::Dynamic,
        },
    });

    let mut document = Document::new(name);
    document.layers.push(layer);
    Ok(document)
}

fn show_info(file: &Path) -> Result<()> {
    let document = load_document(file)?;

    println!("document: {}", document.name);
    println!("  Layers: {}", document.layers.len());
    println!("  Active jobs: {}", document.active_job_count());

    for layer in &document.layers {
        let paths = layer
            .elements
            .iter()
            .filter(|e| matches!(e, Element::Path(_)))
            .count();
        let images = layer.elements.len() - paths;
        println!(
            "\nlayer '{}'{}: {} path(s), {} image(s)",
            layer.label,
            if layer.visible { "" } else { " (hidden)" },
            paths,
            images
        );
        for job in layer.active_jobs() {
            println!(
                "  job {} [{:?}] order {} speed {} power {}",
                job.id,
                job.kind(),
                job.order,
                job.speed,
                job.power
            );
            if let Err(err) = job.validate() {
                println!("    invalid: {err}");
            }
        }
    }

    Ok(())
}
