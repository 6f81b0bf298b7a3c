//! Raster engine.
//!
//! Resamples a grayscale image at the job DPI and walks it serpentine
//! fashion, mapping darkness to laser power. Runs of equal power merge
//! into single motion steps; white runs split the line so the head
//! travels over them with the laser off.

use grblc_math::Point2;
use grblc_model::{DiagnosticReport, ImageGrid, ScanDirection};

use crate::{LaserState, Segment, POWER_OFF_EPS};

/// Map a grayscale sample to laser power.
///
/// Linear in darkness: white (255) maps to `power_min`, black (0) to
/// `power_max`.
pub fn pixel_power(gray: u8, power_min: f64, power_max: f64) -> f64 {
    let darkness = 1.0 - gray as f64 / 255.0;
    power_min + darkness * (power_max - power_min)
}

/// Generate raster scan segments for an image.
///
/// The sample step is `25.4 / dpi` mm. Lines alternate direction for
/// travel efficiency. Samples whose mapped power is at or below
/// [`POWER_OFF_EPS`] become gaps: the line is split and the emitter
/// travels across them laser-off. Lines with no burnable samples are
/// dropped entirely.
pub fn generate_raster(
    image: &ImageGrid,
    dpi: f64,
    direction: ScanDirection,
    power_min: f64,
    power_max: f64,
    report: &mut DiagnosticReport,
) -> Vec<Segment> {
    if let Err(err) = image.validate() {
        report.push(grblc_model::Diagnostic::fatal_input(err.to_string()));
        return Vec::new();
    }

    let step = 25.4 / dpi;
    let cols = ((image.size_x / step) as u32).max(1);
    let rows = ((image.size_y / step) as u32).max(1);

    let mut segments = Vec::new();
    match direction {
        ScanDirection::Horizontal => {
            for row in 0..rows {
                let forward = row % 2 == 0;
                let samples = sample_line(image, cols, rows, row, forward, true);
                scan_line(&samples, power_min, power_max, &mut segments);
            }
        }
        ScanDirection::Vertical => {
            for col in 0..cols {
                let forward = col % 2 == 0;
                let samples = sample_line(image, cols, rows, col, forward, false);
                scan_line(&samples, power_min, power_max, &mut segments);
            }
        }
    }
    segments
}

/// One resampled line: machine-space positions plus grayscale values.
fn sample_line(
    image: &ImageGrid,
    cols: u32,
    rows: u32,
    line: u32,
    forward: bool,
    horizontal: bool,
) -> Vec<(Point2, u8)> {
    let step_x = image.size_x / cols as f64;
    let step_y = image.size_y / rows as f64;

    let count = if horizontal { cols } else { rows };
    let mut samples = Vec::with_capacity(count as usize);
    for i in 0..count {
        let idx = if forward { i } else { count - 1 - i };
        let (col, row) = if horizontal { (idx, line) } else { (line, idx) };

        // Cell-centered positions; image row 0 sits at the top of the
        // placement rectangle while machine Y grows upward.
        let x = image.origin.x + (col as f64 + 0.5) * step_x;
        let y = image.origin.y + image.size_y - (row as f64 + 0.5) * step_y;

        // Nearest source pixel.
        let src_col =
            (((col as f64 + 0.5) * image.width as f64 / cols as f64) as u32).min(image.width - 1);
        let src_row =
            (((row as f64 + 0.5) * image.height as f64 / rows as f64) as u32).min(image.height - 1);

        samples.push((Point2::new(x, y), image.sample(src_col, src_row)));
    }
    samples
}

/// Split one sample line into burn segments, merging equal-power runs.
fn scan_line(samples: &[(Point2, u8)], power_min: f64, power_max: f64, out: &mut Vec<Segment>) {
    let mut run_start: Option<usize> = None;

    let state_of = |gray: u8| {
        let power = pixel_power(gray, power_min, power_max);
        if power <= POWER_OFF_EPS {
            LaserState::Off
        } else {
            LaserState::On(power)
        }
    };

    let flush = |start: usize, end: usize, out: &mut Vec<Segment>| {
        // Burn run covering samples [start..=end].
        let mut points = vec![samples[start].0];
        let mut steps: Vec<LaserState> = Vec::new();
        for i in start + 1..=end {
            let state = state_of(samples[i].1);
            match steps.last() {
                Some(&last) if last == state => {
                    // extend the previous run
                    *points.last_mut().expect("non-empty") = samples[i].0;
                }
                _ => {
                    points.push(samples[i].0);
                    steps.push(state);
                }
            }
        }
        if steps.is_empty() {
            // Single-sample dot: burn one step across the cell at the
            // sample's own power.
            let from = samples[start].0;
            let to = if start + 1 < samples.len() {
                Point2::new(
                    (from.x + samples[start + 1].0.x) / 2.0,
                    (from.y + samples[start + 1].0.y) / 2.0,
                )
            } else if start > 0 {
                let prev = samples[start - 1].0;
                Point2::new(
                    from.x + (from.x - prev.x) / 2.0,
                    from.y + (from.y - prev.y) / 2.0,
                )
            } else {
                return;
            };
            points = vec![from, to];
            steps = vec![state_of(samples[start].1)];
        }
        out.push(Segment::modulated(points, steps));
    };

    for (i, &(_, gray)) in samples.iter().enumerate() {
        let burn = matches!(state_of(gray), LaserState::On(_));
        match (burn, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                flush(start, i - 1, out);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        flush(start, samples.len() - 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use grblc_model::Point2D;

    fn image(width: u32, height: u32, pixels: Vec<u8>) -> ImageGrid {
        ImageGrid {
            width,
            height,
            pixels,
            origin: Point2D::new(0.0, 0.0),
            size_x: width as f64,
            size_y: height as f64,
        }
    }

    #[test]
    fn test_pixel_power_endpoints() {
        assert_relative_eq!(pixel_power(255, 100.0, 800.0), 100.0);
        assert_relative_eq!(pixel_power(0, 100.0, 800.0), 800.0);
    }

    #[test]
    fn test_pixel_power_monotonic() {
        let mut last = f64::INFINITY;
        for gray in 0..=255u8 {
            let p = pixel_power(gray, 0.0, 1000.0);
            assert!(p <= last, "darker must never map below lighter");
            last = p;
        }
    }

    #[test]
    fn test_all_white_image_produces_nothing() {
        let img = image(4, 4, vec![255; 16]);
        let mut report = DiagnosticReport::new();
        let segments = generate_raster(&img, 25.4, ScanDirection::Horizontal, 0.0, 600.0, &mut report);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_uniform_black_merges_to_one_step_per_line() {
        let img = image(8, 2, vec![0; 16]);
        let mut report = DiagnosticReport::new();
        // dpi 25.4 -> 1mm step -> 8 cols, 2 rows
        let segments = generate_raster(&img, 25.4, ScanDirection::Horizontal, 0.0, 600.0, &mut report);
        assert_eq!(segments.len(), 2);
        for seg in &segments {
            assert_eq!(seg.points.len(), 2);
            assert_eq!(seg.steps.as_ref().unwrap().len(), 1);
            assert_eq!(seg.steps.as_ref().unwrap()[0], LaserState::On(600.0));
        }
    }

    #[test]
    fn test_serpentine_alternates_direction() {
        let img = image(4, 2, vec![0; 8]);
        let mut report = DiagnosticReport::new();
        let segments = generate_raster(&img, 25.4, ScanDirection::Horizontal, 0.0, 600.0, &mut report);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].start().x < segments[0].end().x);
        assert!(segments[1].start().x > segments[1].end().x);
    }

    #[test]
    fn test_white_gap_splits_line() {
        // black, black, white, white, black - one line
        let img = image(5, 1, vec![0, 0, 255, 255, 0]);
        let mut report = DiagnosticReport::new();
        let segments = generate_raster(&img, 25.4, ScanDirection::Horizontal, 0.0, 600.0, &mut report);
        assert_eq!(segments.len(), 2);
        // the gap stays un-burned
        assert!(segments[0].end().x < segments[1].start().x);
    }

    #[test]
    fn test_vertical_scan_uses_columns() {
        let img = image(2, 4, vec![0; 8]);
        let mut report = DiagnosticReport::new();
        let segments = generate_raster(&img, 25.4, ScanDirection::Vertical, 0.0, 600.0, &mut report);
        assert_eq!(segments.len(), 2);
        // each segment spans the column vertically
        for seg in &segments {
            assert_relative_eq!(seg.start().x, seg.end().x, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_nonzero_power_min_keeps_white_burning() {
        // with power_min > 0, white maps to power_min and still burns
        let img = image(4, 1, vec![255; 4]);
        let mut report = DiagnosticReport::new();
        let segments = generate_raster(&img, 25.4, ScanDirection::Horizontal, 50.0, 600.0, &mut report);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].steps.as_ref().unwrap()[0], LaserState::On(50.0));
    }
}
