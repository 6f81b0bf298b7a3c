//! GRBL 1.1 program emission.
//!
//! Builds the one output program of a compilation run: a single header
//! and footer, per-layer and per-job comments, and motion/power commands
//! with modal suppression. All power and speed values are clamped
//! against the machine limits here, as the last gate before text.

use chrono::{SecondsFormat, Utc};
use grblc_math::{decimals_for, quantize, Point2};
use grblc_model::{Diagnostic, DiagnosticReport, LaserMode, MachineLimits};
use grblc_toolpath::{LaserState, Segment};

/// Modal state of the program being emitted.
///
/// Words already sent to the controller are not repeated: motion to an
/// identical quantized coordinate is suppressed entirely, and S/F words
/// appear only when their value changes.
#[derive(Debug, Clone, Default)]
struct EmitState {
    x: Option<f64>,
    y: Option<f64>,
    power: Option<f64>,
    speed: Option<f64>,
    laser_on: bool,
}

/// Streaming GRBL 1.1 emitter.
pub struct GcodeEmitter {
    limits: MachineLimits,
    travel_speed: f64,
    decimals: usize,
    out: String,
    state: EmitState,
    report: DiagnosticReport,
}

impl GcodeEmitter {
    /// Create an emitter for one compilation run.
    ///
    /// The configured travel speed is clamped once up front; a clamp
    /// that changes it is recorded.
    pub fn new(limits: MachineLimits) -> Self {
        let mut report = DiagnosticReport::new();
        let travel_speed = limits.clamp_speed(limits.travel_speed);
        if travel_speed != limits.travel_speed {
            report.push(Diagnostic::limit(format!(
                "travel speed {} clamped to {travel_speed}",
                limits.travel_speed
            )));
        }
        Self {
            travel_speed,
            decimals: decimals_for(limits.resolution),
            limits,
            out: String::new(),
            state: EmitState::default(),
            report,
        }
    }

    /// Emit the program header: comment block, units, absolute mode.
    pub fn header(&mut self, document_name: &str) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.line(&format!("; {document_name}"));
        self.line(&format!("; Generated: {timestamp}"));
        self.line("; GRBL 1.1 laser program");
        self.line("G21 ; Millimeters");
        self.line("G90 ; Absolute positioning");
        self.line("M5 ; Laser off");
    }

    /// Emit the program footer: laser off, park, program end.
    pub fn footer(&mut self) {
        self.laser_off();
        self.line("G0 X0 Y0 ; Return to origin");
        self.line("M2 ; Program end");
    }

    /// Emit a comment line.
    pub fn comment(&mut self, text: &str) {
        self.line(&format!("; {text}"));
    }

    /// Emit one toolpath segment.
    ///
    /// Travels laser-off to the segment start, activates the job's laser
    /// mode, traces every point, and switches the laser off at the end.
    /// `power` and `speed` are the job's values for uniform segments;
    /// power-modulated segments carry their own per-step S values.
    pub fn segment(&mut self, seg: &Segment, mode: LaserMode, power: f64, speed: f64) {
        if seg.is_empty() {
            return;
        }
        let speed = self.clamp_speed(speed);
        self.travel(seg.start());

        let initial_power = match &seg.steps {
            None => power,
            Some(steps) => steps
                .iter()
                .find_map(|s| match s {
                    LaserState::On(p) => Some(*p),
                    LaserState::Off => None,
                })
                .unwrap_or(0.0),
        };
        self.laser_on(mode, initial_power);

        match &seg.steps {
            None => {
                for &p in &seg.points[1..] {
                    self.feed(p, power, speed);
                }
            }
            Some(steps) => {
                for (&p, &step) in seg.points[1..].iter().zip(steps) {
                    match step {
                        LaserState::On(p_step) => self.feed(p, p_step, speed),
                        LaserState::Off => self.travel(p),
                    }
                }
            }
        }

        self.laser_off();
    }

    /// Finish emission, yielding the program text and clamp diagnostics.
    pub fn finish(self) -> (String, DiagnosticReport) {
        (self.out, self.report)
    }

    // ------------------------------------------------------------------
    // Motion primitives
    // ------------------------------------------------------------------

    /// Laser-off rapid to `p`. Suppressed when already there.
    fn travel(&mut self, p: Point2) {
        let (x, y) = self.quantized(p);
        if self.at(x, y) {
            return;
        }
        let mut cmd = format!("G0 {}", self.coords(x, y));
        if self.state.speed != Some(self.travel_speed) {
            cmd.push_str(&format!(" F{}", self.travel_speed));
            self.state.speed = Some(self.travel_speed);
        }
        self.line(&cmd);
        self.state.x = Some(x);
        self.state.y = Some(y);
    }

    /// Laser-on feed move to `p`. Suppressed when already there.
    fn feed(&mut self, p: Point2, power: f64, speed: f64) {
        let (x, y) = self.quantized(p);
        if self.at(x, y) {
            return;
        }
        let power = self.clamp_power(power);
        let mut cmd = format!("G1 {}", self.coords(x, y));
        if self.state.power != Some(power) {
            cmd.push_str(&format!(" S{power:.0}"));
            self.state.power = Some(power);
        }
        if self.state.speed != Some(speed) {
            // shortest float form: slow feeds keep their fraction, whole
            // feeds print without one
            cmd.push_str(&format!(" F{speed}"));
            self.state.speed = Some(speed);
        }
        self.line(&cmd);
        self.state.x = Some(x);
        self.state.y = Some(y);
    }

    /// Activate the laser in the job's command family.
    fn laser_on(&mut self, mode: LaserMode, power: f64) {
        let power = self.clamp_power(power);
        let word = match mode {
            LaserMode::Constant => "M3",
            LaserMode::Dynamic => "M4",
        };
        self.line(&format!("{word} S{power:.0}"));
        self.state.power = Some(power);
        self.state.laser_on = true;
    }

    /// Switch the laser off, if it is on.
    fn laser_off(&mut self) {
        if self.state.laser_on {
            self.line("M5");
            self.state.laser_on = false;
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn quantized(&self, p: Point2) -> (f64, f64) {
        // +0.0 folds negative zero after rounding
        (
            quantize(p.x, self.limits.resolution) + 0.0,
            quantize(p.y, self.limits.resolution) + 0.0,
        )
    }

    fn at(&self, x: f64, y: f64) -> bool {
        self.state.x == Some(x) && self.state.y == Some(y)
    }

    fn coords(&self, x: f64, y: f64) -> String {
        format!(
            "X{x:.prec$} Y{y:.prec$}",
            x = x,
            y = y,
            prec = self.decimals
        )
    }

    fn clamp_power(&mut self, value: f64) -> f64 {
        let clamped = self.limits.clamp_power(value);
        if clamped != value {
            self.report.push(Diagnostic::limit(format!(
                "power {value} clamped to {clamped}"
            )));
        }
        clamped
    }

    fn clamp_speed(&mut self, value: f64) -> f64 {
        let clamped = self.limits.clamp_speed(value);
        if clamped != value {
            self.report.push(Diagnostic::limit(format!(
                "speed {value} clamped to {clamped}"
            )));
        }
        clamped
    }
}
