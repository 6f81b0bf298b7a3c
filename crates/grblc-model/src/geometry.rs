//! Raw geometry elements as handed over by the host.
//!
//! The host flattens nothing: paths arrive as move/line/cubic command
//! lists and images as grayscale sample grids with physical placement.
//! The toolpath crate owns flattening and resampling.

use serde::{Deserialize, Serialize};

use crate::{ModelError, Result};

/// A 2D point on the wire (mm, machine space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point2D {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// One drawing command of a path, relative to the path's running point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum PathCommand {
    /// Straight line to `to`.
    Line {
        /// End point.
        to: Point2D,
    },
    /// Cubic Bezier to `to` with control points `c1`, `c2`.
    Cubic {
        /// First control point.
        c1: Point2D,
        /// Second control point.
        c2: Point2D,
        /// End point.
        to: Point2D,
    },
}

/// A vector path: a start point, drawing commands, and a closed flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathGeometry {
    /// First point of the path.
    pub start: Point2D,
    /// Drawing commands in order.
    pub commands: Vec<PathCommand>,
    /// Whether the path closes back to `start`.
    #[serde(default)]
    pub closed: bool,
}

impl PathGeometry {
    /// A polyline path from a plain point list.
    pub fn polyline(points: &[(f64, f64)], closed: bool) -> Self {
        let start = points.first().copied().unwrap_or((0.0, 0.0)).into();
        let commands = points
            .iter()
            .skip(1)
            .map(|&p| PathCommand::Line { to: p.into() })
            .collect();
        Self {
            start,
            commands,
            closed,
        }
    }

    /// Whether the path has any drawable extent at all.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// An embedded grayscale image with physical placement.
///
/// `pixels` is row-major, top row first, one byte per sample
/// (0 = black, 255 = white).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGrid {
    /// Sample columns.
    pub width: u32,
    /// Sample rows.
    pub height: u32,
    /// Row-major grayscale samples, `width * height` bytes.
    pub pixels: Vec<u8>,
    /// Bottom-left corner of the placement rectangle (mm).
    pub origin: Point2D,
    /// Physical width of the placement rectangle (mm).
    pub size_x: f64,
    /// Physical height of the placement rectangle (mm).
    pub size_y: f64,
}

impl ImageGrid {
    /// Validate structural consistency.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ModelError::InvalidGeometry("image has zero dimension".into()));
        }
        let expected = self.width as usize * self.height as usize;
        if self.pixels.len() != expected {
            return Err(ModelError::InvalidGeometry(format!(
                "image pixel count {} does not match {}x{}",
                self.pixels.len(),
                self.width,
                self.height
            )));
        }
        if self.size_x <= 0.0 || self.size_y <= 0.0 {
            return Err(ModelError::InvalidGeometry(
                "image physical size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Grayscale sample at `(col, row)`, row 0 at the top.
    pub fn sample(&self, col: u32, row: u32) -> u8 {
        self.pixels[row as usize * self.width as usize + col as usize]
    }
}

/// One geometry element of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "lowercase")]
pub enum Element {
    /// A vector path.
    Path(PathGeometry),
    /// An embedded image.
    Image(ImageGrid),
}
