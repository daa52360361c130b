//! Coordinate transforms between the renderer's top-left frame and the four
//! corner-origin conventions.
//!
//! Raw coordinates are always measured from the top-left corner of the page in
//! points (1/72 inch). Every other representation is derived from them with
//! plain arithmetic so the same raw point always maps to the same adjusted
//! point, bit for bit.

use crate::error::{AnnotationError, AnnotationResult};
use std::fmt;
use std::str::FromStr;

/// Millimeters per PDF point.
pub const MM_PER_POINT: f64 = 25.4 / 72.0;

/// Page corner used as the (0, 0) reference for adjusted coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Origin {
    #[serde(rename = "Top-Left")]
    TopLeft,
    #[serde(rename = "Top-Right")]
    TopRight,
    #[serde(rename = "Bottom-Left")]
    BottomLeft,
    #[serde(rename = "Bottom-Right")]
    BottomRight,
}

impl Origin {
    pub const ALL: [Origin; 4] =
        [Origin::TopLeft, Origin::TopRight, Origin::BottomLeft, Origin::BottomRight];

    /// Token used in CSV files and user-facing selectors.
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::TopLeft => "Top-Left",
            Origin::TopRight => "Top-Right",
            Origin::BottomLeft => "Bottom-Left",
            Origin::BottomRight => "Bottom-Right",
        }
    }

    fn flips_x(self) -> bool {
        matches!(self, Origin::TopRight | Origin::BottomRight)
    }

    fn flips_y(self) -> bool {
        matches!(self, Origin::BottomLeft | Origin::BottomRight)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::ALL
            .into_iter()
            .find(|origin| origin.as_str() == s)
            .ok_or_else(|| AnnotationError::InvalidArgument(format!("unknown origin '{s}'")))
    }
}

/// Re-express a raw (top-left origin) position under `origin`.
///
/// Each mapping is its own inverse for fixed page dimensions.
pub fn adjust(
    raw_x: f64,
    raw_y: f64,
    page_width: f64,
    page_height: f64,
    origin: Origin,
) -> (f64, f64) {
    let x = if origin.flips_x() { page_width - raw_x } else { raw_x };
    let y = if origin.flips_y() { page_height - raw_y } else { raw_y };
    (x, y)
}

/// [`adjust`] for callers holding the origin as text, e.g. a selector value.
pub fn adjust_named(
    raw_x: f64,
    raw_y: f64,
    page_width: f64,
    page_height: f64,
    origin: &str,
) -> AnnotationResult<(f64, f64)> {
    let origin = origin.parse::<Origin>()?;
    Ok(adjust(raw_x, raw_y, page_width, page_height, origin))
}

pub fn pt2mm(pt: f64) -> f64 {
    pt * 25.4 / 72.0
}

pub fn mm2pt(mm: f64) -> f64 {
    mm * 72.0 / 25.4
}
