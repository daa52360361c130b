//! Annotation data model
//!
//! One [`Annotation`] per recorded click. Raw coordinates (top-left origin, in
//! points) are the ground truth; adjusted and millimeter coordinates are a
//! cached projection of them under the annotation's current [`Origin`].

use crate::transform::{adjust, pt2mm, Origin};
use std::fmt;

/// Declares a categorical tag that recommends a fixed set of values but keeps
/// any other text verbatim in `Custom`.
macro_rules! open_tag {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $token:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// Text outside the recommended set, kept as written
            Custom(String),
        }

        impl $name {
            /// Recommended values, in display order
            pub const RECOMMENDED: &'static [&'static str] = &[$($token),+];

            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $token,)+
                    $name::Custom(text) => text.as_str(),
                }
            }

            pub fn is_recommended(&self) -> bool {
                !matches!(self, $name::Custom(_))
            }
        }

        impl From<&str> for $name {
            fn from(text: &str) -> Self {
                match text {
                    $($token $(| $alias)* => $name::$variant,)+
                    other => $name::Custom(other.to_string()),
                }
            }
        }

        impl From<String> for $name {
            fn from(text: String) -> Self {
                $name::from(text.as_str())
            }
        }

        impl From<$name> for String {
            fn from(tag: $name) -> Self {
                tag.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

open_tag! {
    /// Semantic role of the point within the document
    ///
    /// `Linespace` points carry a line spacing in their raw Y value rather
    /// than a position.
    Part {
        Heading => "Heading",
        Body => "Body",
        Summary => "Summary",
        Linespace => "Linespace",
    }
}

open_tag! {
    /// Kind of value that will be placed at the point
    DataType {
        Text => "Text",
        Numeric => "Numeric",
        Numeric2Digits => "Numeric 2 digits" | "Numeric-2-digit",
        Date => "Date",
        Image => "Image",
        Video => "Video",
        Audio => "Audio",
    }
}

open_tag! {
    /// Horizontal alignment of the value placed at the point
    Alignment {
        Left => "Left",
        Right => "Right",
        Center => "Center",
    }
}

impl Default for Part {
    fn default() -> Self {
        Part::Heading
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Text
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Alignment::Left
    }
}

/// A recorded click and everything the user attached to it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    /// 1-based page number
    page_number: u32,
    raw_x: f64,
    raw_y: f64,
    adjusted_x: f64,
    adjusted_y: f64,
    origin: Origin,
    mm_x: f64,
    mm_y: f64,

    pub name: String,
    pub part: Part,
    pub datatype: DataType,
    pub alignment: Alignment,
}

impl Annotation {
    /// Create an annotation from a raw click with default tags.
    pub fn new(
        page_number: u32,
        raw_x: f64,
        raw_y: f64,
        page_width: f64,
        page_height: f64,
        origin: Origin,
        name: impl Into<String>,
    ) -> Self {
        let mut annotation = Self {
            page_number,
            raw_x,
            raw_y,
            adjusted_x: raw_x,
            adjusted_y: raw_y,
            origin,
            mm_x: 0.0,
            mm_y: 0.0,
            name: name.into(),
            part: Part::default(),
            datatype: DataType::default(),
            alignment: Alignment::default(),
        };
        annotation.reproject(page_width, page_height, origin);
        annotation
    }

    /// Rebuild an annotation exactly as it was persisted.
    ///
    /// No recomputation happens: adjusted and millimeter values are taken as
    /// stored, since the page dimensions they were derived from are unknown.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        page_number: u32,
        origin: Origin,
        raw: (f64, f64),
        adjusted: (f64, f64),
        mm: (f64, f64),
        name: impl Into<String>,
        part: Part,
        datatype: DataType,
        alignment: Alignment,
    ) -> Self {
        Self {
            page_number,
            raw_x: raw.0,
            raw_y: raw.1,
            adjusted_x: adjusted.0,
            adjusted_y: adjusted.1,
            origin,
            mm_x: mm.0,
            mm_y: mm.1,
            name: name.into(),
            part,
            datatype,
            alignment,
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn raw(&self) -> (f64, f64) {
        (self.raw_x, self.raw_y)
    }

    pub fn adjusted(&self) -> (f64, f64) {
        (self.adjusted_x, self.adjusted_y)
    }

    pub fn mm(&self) -> (f64, f64) {
        (self.mm_x, self.mm_y)
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Recompute adjusted and millimeter values from raw under `origin`.
    pub fn reproject(&mut self, page_width: f64, page_height: f64, origin: Origin) {
        let (x, y) = adjust(self.raw_x, self.raw_y, page_width, page_height, origin);
        self.origin = origin;
        self.set_adjusted(x, y);
    }

    /// Replace the raw position and re-derive everything from it.
    pub fn move_to(
        &mut self,
        raw_x: f64,
        raw_y: f64,
        page_width: f64,
        page_height: f64,
        origin: Origin,
    ) {
        self.raw_x = raw_x;
        self.raw_y = raw_y;
        self.reproject(page_width, page_height, origin);
    }

    /// Overwrite the adjusted position directly, leaving raw untouched.
    ///
    /// The adjusted values stop matching the raw-derived projection until the
    /// next [`move_to`](Self::move_to) or [`reproject`](Self::reproject).
    pub fn set_adjusted(&mut self, adjusted_x: f64, adjusted_y: f64) {
        self.adjusted_x = adjusted_x;
        self.adjusted_y = adjusted_y;
        self.mm_x = pt2mm(adjusted_x);
        self.mm_y = pt2mm(adjusted_y);
    }

    /// Whether the raw position lies within `tolerance` of the query on both
    /// axes (inclusive).
    pub fn is_near(&self, raw_x: f64, raw_y: f64, tolerance: f64) -> bool {
        (self.raw_x - raw_x).abs() <= tolerance && (self.raw_y - raw_y).abs() <= tolerance
    }

    /// Canvas position of the marker at `zoom` pixels per point.
    pub fn marker_position(&self, zoom: f64) -> (f64, f64) {
        (self.raw_x * zoom, self.raw_y * zoom)
    }

    /// One-line history entry, `ordinal` being the 1-based position in the
    /// collection.
    pub fn summary_line(&self, ordinal: usize) -> String {
        format!(
            "#{:2} P{} ({:.1}, {:.1}) {} {}",
            ordinal, self.page_number, self.adjusted_x, self.adjusted_y, self.name, self.part
        )
    }

    /// Multi-line coordinate readout for the most recently touched point.
    pub fn coordinate_details(&self) -> String {
        format!(
            "Page: {}\nOrigin: {}\n\nRaw coordinates (Top-Left):\nX: {:.2}\nY: {:.2}\n\n\
             Adjusted coordinates:\nX: {:.2}\nY: {:.2}",
            self.page_number,
            self.origin,
            self.raw_x,
            self.raw_y,
            self.adjusted_x,
            self.adjusted_y
        )
    }
}
