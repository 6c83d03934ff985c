//! Geometry shared by the extraction engine
//!
//! Two coordinate systems are in play:
//! - *device space*: pixels of the rendered bitmap, origin top-left, y down,
//!   affected by the current scale and rotation
//! - *page space*: the page's intrinsic units at scale 1 and no rotation,
//!   origin bottom-left, y up (PDF convention)
//!
//! Page-space rectangles use `x0, y0, x1, y1` with `x0 <= x1` and
//! `y0 <= y1`, so `y0` is the edge closer to the bottom of the page.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing a [`Viewport`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewportError {
    #[error("scale must be a finite positive number, got {0}")]
    InvalidScale(f64),

    #[error("rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i32),

    #[error("page size must be finite and positive, got {width}x{height}")]
    InvalidPageSize { width: f64, height: f64 },
}

/// A point in device space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Clockwise page rotation applied when rendering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Self::R0, Self::R90, Self::R180, Self::R270];

    /// Parse a rotation in degrees. Any multiple of 90 is accepted and
    /// normalized into `0..360`, so `-90` becomes `R270`.
    pub fn from_degrees(degrees: i32) -> Result<Self, ViewportError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::R0),
            90 => Ok(Self::R90),
            180 => Ok(Self::R180),
            270 => Ok(Self::R270),
            _ => Err(ViewportError::InvalidRotation(degrees)),
        }
    }

    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    #[must_use]
    pub const fn clockwise(self) -> Self {
        match self {
            Self::R0 => Self::R90,
            Self::R90 => Self::R180,
            Self::R180 => Self::R270,
            Self::R270 => Self::R0,
        }
    }

    #[must_use]
    pub const fn counter_clockwise(self) -> Self {
        match self {
            Self::R0 => Self::R270,
            Self::R90 => Self::R0,
            Self::R180 => Self::R90,
            Self::R270 => Self::R180,
        }
    }

    /// Whether the rendered bitmap has width and height swapped
    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }

    /// Exact cosine and sine of the rotation angle
    pub(crate) const fn cos_sin(self) -> (f64, f64) {
        match self {
            Self::R0 => (1.0, 0.0),
            Self::R90 => (0.0, 1.0),
            Self::R180 => (-1.0, 0.0),
            Self::R270 => (0.0, -1.0),
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = ViewportError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Self::from_degrees(degrees)
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        i32::from(rotation.degrees())
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Scale, rotation and intrinsic page size a page was rendered with.
///
/// A viewport is never mutated; zoom, rotate and page changes build a new
/// one. Construction validates the invariants, so every `Viewport` in
/// circulation has a positive scale and a positive page size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    scale: f64,
    rotation: Rotation,
    page_width: f64,
    page_height: f64,
}

impl Viewport {
    pub fn new(
        scale: f64,
        rotation: Rotation,
        page_width: f64,
        page_height: f64,
    ) -> Result<Self, ViewportError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewportError::InvalidScale(scale));
        }
        let valid_side = |v: f64| v.is_finite() && v > 0.0;
        if !valid_side(page_width) || !valid_side(page_height) {
            return Err(ViewportError::InvalidPageSize {
                width: page_width,
                height: page_height,
            });
        }
        Ok(Self {
            scale,
            rotation,
            page_width,
            page_height,
        })
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub fn page_width(&self) -> f64 {
        self.page_width
    }

    #[must_use]
    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    /// Size of the rendered bitmap in device pixels
    #[must_use]
    pub fn device_size(&self) -> (f64, f64) {
        let (w, h) = if self.rotation.swaps_axes() {
            (self.page_height, self.page_width)
        } else {
            (self.page_width, self.page_height)
        };
        (w * self.scale, h * self.scale)
    }
}

/// Rectangle in device space.
///
/// Width and height may be negative while a drag is in progress (the user
/// dragged left or up from the anchor); [`DeviceRect::normalized`] flips
/// such a rectangle so both are non-negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DeviceRect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned from `anchor` to `current`, signed
    #[must_use]
    pub fn from_drag(anchor: Point, current: Point) -> Self {
        Self::new(
            anchor.x,
            anchor.y,
            current.x - anchor.x,
            current.y - anchor.y,
        )
    }

    /// Same area with the origin moved so width and height are non-negative
    #[must_use]
    pub fn normalized(&self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Self::new(x, y, width, height)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }

    pub(crate) fn corners(&self) -> (Point, Point) {
        (
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y + self.height),
        )
    }

    pub(crate) fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, a.x.max(b.x) - x, a.y.max(b.y) - y)
    }
}

/// Rectangle in page space, always normalized
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PageRect {
    /// Build from two opposite corners in any order
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x0: a.x.min(b.x),
            y0: a.y.min(b.y),
            x1: a.x.max(b.x),
            y1: a.y.max(b.y),
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }

    /// True if `run` lies fully inside, edges included
    #[must_use]
    pub fn contains(&self, run: &TextRun) -> bool {
        run.x0 >= self.x0 && run.x1 <= self.x1 && run.y0 >= self.y0 && run.y1 <= self.y1
    }
}

/// One fragment of page text with its bounding box in page space
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub text: String,
}

impl TextRun {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64, text: impl Into<String>) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            text: text.into(),
        }
    }

    /// Finite, non-inverted bounding box
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
            && self.x0 <= self.x1
            && self.y0 <= self.y1
    }
}
