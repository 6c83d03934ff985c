//! Core types for page rendering

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::extract::TextRun;

use super::request::RenderParams;

/// Width and height in page units or device pixels, depending on context
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// How the adapter splits page text into runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunGranularity {
    /// One run per text line as laid out by the engine
    #[default]
    Line,
    /// One run per whitespace-separated word
    Word,
}

impl RunGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunGranularity::Line => "line",
            RunGranularity::Word => "word",
        }
    }
}

/// Raw rendered page image.
///
/// Contains RGB pixel data, 3 bytes per pixel, rows packed without padding.
#[derive(Clone)]
pub struct ImageData {
    pub pixels: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Complete rendered page data
#[derive(Clone)]
pub struct PageData {
    /// Rendered image data
    pub img_data: ImageData,
    /// Page number (0-indexed)
    pub page_num: usize,
    /// Scale and rotation used for rendering
    pub params: RenderParams,
    /// Intrinsic page size at scale 1, rotation 0
    pub page_size: PageSize,
    /// Text runs in page space
    pub text_runs: Arc<[TextRun]>,
}

impl std::fmt::Debug for PageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageData")
            .field("page_num", &self.page_num)
            .field("img_data", &self.img_data)
            .field("params", &self.params)
            .field("page_size", &self.page_size)
            .field("text_runs_count", &self.text_runs.len())
            .finish()
    }
}

/// Document metadata
#[derive(Clone, Debug, Default)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Intrinsic size of each page, in page order
    pub page_sizes: Vec<PageSize>,
}
