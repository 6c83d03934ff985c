//! Render request and response types

use std::sync::Arc;

use crate::extract::{Rotation, TextRun};

use super::types::PageData;

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Parameters for rendering a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    /// User-specified scale factor
    pub scale: f64,
    /// Clockwise rotation applied to the page
    pub rotation: Rotation,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: Rotation::R0,
        }
    }
}

/// Request sent to render workers
#[derive(Debug)]
pub enum RenderRequest {
    /// Render a page (high priority)
    Page {
        id: RequestId,
        page: usize,
        params: RenderParams,
    },

    /// Fetch the text runs of a page
    TextRuns { id: RequestId, page: usize },

    /// Prefetch a page (low priority)
    Prefetch {
        id: RequestId,
        page: usize,
        params: RenderParams,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Errors from the page rendering adapter
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("document could not be loaded: {0}")]
    Load(String),

    #[error("page {page} out of range (document has {page_count})")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("malformed text layer on page {page}: {detail}")]
    MalformedTextLayer { page: usize, detail: String },

    #[error(transparent)]
    Viewport(#[from] crate::extract::ViewportError),

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Response from render workers
#[derive(Debug)]
pub enum RenderResponse {
    /// Rendered page data
    Page {
        id: RequestId,
        page: usize,
        data: Arc<PageData>,
    },

    /// Text runs of a page, in page space
    TextRuns {
        id: RequestId,
        page: usize,
        runs: Result<Vec<TextRun>, RenderError>,
    },

    /// Request was cancelled
    Cancelled(RequestId),

    /// Error during rendering
    Error { id: RequestId, error: RenderError },
}
