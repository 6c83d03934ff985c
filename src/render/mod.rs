//! Page rendering infrastructure

mod adapter;
mod cache;
#[cfg(feature = "pdf")]
mod mupdf_adapter;
mod request;
mod service;
mod types;
mod worker;

pub use adapter::{PageRenderer, load_document_info, load_text_runs, page_size, render_page};
pub use cache::{CacheKey, PageCache};
#[cfg(feature = "pdf")]
pub use mupdf_adapter::MupdfRenderer;
pub use request::{RenderError, RenderParams, RenderRequest, RenderResponse, RequestId};
pub use service::{RenderService, ServiceConfig};
pub use types::*;
