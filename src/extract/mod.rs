//! Document-region-to-field extraction
//!
//! A rectangle dragged over a rendered page is mapped back into page
//! space, matched against the page's text runs, and the text it fully
//! encloses is written into the armed form field.

mod binder;
mod containment;
mod engine;
mod geometry;
mod mapper;
mod selection;
mod viewport;

pub use binder::{ExtractionStatus, FieldBinder, FieldKey, FieldRegistry, Highlight};
pub use containment::{contained_runs, find_contained_text};
pub use engine::ExtractionEngine;
pub use geometry::{DeviceRect, PageRect, Point, Rotation, TextRun, Viewport, ViewportError};
pub use mapper::{map_to_device_space, map_to_page_space};
pub use selection::{Commit, SelectionEvent, SelectionTracker, Transition};
pub use viewport::{Effect, ViewportCommand, ViewportGeneration, ViewportState, ZoomLimits};
