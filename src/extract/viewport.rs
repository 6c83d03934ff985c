//! Viewport state management
//!
//! Holds the zoom factor, rotation and current page, and rebuilds the
//! [`Viewport`] whenever any of them change. Every rebuild bumps the
//! [`ViewportGeneration`], which is how the selection tracker tells a drag
//! started under the current viewport from one started under a stale one.

use std::collections::HashMap;

use log::{debug, warn};

use super::geometry::{Rotation, Viewport};

/// Monotonic counter identifying a viewport instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewportGeneration(pub u64);

impl ViewportGeneration {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Zoom step rates and scale bounds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomLimits {
    /// Zoom in rate multiplier per step
    pub zoom_in_rate: f64,
    /// Zoom out rate divisor per step
    pub zoom_out_rate: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            zoom_in_rate: 1.1,
            zoom_out_rate: 1.05,
            min_scale: 0.1,
            max_scale: 8.0,
        }
    }
}

impl ZoomLimits {
    /// Replace unusable values with defaults
    ///
    /// Bounds must be finite, positive and ordered, and step rates must
    /// be greater than one.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let mut limits = self;

        if !positive(limits.min_scale)
            || !positive(limits.max_scale)
            || limits.min_scale > limits.max_scale
        {
            warn!(
                "Invalid scale bounds [{}, {}], using defaults",
                limits.min_scale, limits.max_scale
            );
            limits.min_scale = defaults.min_scale;
            limits.max_scale = defaults.max_scale;
        }
        if !(limits.zoom_in_rate.is_finite() && limits.zoom_in_rate > 1.0) {
            warn!("Invalid zoom_in_rate {}, using default", limits.zoom_in_rate);
            limits.zoom_in_rate = defaults.zoom_in_rate;
        }
        if !(limits.zoom_out_rate.is_finite() && limits.zoom_out_rate > 1.0) {
            warn!("Invalid zoom_out_rate {}, using default", limits.zoom_out_rate);
            limits.zoom_out_rate = defaults.zoom_out_rate;
        }
        limits
    }

    /// Clamp factor to valid range, handling NaN/Inf
    #[must_use]
    pub fn clamp(&self, factor: f64) -> f64 {
        if !factor.is_finite() {
            1.0_f64.clamp(self.min_scale, self.max_scale)
        } else {
            factor.clamp(self.min_scale, self.max_scale)
        }
    }
}

/// Commands that modify viewport state
#[derive(Clone, Debug, PartialEq)]
pub enum ViewportCommand {
    ZoomIn,
    ZoomOut,
    SetScale(f64),
    RotateClockwise,
    RotateCounterClockwise,
    SetRotation(Rotation),
    /// Go to a specific page (0-indexed)
    GoToPage(usize),
    NextPage,
    PrevPage,
    SetPageCount(usize),
    /// Intrinsic size of a page, reported by the rendering adapter
    SetPageSize {
        page: usize,
        width: f64,
        height: f64,
    },
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// The viewport was replaced; anything captured under an older
    /// generation is stale
    ViewportReplaced(ViewportGeneration),
    /// Render the current page with the new scale/rotation
    RenderCurrentPage,
    /// Fetch the text layer of a page
    LoadTextLayer(usize),
    /// Update prefetch queue
    UpdatePrefetch,
}

#[derive(Clone, Debug)]
pub struct ViewportState {
    scale: f64,
    rotation: Rotation,
    current_page: usize,
    page_count: usize,
    page_sizes: HashMap<usize, (f64, f64)>,
    limits: ZoomLimits,
    generation: ViewportGeneration,
    viewport: Option<Viewport>,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(ZoomLimits::default())
    }
}

impl ViewportState {
    #[must_use]
    pub fn new(limits: ZoomLimits) -> Self {
        let limits = limits.sanitized();
        Self {
            scale: limits.clamp(1.0),
            rotation: Rotation::R0,
            current_page: 0,
            page_count: 0,
            page_sizes: HashMap::new(),
            limits,
            generation: ViewportGeneration::default(),
            viewport: None,
        }
    }

    /// The viewport in effect, once the current page's size is known
    #[must_use]
    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    #[must_use]
    pub fn generation(&self) -> ViewportGeneration {
        self.generation
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
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: ViewportCommand) -> Vec<Effect> {
        match cmd {
            ViewportCommand::ZoomIn => self.set_scale(self.scale * self.limits.zoom_in_rate),
            ViewportCommand::ZoomOut => self.set_scale(self.scale / self.limits.zoom_out_rate),
            ViewportCommand::SetScale(scale) => self.set_scale(scale),

            ViewportCommand::RotateClockwise => self.set_rotation(self.rotation.clockwise()),
            ViewportCommand::RotateCounterClockwise => {
                self.set_rotation(self.rotation.counter_clockwise())
            }
            ViewportCommand::SetRotation(rotation) => self.set_rotation(rotation),

            ViewportCommand::GoToPage(page) => self.go_to_page(page),
            ViewportCommand::NextPage => self.go_to_page(self.current_page.saturating_add(1)),
            ViewportCommand::PrevPage => self.go_to_page(self.current_page.saturating_sub(1)),

            ViewportCommand::SetPageCount(count) => {
                self.page_count = count;
                if self.current_page >= count && count > 0 {
                    self.change_page(count - 1)
                } else {
                    vec![]
                }
            }

            ViewportCommand::SetPageSize {
                page,
                width,
                height,
            } => {
                let valid = |v: f64| v.is_finite() && v > 0.0;
                if !valid(width) || !valid(height) {
                    warn!("Ignoring invalid size {width}x{height} for page {page}");
                    return vec![];
                }
                let previous = self.page_sizes.insert(page, (width, height));
                if page == self.current_page && previous != Some((width, height)) {
                    vec![Effect::ViewportReplaced(self.rebuild())]
                } else {
                    vec![]
                }
            }
        }
    }

    fn set_scale(&mut self, scale: f64) -> Vec<Effect> {
        let clamped = self.limits.clamp(scale);
        if (self.scale - clamped).abs() > f64::EPSILON {
            self.scale = clamped;
            vec![
                Effect::ViewportReplaced(self.rebuild()),
                Effect::RenderCurrentPage,
                Effect::UpdatePrefetch,
            ]
        } else {
            vec![]
        }
    }

    fn set_rotation(&mut self, rotation: Rotation) -> Vec<Effect> {
        if self.rotation != rotation {
            self.rotation = rotation;
            vec![
                Effect::ViewportReplaced(self.rebuild()),
                Effect::RenderCurrentPage,
                Effect::UpdatePrefetch,
            ]
        } else {
            vec![]
        }
    }

    fn go_to_page(&mut self, page: usize) -> Vec<Effect> {
        let clamped = page.min(self.page_count.saturating_sub(1));
        if self.current_page != clamped {
            self.change_page(clamped)
        } else {
            vec![]
        }
    }

    fn change_page(&mut self, page: usize) -> Vec<Effect> {
        self.current_page = page;
        vec![
            Effect::ViewportReplaced(self.rebuild()),
            Effect::RenderCurrentPage,
            Effect::LoadTextLayer(page),
            Effect::UpdatePrefetch,
        ]
    }

    fn rebuild(&mut self) -> ViewportGeneration {
        self.generation = self.generation.next();
        self.viewport = self
            .page_sizes
            .get(&self.current_page)
            .and_then(|&(w, h)| Viewport::new(self.scale, self.rotation, w, h).ok());
        debug!(
            "Viewport {:?}: page {} scale {:.3} rotation {} size known: {}",
            self.generation,
            self.current_page,
            self.scale,
            self.rotation,
            self.viewport.is_some()
        );
        self.generation
    }
}
