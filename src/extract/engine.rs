//! Region-to-field extraction engine
//!
//! Glues the viewport, the selection tracker, the containment query and the
//! binder together. Everything here runs synchronously on the caller's
//! thread; the only asynchronous input is the text layer, which arrives
//! through [`ExtractionEngine::deliver_text_layer`] whenever the rendering
//! side has it.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::render::RenderError;

use super::binder::{ExtractionStatus, FieldBinder, FieldKey, FieldRegistry};
use super::containment::find_contained_text;
use super::geometry::TextRun;
use super::mapper::map_to_page_space;
use super::selection::{Commit, SelectionEvent, SelectionTracker, Transition};
use super::viewport::{Effect, ViewportCommand, ViewportState, ZoomLimits};

/// Text layer of the current page, replaced wholesale on page change
#[derive(Clone, Debug)]
enum PageTextLayer {
    Ready { page: usize, runs: Arc<[TextRun]> },
    /// The adapter could not produce runs; selections bind as empty
    Failed { page: usize },
}

impl PageTextLayer {
    fn page(&self) -> usize {
        match self {
            PageTextLayer::Ready { page, .. } | PageTextLayer::Failed { page } => *page,
        }
    }
}

#[derive(Debug)]
pub struct ExtractionEngine {
    viewport: ViewportState,
    tracker: SelectionTracker,
    binder: FieldBinder,
    text_layer: Option<PageTextLayer>,
}

impl Default for ExtractionEngine {
    fn default() -> Self {
        Self::new(ZoomLimits::default())
    }
}

impl ExtractionEngine {
    #[must_use]
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            viewport: ViewportState::new(limits),
            tracker: SelectionTracker::new(),
            binder: FieldBinder::new(),
            text_layer: None,
        }
    }

    #[must_use]
    pub fn viewport_state(&self) -> &ViewportState {
        &self.viewport
    }

    #[must_use]
    pub fn status(&self) -> ExtractionStatus {
        self.binder.status()
    }

    #[must_use]
    pub fn armed_field(&self) -> Option<&FieldKey> {
        self.tracker.armed()
    }

    /// True once the current page's text layer (or its failure) has arrived
    #[must_use]
    pub fn has_text_layer(&self) -> bool {
        self.text_layer
            .as_ref()
            .is_some_and(|layer| layer.page() == self.viewport.current_page())
    }

    /// Whether a committed selection is waiting for the text layer
    #[must_use]
    pub fn has_pending_commit(&self) -> bool {
        self.tracker.pending_commit().is_some()
    }

    /// Make `field` the write target of the next selection. Its status
    /// starts over at idle.
    pub fn arm_field(&mut self, field: FieldKey, registry: &mut dyn FieldRegistry) {
        debug!("Arming field {field}");
        let transition = self.tracker.arm(field.clone());
        self.on_abort(transition, registry);
        self.binder.reset(&field, registry);
    }

    pub fn disarm_field(&mut self, registry: &mut dyn FieldRegistry) {
        let transition = self.tracker.disarm();
        self.on_abort(transition, registry);
    }

    /// Apply a viewport command. Any selection in flight is discarded when
    /// the viewport is replaced; a page change also drops the text layer.
    pub fn apply_command(
        &mut self,
        cmd: ViewportCommand,
        registry: &mut dyn FieldRegistry,
    ) -> Vec<Effect> {
        let page_before = self.viewport.current_page();
        let effects = self.viewport.apply(cmd);

        if effects
            .iter()
            .any(|effect| matches!(effect, Effect::ViewportReplaced(_)))
        {
            let transition = self
                .tracker
                .handle(SelectionEvent::ViewportChanged, self.viewport.generation());
            self.on_abort(transition, registry);
        }

        if self.viewport.current_page() != page_before {
            debug!(
                "Page {} -> {}, dropping text layer",
                page_before,
                self.viewport.current_page()
            );
            self.text_layer = None;
        }

        effects
    }

    /// Install the text layer for `page`.
    ///
    /// Layers for any page other than the current one are stale and
    /// dropped. A failed or malformed layer is logged and kept as a failure
    /// so selections on the page bind as empty.
    pub fn deliver_text_layer(
        &mut self,
        page: usize,
        runs: Result<Vec<TextRun>, RenderError>,
        registry: &mut dyn FieldRegistry,
    ) {
        if page != self.viewport.current_page() {
            debug!(
                "Dropping text layer for page {page}, current page is {}",
                self.viewport.current_page()
            );
            return;
        }

        let layer = match runs {
            Ok(runs) if runs.iter().all(TextRun::is_well_formed) => {
                info!("Text layer for page {page}: {} runs", runs.len());
                PageTextLayer::Ready {
                    page,
                    runs: Arc::from(runs),
                }
            }
            Ok(_) => {
                warn!("Text layer for page {page} has malformed runs");
                PageTextLayer::Failed { page }
            }
            Err(e) => {
                warn!("Text layer for page {page} failed: {e}");
                PageTextLayer::Failed { page }
            }
        };
        self.text_layer = Some(layer);

        self.resolve_pending(registry);
    }

    /// Feed a pointer event.
    ///
    /// Pointer-down is ignored until the current page's size is known,
    /// since there is no viewport to map against yet.
    pub fn handle_pointer(
        &mut self,
        event: SelectionEvent,
        registry: &mut dyn FieldRegistry,
    ) -> Transition {
        if matches!(event, SelectionEvent::Down(_)) && self.viewport.viewport().is_none() {
            debug!("Pointer down before page size is known, ignoring");
            return Transition::Ignored;
        }

        let transition = self.tracker.handle(event, self.viewport.generation());
        match &transition {
            Transition::Started { field } => self.binder.begin_drawing(field, registry),
            Transition::Committed(_) => self.resolve_pending(registry),
            Transition::Aborted { field } => self.binder.abort(field, registry),
            Transition::Ignored | Transition::Resized(_) => {}
        }
        transition
    }

    fn on_abort(&mut self, transition: Transition, registry: &mut dyn FieldRegistry) {
        if let Transition::Aborted { field } = transition {
            self.binder.abort(&field, registry);
        }
    }

    fn resolve_pending(&mut self, registry: &mut dyn FieldRegistry) {
        let Some(commit) = self.tracker.pending_commit().cloned() else {
            return;
        };

        if commit.generation != self.viewport.generation() {
            let transition = self
                .tracker
                .handle(SelectionEvent::ViewportChanged, self.viewport.generation());
            self.on_abort(transition, registry);
            return;
        }

        let extracted = if commit.rect.is_empty() {
            debug!("Zero-area selection, skipping text query");
            String::new()
        } else {
            match self.extract(&commit) {
                Some(text) => text,
                None => {
                    debug!("Commit waiting for text layer of page {}", self.viewport.current_page());
                    return;
                }
            }
        };

        let armed = self.tracker.armed().filter(|field| **field == commit.field);
        let status = self.binder.bind(armed, &extracted, registry);
        debug!("Bound {:?} to {}: {status:?}", extracted, commit.field);
        self.tracker.finish();
    }

    /// Text under a committed rectangle, or `None` while the layer is
    /// still loading
    fn extract(&self, commit: &Commit) -> Option<String> {
        let current = self.viewport.current_page();
        match self.text_layer.as_ref() {
            Some(PageTextLayer::Ready { page, runs }) if *page == current => {
                let Some(viewport) = self.viewport.viewport() else {
                    return Some(String::new());
                };
                let rect = map_to_page_space(&commit.rect, viewport);
                Some(find_contained_text(&rect, runs))
            }
            Some(PageTextLayer::Failed { page }) if *page == current => Some(String::new()),
            _ => None,
        }
    }
}
