//! Render service - manages worker pool and cache

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::{debug, info};

use crate::extract::{Effect, ViewportState};

use super::adapter::{PageRenderer, load_document_info};
use super::cache::{CacheKey, PageCache};
use super::request::{RenderError, RenderParams, RenderRequest, RenderResponse, RequestId};
use super::types::DocumentInfo;
use super::worker::render_worker;

/// Worker pool sizing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub workers: usize,
    pub cache_size: usize,
    pub prefetch_radius: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            cache_size: 16,
            prefetch_radius: 1,
        }
    }
}

#[derive(Debug)]
enum PendingRequest {
    Page(usize),
    Prefetch(usize),
    TextRuns(usize),
}

/// Manages page rendering with worker threads and caching
pub struct RenderService {
    params: RenderParams,
    current_page: usize,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    pending_requests: HashMap<RequestId, PendingRequest>,
    cache: Arc<Mutex<PageCache>>,
    num_workers: usize,
    prefetch_radius: usize,
    prefetch_in_flight: HashSet<usize>,
    cancelled: Arc<Mutex<HashSet<RequestId>>>,
    doc_info: DocumentInfo,
}

impl RenderService {
    /// Open `doc_bytes` with `renderer` and spawn the worker pool.
    ///
    /// The document is loaded once on the calling thread to read its page
    /// count and sizes; a document that fails here never reaches a worker.
    pub fn new<R>(
        renderer: R,
        doc_bytes: Arc<[u8]>,
        config: ServiceConfig,
    ) -> Result<Self, RenderError>
    where
        R: PageRenderer + Clone + Send + 'static,
    {
        let doc = renderer.load_document(&doc_bytes)?;
        let doc_info = load_document_info(&renderer, &doc)?;
        drop(doc);
        info!(
            "Loaded document: {} pages, {} workers",
            doc_info.page_count,
            config.workers.max(1)
        );

        let cache = Arc::new(Mutex::new(PageCache::new(config.cache_size)));
        let cancelled = Arc::new(Mutex::new(HashSet::new()));

        // Flume gives us MPMC channels: every worker clones the request
        // receiver and pulls from the shared queue.
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        for _ in 0..config.workers.max(1) {
            let renderer = renderer.clone();
            let bytes = Arc::clone(&doc_bytes);
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let cache_clone = cache.clone();
            let cancelled_clone = cancelled.clone();

            std::thread::spawn(move || {
                render_worker(renderer, bytes, rx, tx, cache_clone, cancelled_clone);
            });
        }

        Ok(Self {
            params: RenderParams::default(),
            current_page: 0,
            request_tx,
            response_rx,
            next_request_id: 1,
            pending_requests: HashMap::new(),
            cache,
            num_workers: config.workers.max(1),
            prefetch_radius: config.prefetch_radius,
            prefetch_in_flight: HashSet::new(),
            cancelled,
            doc_info,
        })
    }

    /// Get document metadata
    #[must_use]
    pub fn document_info(&self) -> &DocumentInfo {
        &self.doc_info
    }

    #[must_use]
    pub fn params(&self) -> RenderParams {
        self.params
    }

    /// Carry out the effects of a viewport command.
    ///
    /// Scale and rotation are picked up from `state` so renders always use
    /// the viewport that produced the effects.
    pub fn execute_effects(&mut self, effects: &[Effect], state: &ViewportState) {
        let params = RenderParams {
            scale: state.scale(),
            rotation: state.rotation(),
        };
        if params != self.params {
            // Old keys stay valid for their own params; a stale prefetch
            // set would only suppress renders we now need.
            self.prefetch_in_flight.clear();
            self.params = params;
        }
        self.current_page = state.current_page();

        for effect in effects {
            match effect {
                Effect::ViewportReplaced(_) => {}
                Effect::RenderCurrentPage => {
                    let _ = self.request_page_if_needed(self.current_page);
                }
                Effect::LoadTextLayer(page) => {
                    self.cancel_text_runs_except(*page);
                    self.request_text_runs(*page);
                }
                Effect::UpdatePrefetch => {
                    self.schedule_prefetch();
                }
            }
        }
    }

    /// Request a page to be rendered
    pub fn request_page(&mut self, page: usize) -> RequestId {
        let id = self.next_id();
        let params = self.params;

        let _ = self
            .request_tx
            .send(RenderRequest::Page { id, page, params });
        self.pending_requests.insert(id, PendingRequest::Page(page));
        self.prefetch_in_flight.remove(&page);

        id
    }

    /// Request a page only if it is not cached or already in flight.
    pub fn request_page_if_needed(&mut self, page: usize) -> Option<RequestId> {
        if self.is_page_cached(page) || self.is_page_in_flight(page) {
            return None;
        }

        Some(self.request_page(page))
    }

    /// Request the text runs of a page
    pub fn request_text_runs(&mut self, page: usize) -> RequestId {
        let id = self.next_id();

        let _ = self.request_tx.send(RenderRequest::TextRuns { id, page });
        self.pending_requests
            .insert(id, PendingRequest::TextRuns(page));

        id
    }

    /// Drop a pending request.
    ///
    /// The caller receives `Cancelled(id)` in place of the result, whether
    /// or not a worker had already started on it. Unknown or completed ids
    /// are ignored.
    pub fn cancel(&mut self, id: RequestId) {
        if self.pending_requests.contains_key(&id) {
            self.cancelled_ids().insert(id);
        }
    }

    /// Text layers of pages other than `page` are no longer wanted
    fn cancel_text_runs_except(&mut self, page: usize) {
        let stale: Vec<RequestId> = self
            .pending_requests
            .iter()
            .filter_map(|(id, request)| match request {
                PendingRequest::TextRuns(p) if *p != page => Some(*id),
                _ => None,
            })
            .collect();
        for id in stale {
            debug!("Cancelling stale text runs request {id:?}");
            self.cancel(id);
        }
    }

    fn cancelled_ids(&self) -> std::sync::MutexGuard<'_, HashSet<RequestId>> {
        self.cancelled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn prefetch_page(&mut self, page: usize) -> RequestId {
        let id = self.next_id();
        let params = self.params;

        let _ = self
            .request_tx
            .send(RenderRequest::Prefetch { id, page, params });
        self.pending_requests
            .insert(id, PendingRequest::Prefetch(page));
        self.prefetch_in_flight.insert(page);

        id
    }

    fn schedule_prefetch(&mut self) {
        let current = self.current_page;
        let page_count = self.doc_info.page_count;

        if page_count == 0 {
            return;
        }

        for offset in 1..=self.prefetch_radius {
            if current + offset < page_count {
                self.maybe_prefetch(current + offset);
            }
            if current >= offset {
                self.maybe_prefetch(current - offset);
            }
        }
    }

    fn maybe_prefetch(&mut self, page: usize) {
        if self.is_page_in_flight(page) || self.is_page_cached(page) {
            return;
        }
        debug!("Prefetching page {page}");
        self.prefetch_page(page);
    }

    fn is_page_in_flight(&self, page: usize) -> bool {
        if self.prefetch_in_flight.contains(&page) {
            return true;
        }

        self.pending_requests.values().any(|request| match request {
            PendingRequest::Page(p) | PendingRequest::Prefetch(p) => *p == page,
            PendingRequest::TextRuns(_) => false,
        })
    }

    /// Poll for completed render responses
    pub fn poll_responses(&mut self) -> Vec<RenderResponse> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            responses.push(self.track(response));
        }

        responses
    }

    /// Block until the next response arrives or `timeout` passes
    pub fn wait_response(&mut self, timeout: std::time::Duration) -> Option<RenderResponse> {
        let response = self.response_rx.recv_timeout(timeout).ok()?;
        Some(self.track(response))
    }

    /// Update bookkeeping for a response, replacing the result of a
    /// cancelled request with `Cancelled`
    fn track(&mut self, response: RenderResponse) -> RenderResponse {
        let response = match response {
            RenderResponse::Page { id, .. }
            | RenderResponse::TextRuns { id, .. }
            | RenderResponse::Error { id, .. }
                if self.cancelled_ids().remove(&id) =>
            {
                RenderResponse::Cancelled(id)
            }
            other => other,
        };

        match &response {
            RenderResponse::Page { id, page, .. } => {
                self.pending_requests.remove(id);
                self.prefetch_in_flight.remove(page);
            }
            RenderResponse::TextRuns { id, .. } => {
                self.pending_requests.remove(id);
            }
            RenderResponse::Cancelled(id) | RenderResponse::Error { id, .. } => {
                if let Some(PendingRequest::Page(page) | PendingRequest::Prefetch(page)) =
                    self.pending_requests.remove(id)
                {
                    self.prefetch_in_flight.remove(&page);
                }
            }
        }
        response
    }

    /// Number of requests still waiting for a response
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_requests.len()
    }

    /// Check if a page is cached
    #[must_use]
    pub fn is_page_cached(&self, page: usize) -> bool {
        let key = CacheKey::from_params(page, &self.params);
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(&key)
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(RenderRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::super::adapter::fake::FakeRenderer;
    use super::*;
    use crate::extract::{TextRun, ViewportCommand};

    const WAIT: Duration = Duration::from_secs(5);

    fn service(runs: Vec<TextRun>) -> RenderService {
        RenderService::new(
            FakeRenderer::letter(runs),
            Arc::from(&b"%PDF"[..]),
            ServiceConfig {
                workers: 1,
                cache_size: 4,
                prefetch_radius: 1,
            },
        )
        .unwrap()
    }

    fn wait_until(service: &mut RenderService, mut done: impl FnMut(&RenderResponse) -> bool) {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if let Some(response) = service.wait_response(Duration::from_millis(50)) {
                if done(&response) {
                    return;
                }
            }
        }
        panic!("timed out waiting for render response");
    }

    #[test]
    fn broken_document_fails_to_open() {
        let result = RenderService::new(
            FakeRenderer::letter(vec![]),
            Arc::from(&b"broken"[..]),
            ServiceConfig::default(),
        );
        assert!(matches!(result, Err(RenderError::Load(_))));
    }

    #[test]
    fn document_info_is_available_immediately() {
        let service = service(vec![]);
        assert_eq!(service.document_info().page_count, 1);
    }

    #[test]
    fn rendered_page_lands_in_cache() {
        let mut service = service(vec![]);
        let id = service.request_page(0);
        wait_until(&mut service, |r| matches!(r, RenderResponse::Page { id: got, .. } if *got == id));

        assert!(service.is_page_cached(0));
        assert_eq!(service.pending_count(), 0);
        assert!(service.request_page_if_needed(0).is_none());
    }

    #[test]
    fn text_layer_effect_fetches_runs() {
        let mut service = service(vec![TextRun::new(1.0, 1.0, 2.0, 2.0, "x")]);
        let mut state = ViewportState::default();
        let _ = state.apply(ViewportCommand::SetPageCount(1));

        service.execute_effects(&[Effect::LoadTextLayer(0)], &state);
        wait_until(&mut service, |r| {
            matches!(r, RenderResponse::TextRuns { page: 0, runs: Ok(runs), .. } if runs.len() == 1)
        });
    }

    #[test]
    fn effects_pick_up_new_scale_and_rotation() {
        let mut service = service(vec![]);
        let mut state = ViewportState::default();
        let _ = state.apply(ViewportCommand::SetPageCount(1));
        let effects = state.apply(ViewportCommand::RotateClockwise);

        service.execute_effects(&effects, &state);
        assert_eq!(service.params().rotation, crate::extract::Rotation::R90);
        wait_until(&mut service, |r| match r {
            RenderResponse::Page { data, .. } => {
                data.img_data.width_px == 792 && data.img_data.height_px == 612
            }
            _ => false,
        });
    }
}
