//! Render worker - runs in separate thread(s)

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::adapter::{PageRenderer, load_text_runs, render_page};
use super::cache::{CacheKey, PageCache};
use super::request::{RenderParams, RenderRequest, RenderResponse, RequestId};

/// Main worker function - runs in a dedicated thread.
///
/// Each worker opens its own copy of the document from the shared bytes,
/// so the renderer's document type never has to cross threads.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker<R: PageRenderer>(
    renderer: R,
    doc_bytes: Arc<[u8]>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    cache: Arc<Mutex<PageCache>>,
    cancelled: Arc<Mutex<HashSet<RequestId>>>,
) {
    let doc = match renderer.load_document(&doc_bytes) {
        Ok(d) => d,
        Err(e) => {
            warn!("Render worker could not open document: {e}");
            let _ = responses.send(RenderResponse::Error {
                id: RequestId::new(0),
                error: e,
            });
            return;
        }
    };

    for request in requests {
        match request {
            RenderRequest::Page { id, .. }
            | RenderRequest::Prefetch { id, .. }
            | RenderRequest::TextRuns { id, .. }
                if take_cancelled(&cancelled, id) =>
            {
                debug!("Skipping cancelled request {id:?}");
                let _ = responses.send(RenderResponse::Cancelled(id));
            }

            RenderRequest::Page { id, page, params }
            | RenderRequest::Prefetch { id, page, params } => {
                handle_page_request(&renderer, &doc, id, page, &params, &cache, &responses);
            }

            RenderRequest::TextRuns { id, page } => {
                let runs = load_text_runs(&renderer, &doc, page);
                let _ = responses.send(RenderResponse::TextRuns { id, page, runs });
            }

            RenderRequest::Shutdown => break,
        }
    }
    debug!("Render worker exiting");
}

fn take_cancelled(cancelled: &Mutex<HashSet<RequestId>>, id: RequestId) -> bool {
    cancelled
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .remove(&id)
}

fn handle_page_request<R: PageRenderer>(
    renderer: &R,
    doc: &R::Document,
    id: RequestId,
    page_num: usize,
    params: &RenderParams,
    cache: &Arc<Mutex<PageCache>>,
    responses: &Sender<RenderResponse>,
) {
    let key = CacheKey::from_params(page_num, params);

    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(cached) = cached {
        let _ = responses.send(RenderResponse::Page {
            id,
            page: page_num,
            data: cached,
        });
        return;
    }

    match render_page(renderer, doc, page_num, params) {
        Ok(data) => {
            let cached = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, data);
            let _ = responses.send(RenderResponse::Page {
                id,
                page: page_num,
                data: cached,
            });
        }
        Err(e) => {
            let _ = responses.send(RenderResponse::Error { id, error: e });
        }
    }
}
