use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use involens::extract::{
    ExtractionEngine, ExtractionStatus, FieldKey, Point, Rotation, SelectionEvent, TextRun,
    Viewport, ViewportCommand, ViewportState,
};
use involens::form::InvoiceForm;
use involens::render::{
    ImageData, PageRenderer, PageSize, RenderError, RenderResponse, RenderService, ServiceConfig,
};

/// Two-page in-memory document. Page 1 has a broken text layer.
#[derive(Clone, Default)]
struct TwoPageRenderer {
    renders: Arc<AtomicUsize>,
}

impl PageRenderer for TwoPageRenderer {
    type Document = ();
    type Page = usize;

    fn load_document(&self, bytes: &[u8]) -> Result<Self::Document, RenderError> {
        if bytes.starts_with(b"%PDF") {
            Ok(())
        } else {
            Err(RenderError::Load("missing header".to_string()))
        }
    }

    fn page_count(&self, _doc: &Self::Document) -> Result<usize, RenderError> {
        Ok(2)
    }

    fn get_page(&self, _doc: &Self::Document, page: usize) -> Result<Self::Page, RenderError> {
        if page < 2 {
            Ok(page)
        } else {
            Err(RenderError::PageOutOfRange {
                page,
                page_count: 2,
            })
        }
    }

    fn get_viewport(
        &self,
        _page: &Self::Page,
        scale: f64,
        rotation: Rotation,
    ) -> Result<PageSize, RenderError> {
        let (w, h) = Viewport::new(scale, rotation, 600.0, 800.0)?.device_size();
        Ok(PageSize::new(w, h))
    }

    fn render(&self, _page: &Self::Page, viewport: &Viewport) -> Result<ImageData, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let (w, h) = viewport.device_size();
        let (width_px, height_px) = (w.round() as u32, h.round() as u32);
        Ok(ImageData {
            pixels: vec![0xFF; (width_px * height_px * 3) as usize],
            width_px,
            height_px,
        })
    }

    fn get_text_runs(&self, page: &Self::Page) -> Result<Vec<TextRun>, RenderError> {
        match page {
            0 => Ok(vec![TextRun::new(100.0, 100.0, 200.0, 120.0, "INV-2024-001")]),
            _ => Err(RenderError::generic("text extraction failed")),
        }
    }
}

fn open(renderer: TwoPageRenderer) -> RenderService {
    RenderService::new(
        renderer,
        Arc::from(&b"%PDF-1.7"[..]),
        ServiceConfig {
            workers: 2,
            cache_size: 8,
            prefetch_radius: 1,
        },
    )
    .unwrap()
}

fn next_response(service: &mut RenderService) -> RenderResponse {
    service
        .wait_response(Duration::from_secs(5))
        .expect("renderer did not answer in time")
}

#[test]
fn test_bad_document_is_reported_on_open() {
    let result = RenderService::new(
        TwoPageRenderer::default(),
        Arc::from(&b"GIF89a"[..]),
        ServiceConfig::default(),
    );
    assert!(matches!(result, Err(RenderError::Load(_))));
}

#[test]
fn test_document_info_lists_pages() {
    let service = open(TwoPageRenderer::default());
    let info = service.document_info();
    assert_eq!(info.page_count, 2);
    assert_eq!(info.page_sizes, vec![PageSize::new(600.0, 800.0); 2]);
}

#[test]
fn test_cached_page_is_not_rendered_twice() {
    let renderer = TwoPageRenderer::default();
    let renders = Arc::clone(&renderer.renders);
    let mut service = open(renderer);

    service.request_page(0);
    loop {
        if let RenderResponse::Page { page: 0, .. } = next_response(&mut service) {
            break;
        }
    }

    assert!(service.request_page_if_needed(0).is_none());
    service.request_page(0);
    loop {
        if let RenderResponse::Page { page: 0, data, .. } = next_response(&mut service) {
            assert_eq!(data.text_runs.len(), 1);
            break;
        }
    }
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[test]
fn test_out_of_range_page_errors() {
    let mut service = open(TwoPageRenderer::default());
    let id = service.request_page(7);
    loop {
        if let RenderResponse::Error { id: got, error } = next_response(&mut service) {
            assert_eq!(got, id);
            assert!(matches!(error, RenderError::PageOutOfRange { page: 7, .. }));
            break;
        }
    }
    assert_eq!(service.pending_count(), 0);
}

#[test]
fn test_cancelled_request_never_delivers_its_result() {
    let mut service = open(TwoPageRenderer::default());
    let id = service.request_text_runs(0);
    service.cancel(id);

    let mut cancelled = 0;
    while service.pending_count() > 0 {
        match next_response(&mut service) {
            RenderResponse::Cancelled(got) => {
                assert_eq!(got, id);
                cancelled += 1;
            }
            other => panic!("result of a cancelled request was delivered: {other:?}"),
        }
    }
    assert_eq!(cancelled, 1);
    assert!(service.wait_response(Duration::from_millis(200)).is_none());
}

#[test]
fn test_cancel_after_completion_is_ignored() {
    let mut service = open(TwoPageRenderer::default());
    let id = service.request_text_runs(0);
    let runs = loop {
        if let RenderResponse::TextRuns { id: got, runs, .. } = next_response(&mut service) {
            assert_eq!(got, id);
            break runs;
        }
    };
    assert_eq!(runs.unwrap().len(), 1);

    service.cancel(id);
    assert!(service.wait_response(Duration::from_millis(200)).is_none());
}

#[test]
fn test_page_change_cancels_stale_text_layer() {
    let mut service = open(TwoPageRenderer::default());
    let mut state = ViewportState::default();
    let _ = state.apply(ViewportCommand::SetPageCount(2));
    let stale = service.request_text_runs(0);

    let effects = state.apply(ViewportCommand::GoToPage(1));
    service.execute_effects(&effects, &state);

    let mut stale_cancelled = false;
    let mut current_layer = false;
    while service.pending_count() > 0 {
        match next_response(&mut service) {
            RenderResponse::Cancelled(id) => stale_cancelled |= id == stale,
            RenderResponse::TextRuns { page, .. } => {
                assert_eq!(page, 1, "text layer of a page no longer shown arrived");
                current_layer = true;
            }
            _ => {}
        }
    }
    assert!(stale_cancelled);
    assert!(current_layer);
}

/// Drive the engine from service responses the way a viewer would
fn run_extraction(page: usize, field: &str) -> (InvoiceForm, ExtractionStatus) {
    let mut service = open(TwoPageRenderer::default());
    let mut engine = ExtractionEngine::default();
    let mut form = InvoiceForm::new();

    let info = service.document_info().clone();
    let mut commands = vec![ViewportCommand::SetPageCount(info.page_count)];
    for (idx, size) in info.page_sizes.iter().enumerate() {
        commands.push(ViewportCommand::SetPageSize {
            page: idx,
            width: size.width,
            height: size.height,
        });
    }
    commands.push(ViewportCommand::GoToPage(page));
    for cmd in commands {
        let effects = engine.apply_command(cmd, &mut form);
        service.execute_effects(&effects, engine.viewport_state());
    }
    if page == 0 {
        service.request_text_runs(0);
    }

    engine.arm_field(FieldKey::from(field), &mut form);
    let _ = engine.handle_pointer(SelectionEvent::Down(Point::new(100.0, 680.0)), &mut form);
    let _ = engine.handle_pointer(SelectionEvent::Up(Point::new(210.0, 710.0)), &mut form);

    while engine.has_pending_commit() {
        if let RenderResponse::TextRuns { page, runs, .. } = next_response(&mut service) {
            engine.deliver_text_layer(page, runs, &mut form);
        }
    }
    let status = engine.status();
    (form, status)
}

#[test]
fn test_end_to_end_extraction_through_workers() {
    let (form, status) = run_extraction(0, "invoice_number");
    assert_eq!(status, ExtractionStatus::Matched);
    assert_eq!(
        form.value(&FieldKey::from("invoice_number")),
        Some("INV-2024-001")
    );
}

#[test]
fn test_failed_text_layer_binds_empty() {
    let (form, status) = run_extraction(1, "invoice_number");
    assert_eq!(status, ExtractionStatus::Empty);
    assert_eq!(form.value(&FieldKey::from("invoice_number")), None);
}
