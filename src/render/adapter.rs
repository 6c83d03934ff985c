//! Page rendering adapter contract
//!
//! The engine never talks to a document library directly. Anything that
//! can open a document, size a page under a scale and rotation, rasterize
//! it and report its text runs in page space can back the viewer.

use std::sync::Arc;

use log::debug;

use crate::extract::{Rotation, TextRun, Viewport};

use super::request::{RenderError, RenderParams};
use super::types::{DocumentInfo, ImageData, PageData, PageSize};

pub trait PageRenderer {
    type Document;
    type Page;

    fn load_document(&self, bytes: &[u8]) -> Result<Self::Document, RenderError>;

    fn page_count(&self, doc: &Self::Document) -> Result<usize, RenderError>;

    /// Load a page by 0-based index
    fn get_page(&self, doc: &Self::Document, page: usize) -> Result<Self::Page, RenderError>;

    /// Size of the rendered bitmap for `page` under `scale` and `rotation`
    fn get_viewport(
        &self,
        page: &Self::Page,
        scale: f64,
        rotation: Rotation,
    ) -> Result<PageSize, RenderError>;

    /// Rasterize `page` under `viewport`
    fn render(&self, page: &Self::Page, viewport: &Viewport) -> Result<ImageData, RenderError>;

    /// Text runs of `page` in page space, in reading order
    fn get_text_runs(&self, page: &Self::Page) -> Result<Vec<TextRun>, RenderError>;
}

/// Intrinsic size of a page: its viewport at scale 1 without rotation
pub fn page_size<R: PageRenderer>(renderer: &R, page: &R::Page) -> Result<PageSize, RenderError> {
    renderer.get_viewport(page, 1.0, Rotation::R0)
}

/// Page count and every page's intrinsic size
pub fn load_document_info<R: PageRenderer>(
    renderer: &R,
    doc: &R::Document,
) -> Result<DocumentInfo, RenderError> {
    let page_count = renderer.page_count(doc)?;
    let page_sizes = (0..page_count)
        .map(|idx| {
            let page = renderer.get_page(doc, idx)?;
            page_size(renderer, &page)
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!("Document has {page_count} pages");
    Ok(DocumentInfo {
        page_count,
        page_sizes,
    })
}

/// Fetch the text runs of a page and reject geometry the engine cannot use
pub fn load_text_runs<R: PageRenderer>(
    renderer: &R,
    doc: &R::Document,
    page_num: usize,
) -> Result<Vec<TextRun>, RenderError> {
    let page = renderer.get_page(doc, page_num)?;
    let runs = renderer.get_text_runs(&page)?;
    validate_runs(page_num, &runs)?;
    Ok(runs)
}

/// Render a single page together with its text layer
pub fn render_page<R: PageRenderer>(
    renderer: &R,
    doc: &R::Document,
    page_num: usize,
    params: &RenderParams,
) -> Result<PageData, RenderError> {
    let page = renderer.get_page(doc, page_num)?;
    let size = page_size(renderer, &page)?;
    let viewport = Viewport::new(params.scale, params.rotation, size.width, size.height)?;

    let img_data = renderer.render(&page, &viewport)?;
    let text_runs = renderer.get_text_runs(&page)?;
    validate_runs(page_num, &text_runs)?;

    Ok(PageData {
        img_data,
        page_num,
        params: *params,
        page_size: size,
        text_runs: Arc::from(text_runs),
    })
}

pub(crate) fn validate_runs(page: usize, runs: &[TextRun]) -> Result<(), RenderError> {
    match runs.iter().position(|run| !run.is_well_formed()) {
        Some(idx) => Err(RenderError::MalformedTextLayer {
            page,
            detail: format!("run {idx} has an invalid bounding box"),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory renderer for tests

    use super::*;

    /// One fake page: intrinsic size plus its runs
    #[derive(Clone, Debug)]
    pub struct FakePage {
        pub size: PageSize,
        pub runs: Vec<TextRun>,
    }

    /// Renderer over a fixed set of pages. The document bytes are ignored
    /// unless they equal `b"broken"`, which fails to load.
    #[derive(Clone, Debug, Default)]
    pub struct FakeRenderer {
        pub pages: Vec<FakePage>,
    }

    impl FakeRenderer {
        pub fn letter(runs: Vec<TextRun>) -> Self {
            Self {
                pages: vec![FakePage {
                    size: PageSize::new(612.0, 792.0),
                    runs,
                }],
            }
        }
    }

    impl PageRenderer for FakeRenderer {
        type Document = Vec<FakePage>;
        type Page = FakePage;

        fn load_document(&self, bytes: &[u8]) -> Result<Self::Document, RenderError> {
            if bytes == b"broken" {
                return Err(RenderError::Load("not a document".to_string()));
            }
            Ok(self.pages.clone())
        }

        fn page_count(&self, doc: &Self::Document) -> Result<usize, RenderError> {
            Ok(doc.len())
        }

        fn get_page(&self, doc: &Self::Document, page: usize) -> Result<Self::Page, RenderError> {
            doc.get(page)
                .cloned()
                .ok_or(RenderError::PageOutOfRange {
                    page,
                    page_count: doc.len(),
                })
        }

        fn get_viewport(
            &self,
            page: &Self::Page,
            scale: f64,
            rotation: Rotation,
        ) -> Result<PageSize, RenderError> {
            let vp = Viewport::new(scale, rotation, page.size.width, page.size.height)?;
            let (width, height) = vp.device_size();
            Ok(PageSize::new(width, height))
        }

        fn render(&self, _page: &Self::Page, viewport: &Viewport) -> Result<ImageData, RenderError> {
            let (w, h) = viewport.device_size();
            let (width_px, height_px) = (w.round() as u32, h.round() as u32);
            Ok(ImageData {
                pixels: vec![0xFF; (width_px * height_px * 3) as usize],
                width_px,
                height_px,
            })
        }

        fn get_text_runs(&self, page: &Self::Page) -> Result<Vec<TextRun>, RenderError> {
            Ok(page.runs.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakePage, FakeRenderer};
    use super::*;

    #[test]
    fn document_info_lists_page_sizes() {
        let renderer = FakeRenderer {
            pages: vec![
                FakePage {
                    size: PageSize::new(612.0, 792.0),
                    runs: vec![],
                },
                FakePage {
                    size: PageSize::new(842.0, 595.0),
                    runs: vec![],
                },
            ],
        };
        let doc = renderer.load_document(b"%PDF").unwrap();
        let info = load_document_info(&renderer, &doc).unwrap();
        assert_eq!(info.page_count, 2);
        assert_eq!(info.page_sizes[1], PageSize::new(842.0, 595.0));
    }

    #[test]
    fn render_page_uses_rotated_device_size() {
        let renderer = FakeRenderer::letter(vec![]);
        let doc = renderer.load_document(b"%PDF").unwrap();
        let params = RenderParams {
            scale: 2.0,
            rotation: Rotation::R90,
        };
        let data = render_page(&renderer, &doc, 0, &params).unwrap();
        assert_eq!(data.img_data.width_px, 1584);
        assert_eq!(data.img_data.height_px, 1224);
        assert_eq!(data.page_size, PageSize::new(612.0, 792.0));
    }

    #[test]
    fn malformed_runs_are_rejected() {
        let renderer = FakeRenderer::letter(vec![TextRun::new(10.0, 10.0, 5.0, 20.0, "bad")]);
        let doc = renderer.load_document(b"%PDF").unwrap();
        let err = load_text_runs(&renderer, &doc, 0).unwrap_err();
        assert!(matches!(err, RenderError::MalformedTextLayer { page: 0, .. }));
    }

    #[test]
    fn missing_page_is_an_error() {
        let renderer = FakeRenderer::letter(vec![]);
        let doc = renderer.load_document(b"%PDF").unwrap();
        let err = load_text_runs(&renderer, &doc, 3).unwrap_err();
        assert!(matches!(
            err,
            RenderError::PageOutOfRange {
                page: 3,
                page_count: 1
            }
        ));
    }
}
