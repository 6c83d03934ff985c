//! MuPDF-backed page renderer

use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Page, Pixmap, Rect, TextPageFlags};

use crate::extract::{Rotation, TextRun, Viewport};

use super::adapter::PageRenderer;
use super::request::RenderError;
use super::types::{ImageData, PageSize, RunGranularity};

/// Renders PDF pages with MuPDF.
///
/// Holds no document state, so it can be cloned into every worker. Each
/// worker opens its own [`Document`] since MuPDF handles cannot cross
/// threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfRenderer {
    granularity: RunGranularity,
}

impl MupdfRenderer {
    #[must_use]
    pub fn new(granularity: RunGranularity) -> Self {
        Self { granularity }
    }
}

impl PageRenderer for MupdfRenderer {
    type Document = Document;
    type Page = Page;

    fn load_document(&self, bytes: &[u8]) -> Result<Self::Document, RenderError> {
        Document::from_bytes(bytes, "pdf").map_err(|e| RenderError::Load(e.to_string()))
    }

    fn page_count(&self, doc: &Self::Document) -> Result<usize, RenderError> {
        Ok(doc.page_count()?.max(0) as usize)
    }

    fn get_page(&self, doc: &Self::Document, page: usize) -> Result<Self::Page, RenderError> {
        let page_count = self.page_count(doc)?;
        if page >= page_count {
            return Err(RenderError::PageOutOfRange { page, page_count });
        }
        Ok(doc.load_page(page as i32)?)
    }

    fn get_viewport(
        &self,
        page: &Self::Page,
        scale: f64,
        rotation: Rotation,
    ) -> Result<PageSize, RenderError> {
        let (width, height) = bounds_size(page.bounds()?);
        let vp = Viewport::new(scale, rotation, width, height)?;
        let (w, h) = vp.device_size();
        Ok(PageSize::new(w, h))
    }

    fn render(&self, page: &Self::Page, viewport: &Viewport) -> Result<ImageData, RenderError> {
        let transform = device_matrix(viewport);
        let rgb = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&transform, &rgb, false, false)?;
        let pixels = pixmap_to_rgb(&pixmap)?;

        Ok(ImageData {
            pixels,
            width_px: pixmap.width(),
            height_px: pixmap.height(),
        })
    }

    fn get_text_runs(&self, page: &Self::Page) -> Result<Vec<TextRun>, RenderError> {
        let bounds = page.bounds()?;
        let text_page = page.to_text_page(TextPageFlags::empty())?;
        let mut runs = Vec::new();

        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                match self.granularity {
                    RunGranularity::Line => {
                        let text: String = line.chars().filter_map(|ch| ch.char()).collect();
                        runs.push(to_page_space(line.bounds(), bounds, text));
                    }
                    RunGranularity::Word => {
                        let mut word: Option<(Rect, String)> = None;
                        for ch in line.chars() {
                            let Some(c) = ch.char() else { continue };
                            if c.is_whitespace() {
                                if let Some((bbox, text)) = word.take() {
                                    runs.push(to_page_space(bbox, bounds, text));
                                }
                                continue;
                            }
                            let quad = ch.quad();
                            let glyph = Rect {
                                x0: quad.ul.x.min(quad.ll.x),
                                y0: quad.ul.y.min(quad.ur.y),
                                x1: quad.ur.x.max(quad.lr.x),
                                y1: quad.ll.y.max(quad.lr.y),
                            };
                            word = Some(match word.take() {
                                Some((bbox, mut text)) => {
                                    text.push(c);
                                    (union(bbox, glyph), text)
                                }
                                None => (glyph, c.to_string()),
                            });
                        }
                        if let Some((bbox, text)) = word {
                            runs.push(to_page_space(bbox, bounds, text));
                        }
                    }
                }
            }
        }

        Ok(runs)
    }
}

fn bounds_size(bounds: Rect) -> (f64, f64) {
    (
        f64::from(bounds.x1 - bounds.x0),
        f64::from(bounds.y1 - bounds.y0),
    )
}

/// Scale then rotate clockwise. `to_pixmap` renders the bounding box of the
/// transformed page, which supplies the translation.
fn device_matrix(viewport: &Viewport) -> Matrix {
    let s = viewport.scale() as f32;
    let (cos, sin) = viewport.rotation().cos_sin();
    let (cos, sin) = (cos as f32, sin as f32);
    Matrix::new(s * cos, s * sin, -s * sin, s * cos, 0.0, 0.0)
}

/// MuPDF reports boxes with a top-left origin relative to the page bounds;
/// runs are bottom-left.
fn to_page_space(bbox: Rect, page: Rect, text: String) -> TextRun {
    let height = f64::from(page.y1 - page.y0);
    TextRun::new(
        f64::from(bbox.x0 - page.x0),
        height - f64::from(bbox.y1 - page.y0),
        f64::from(bbox.x1 - page.x0),
        height - f64::from(bbox.y0 - page.y0),
        text,
    )
}

fn union(a: Rect, b: Rect) -> Rect {
    Rect {
        x0: a.x0.min(b.x0),
        y0: a.y0.min(b.y0),
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, RenderError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderError::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(RenderError::generic("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}
