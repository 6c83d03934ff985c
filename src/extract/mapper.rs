//! Device space <-> page space coordinate mapping
//!
//! Rendering takes a page-space point through three steps: flip y into a
//! top-left origin, rotate clockwise about the origin and shift the rotated
//! page back into the positive quadrant, then multiply by the scale. All
//! four rotations come out of the same matrix; only its cosine and sine
//! differ. Mapping a device rectangle back runs the inverse steps in
//! reverse order.

use super::geometry::{DeviceRect, PageRect, Point, Viewport};

/// Forward/inverse page transform for a single viewport
#[derive(Clone, Copy, Debug)]
struct PageTransform {
    cos: f64,
    sin: f64,
    offset_x: f64,
    offset_y: f64,
    scale: f64,
    page_height: f64,
}

impl PageTransform {
    fn new(viewport: &Viewport) -> Self {
        let (cos, sin) = viewport.rotation().cos_sin();
        let (w, h) = (viewport.page_width(), viewport.page_height());

        // The rotation pivots on the top-left corner, which leaves part of
        // the page in negative coordinates. The bitmap starts at the
        // rotated page's minimum corner.
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        for (x, y) in [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)] {
            min_x = min_x.min(cos * x - sin * y);
            min_y = min_y.min(sin * x + cos * y);
        }

        Self {
            cos,
            sin,
            offset_x: -min_x,
            offset_y: -min_y,
            scale: viewport.scale(),
            page_height: h,
        }
    }

    fn to_device(&self, p: Point) -> Point {
        let ux = p.x;
        let uy = self.page_height - p.y;
        let rx = self.cos * ux - self.sin * uy + self.offset_x;
        let ry = self.sin * ux + self.cos * uy + self.offset_y;
        Point::new(rx * self.scale, ry * self.scale)
    }

    fn to_page(&self, d: Point) -> Point {
        let rx = d.x / self.scale - self.offset_x;
        let ry = d.y / self.scale - self.offset_y;
        let ux = self.cos * rx + self.sin * ry;
        let uy = -self.sin * rx + self.cos * ry;
        Point::new(ux, self.page_height - uy)
    }
}

/// Map a rectangle drawn on the rendered bitmap into page space.
///
/// The rectangle is normalized first, so dragging right-to-left or
/// bottom-to-top yields the same result as the equivalent forward drag. A
/// zero-area input maps to a zero-area output.
#[must_use]
pub fn map_to_page_space(rect: &DeviceRect, viewport: &Viewport) -> PageRect {
    let transform = PageTransform::new(viewport);
    let (a, b) = rect.normalized().corners();
    PageRect::from_corners(transform.to_page(a), transform.to_page(b))
}

/// Inverse of [`map_to_page_space`]
#[must_use]
pub fn map_to_device_space(rect: &PageRect, viewport: &Viewport) -> DeviceRect {
    let transform = PageTransform::new(viewport);
    let a = transform.to_device(Point::new(rect.x0, rect.y0));
    let b = transform.to_device(Point::new(rect.x1, rect.y1));
    DeviceRect::from_corners(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::geometry::Rotation;

    const TOLERANCE: f64 = 1e-9;

    fn viewport(scale: f64, rotation: Rotation) -> Viewport {
        Viewport::new(scale, rotation, 600.0, 800.0).unwrap()
    }

    fn assert_page_rect(actual: PageRect, expected: (f64, f64, f64, f64)) {
        let got = (actual.x0, actual.y0, actual.x1, actual.y1);
        let close = (got.0 - expected.0).abs() < TOLERANCE
            && (got.1 - expected.1).abs() < TOLERANCE
            && (got.2 - expected.2).abs() < TOLERANCE
            && (got.3 - expected.3).abs() < TOLERANCE;
        assert!(close, "expected {expected:?}, got {got:?}");
    }

    #[test]
    fn identity_viewport_only_flips_y() {
        let vp = viewport(1.0, Rotation::R0);
        let page = map_to_page_space(&DeviceRect::new(100.0, 680.0, 110.0, 30.0), &vp);
        assert_page_rect(page, (100.0, 90.0, 210.0, 120.0));
    }

    #[test]
    fn scale_is_divided_out() {
        let vp = viewport(2.0, Rotation::R0);
        let page = map_to_page_space(&DeviceRect::new(200.0, 1360.0, 220.0, 60.0), &vp);
        assert_page_rect(page, (100.0, 90.0, 210.0, 120.0));
    }

    #[test]
    fn quarter_turn_swaps_axes() {
        // Rotated 90° clockwise, the page's bottom-left corner lands at the
        // bitmap's top-left, so device x follows page y and device y
        // follows page x.
        let vp = viewport(1.0, Rotation::R90);
        let page = map_to_page_space(&DeviceRect::new(90.0, 100.0, 30.0, 110.0), &vp);
        assert_page_rect(page, (100.0, 90.0, 210.0, 120.0));
    }

    #[test]
    fn half_turn_mirrors_both_axes() {
        let vp = viewport(1.0, Rotation::R180);
        // Page x 100..210 -> device x 390..500; page y 90..120 -> device y 90..120
        let page = map_to_page_space(&DeviceRect::new(390.0, 90.0, 110.0, 30.0), &vp);
        assert_page_rect(page, (100.0, 90.0, 210.0, 120.0));
    }

    #[test]
    fn three_quarter_turn() {
        let vp = viewport(1.0, Rotation::R270);
        // device x = 800 - page y, device y = 600 - page x
        let page = map_to_page_space(&DeviceRect::new(680.0, 390.0, 30.0, 110.0), &vp);
        assert_page_rect(page, (100.0, 90.0, 210.0, 120.0));
    }

    #[test]
    fn page_corners_fill_the_bitmap() {
        for rotation in Rotation::ALL {
            let vp = viewport(1.5, rotation);
            let (w, h) = vp.device_size();
            let full = PageRect {
                x0: 0.0,
                y0: 0.0,
                x1: 600.0,
                y1: 800.0,
            };
            let device = map_to_device_space(&full, &vp);
            assert!(device.x.abs() < TOLERANCE, "{rotation}: {device:?}");
            assert!(device.y.abs() < TOLERANCE, "{rotation}: {device:?}");
            assert!((device.width - w).abs() < TOLERANCE, "{rotation}: {device:?}");
            assert!((device.height - h).abs() < TOLERANCE, "{rotation}: {device:?}");
        }
    }

    #[test]
    fn backwards_drag_matches_forward_drag() {
        let vp = viewport(1.25, Rotation::R90);
        let forward = DeviceRect::new(40.0, 50.0, 120.0, 80.0);
        let backward = DeviceRect::new(160.0, 130.0, -120.0, -80.0);
        assert_eq!(
            map_to_page_space(&forward, &vp),
            map_to_page_space(&backward, &vp)
        );
    }

    #[test]
    fn zero_area_stays_zero_area() {
        for rotation in Rotation::ALL {
            let vp = viewport(3.0, rotation);
            let page = map_to_page_space(&DeviceRect::new(40.0, 50.0, 0.0, 80.0), &vp);
            assert!(page.is_empty(), "{rotation}: {page:?}");
        }
    }
}
