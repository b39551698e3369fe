pub use kurbo::{Point, Rect, Size, Vec2};

/// Shared pan/zoom transform applied by every backend.
///
/// Viewports are immutable snapshots: helpers return a new value instead of mutating in place.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    /// Top-left offset in host pixels.
    pub position: Point,
    /// Scale factor; `1.0` is identity.
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Create a viewport from a position and zoom.
    pub fn new(position: Point, zoom: f64) -> Self {
        Self { position, zoom }
    }

    /// Zoom by `factor` keeping `anchor` (host pixels) fixed on screen.
    pub fn zoom_at(self, factor: f64, anchor: Point) -> Self {
        Self {
            position: Point::new(
                anchor.x - (anchor.x - self.position.x) * factor,
                anchor.y - (anchor.y - self.position.y) * factor,
            ),
            zoom: self.zoom * factor,
        }
    }

    /// Translate the viewport by `delta` host pixels.
    pub fn pan_by(self, delta: Vec2) -> Self {
        Self {
            position: self.position + delta,
            zoom: self.zoom,
        }
    }
}

/// Axis-aligned rectangle in `{x, y, width, height}` form, as used on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rectangle {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Rectangle {
    /// Create a rectangle from origin and extent.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert into a [`kurbo::Rect`] (`x0,y0,x1,y1`).
    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Return `true` when `p` lies inside the rectangle (edges included).
    pub fn contains(self, p: Point) -> bool {
        let r = self.to_rect().abs();
        p.x >= r.x0 && p.x <= r.x1 && p.y >= r.y0 && p.y <= r.y1
    }
}

impl From<Rect> for Rectangle {
    fn from(r: Rect) -> Self {
        Self::new(r.x0, r.y0, r.width(), r.height())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/geometry.rs"]
mod tests;
