use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::foundation::error::FleetResult;
use crate::foundation::geometry::{Point, Rectangle, Size, Viewport};
use crate::payload::patch::Patch;
use crate::render::pick::PickFuture;

/// Payload type a renderer can consume; it must survive a JSON round trip to cross a channel.
pub trait RenderPayload: Serialize + DeserializeOwned + Clone + 'static {}

impl<T> RenderPayload for T where T: Serialize + DeserializeOwned + Clone + 'static {}

/// Backend-defined hit-test result.
pub type PickingResult = Value;

/// Hit-test query.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum PickingOptions {
    /// Objects under a single point.
    Position { position: Point },
    /// Objects intersecting a rectangle.
    Area { rectangle: Rectangle },
}

impl PickingOptions {
    pub fn at(x: f64, y: f64) -> Self {
        Self::Position {
            position: Point::new(x, y),
        }
    }

    pub fn area(rectangle: Rectangle) -> Self {
        Self::Area { rectangle }
    }
}

/// Capability every rendering backend exposes, whether it runs in process, behind a proxy or as
/// a pool.
///
/// Mutating calls are fire-and-forget from the caller's point of view; an `Err` means the call
/// could not be delivered, not that drawing failed.
pub trait Renderer<P> {
    fn render(&mut self, payload: P) -> FleetResult<()>;

    fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()>;

    fn set_size(&mut self, size: Size) -> FleetResult<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> FleetResult<()>;

    fn set_visibility(&mut self, visible: bool) -> FleetResult<()>;

    fn pick_objects(&mut self, options: &PickingOptions) -> PickFuture;

    fn dispose(&mut self) -> FleetResult<()>;

    /// Drain events owned by this renderer. Called by the control thread between operations.
    fn poll(&mut self) {}
}
