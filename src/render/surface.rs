use std::any::Any;

use crate::foundation::error::{FleetError, FleetResult};
use crate::foundation::geometry::Size;

/// Drawing target handed to a backend. Ownership moves into the backend's execution context.
pub trait DrawingSurface: Any + Send {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Send> DrawingSurface for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Recover the concrete surface a host transferred.
pub fn downcast_surface<T: Any>(surface: Box<dyn DrawingSurface>) -> FleetResult<Box<T>> {
    surface
        .into_any()
        .downcast::<T>()
        .map_err(|_| FleetError::construction("transferred surface has an unexpected type"))
}

/// Host-side placeholder for a surface whose control was given to a backend.
pub trait HostSurface: Send {
    /// Give up drawing control; may only succeed once.
    fn transfer_control(&mut self) -> FleetResult<Box<dyn DrawingSurface>>;

    fn set_visible(&mut self, visible: bool);

    /// Remove the placeholder from the host after its backend is gone.
    fn detach(&mut self) {}
}

/// Backing store of a [`HeadlessSurface`]; what the backend receives.
#[derive(Clone, Debug, PartialEq)]
pub struct OffscreenCanvas {
    pub label: String,
    pub size: Size,
}

/// Surface with no on-screen presence, for tools and tests.
#[derive(Debug)]
pub struct HeadlessSurface {
    canvas: Option<OffscreenCanvas>,
    visible: bool,
    attached: bool,
}

impl HeadlessSurface {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            canvas: Some(OffscreenCanvas {
                label: label.into(),
                size: Size::ZERO,
            }),
            visible: true,
            attached: true,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl HostSurface for HeadlessSurface {
    fn transfer_control(&mut self) -> FleetResult<Box<dyn DrawingSurface>> {
        let canvas = self
            .canvas
            .take()
            .ok_or_else(|| FleetError::construction("surface control was already transferred"))?;
        Ok(Box::new(canvas))
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn detach(&mut self) {
        self.attached = false;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
