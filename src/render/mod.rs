//! Renderer capability, registry and controllers.

pub mod controller;
pub mod factory;
pub mod pick;
pub mod registry;
pub mod renderer;
pub mod surface;
