use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::foundation::error::{FleetError, FleetResult};
use crate::render::renderer::Renderer;
use crate::render::surface::DrawingSurface;
use crate::schedule::scheduler::Scheduler;

/// Everything a backend constructor receives.
pub struct RendererContext {
    /// Scheduler bound to the execution context the backend lives in.
    pub scheduler: Scheduler,
    /// Transferred drawing surface; `None` for purely in-process renderers.
    pub surface: Option<Box<dyn DrawingSurface>>,
    /// Backend-specific construction parameters.
    pub params: Value,
}

/// Backend constructor stored under a type tag.
pub type RendererConstructor<P> =
    Arc<dyn Fn(RendererContext) -> FleetResult<Box<dyn Renderer<P>>> + Send + Sync>;

/// Table of backend constructors keyed by a stable type tag.
///
/// Populate it before creating any controller; worker hosts receive a shared handle and resolve
/// tags from construction messages against it.
pub struct RendererRegistry<P> {
    constructors: HashMap<String, RendererConstructor<P>>,
}

impl<P> Default for RendererRegistry<P> {
    fn default() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }
}

impl<P> RendererRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `tag`, replacing any earlier entry.
    pub fn register<F>(&mut self, tag: impl Into<String>, constructor: F)
    where
        F: Fn(RendererContext) -> FleetResult<Box<dyn Renderer<P>>> + Send + Sync + 'static,
    {
        self.constructors.insert(tag.into(), Arc::new(constructor));
    }

    /// Builder form of [`RendererRegistry::register`].
    pub fn with<F>(mut self, tag: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(RendererContext) -> FleetResult<Box<dyn Renderer<P>>> + Send + Sync + 'static,
    {
        self.register(tag, constructor);
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Build the backend registered under `tag`.
    pub fn construct(&self, tag: &str, ctx: RendererContext) -> FleetResult<Box<dyn Renderer<P>>> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| FleetError::protocol(format!("unknown renderer type '{tag}'")))?;
        constructor(ctx)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/registry.rs"]
mod tests;
