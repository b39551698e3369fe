use crate::foundation::error::FleetResult;
use crate::foundation::geometry::{Size, Viewport};
use crate::payload::patch::Patch;
use crate::render::pick::PickFuture;
use crate::render::renderer::{PickingOptions, Renderer};

/// Where a controller's backend actually runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionEnvironment {
    /// On the control thread.
    InProcess,
    /// On one dedicated execution context behind a proxy.
    RemoteChannel,
    /// On a self-scaling pool of execution contexts.
    #[serde(rename_all = "camelCase")]
    OrchestratedPool { max_executors: usize },
}

/// Payload projection applied before a controller's backend sees a payload.
pub type PayloadSelector<P> = Box<dyn Fn(&P) -> P>;

/// Pairs a backend with its identity, payload selector and enabled flag.
pub struct RendererController<P> {
    id: String,
    renderer: Box<dyn Renderer<P>>,
    selector: Option<PayloadSelector<P>>,
    enabled: bool,
    environment: ExecutionEnvironment,
    disposed: bool,
}

impl<P: Clone> RendererController<P> {
    /// Wrap `renderer` and push the initial visibility to it.
    pub fn new(
        id: impl Into<String>,
        mut renderer: Box<dyn Renderer<P>>,
        environment: ExecutionEnvironment,
        enabled: bool,
    ) -> FleetResult<Self> {
        renderer.set_visibility(enabled)?;
        Ok(Self {
            id: id.into(),
            renderer,
            selector: None,
            enabled,
            environment,
            disposed: false,
        })
    }

    pub fn with_selector(mut self, selector: impl Fn(&P) -> P + 'static) -> Self {
        self.selector = Some(Box::new(selector));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn environment(&self) -> ExecutionEnvironment {
        self.environment
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Toggle the controller; the backend's visibility follows.
    pub fn set_enabled(&mut self, enabled: bool) -> FleetResult<()> {
        self.enabled = enabled;
        self.renderer.set_visibility(enabled)
    }

    /// Project `payload` through the selector; identity when none is set.
    pub fn select(&self, payload: &P) -> P {
        match &self.selector {
            Some(selector) => selector(payload),
            None => payload.clone(),
        }
    }

    pub fn render(&mut self, payload: &P) -> FleetResult<()> {
        let selected = self.select(payload);
        self.renderer.render(selected)
    }

    pub fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()> {
        self.renderer.render_patches(patches)
    }

    pub fn set_size(&mut self, size: Size) -> FleetResult<()> {
        self.renderer.set_size(size)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> FleetResult<()> {
        self.renderer.set_viewport(viewport)
    }

    pub fn pick_objects(&mut self, options: &PickingOptions) -> PickFuture {
        self.renderer.pick_objects(options)
    }

    pub fn poll(&mut self) {
        self.renderer.poll();
    }

    /// Dispose the backend. Later calls are no-ops.
    pub fn dispose(&mut self) -> FleetResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        tracing::debug!(renderer = %self.id, "disposing renderer");
        self.renderer.dispose()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/controller.rs"]
mod tests;
