use std::time::{Duration, Instant};

use crate::dispatch::bounds::{BoundsObserver, SizeSubscription};
use crate::foundation::error::{FleetError, FleetResult};
use crate::foundation::geometry::{Size, Viewport};
use crate::payload::patch::Patch;
use crate::render::controller::RendererController;
use crate::render::pick::PickFuture;
use crate::render::renderer::{PickingOptions, PickingResult};

/// Fans every call out to a fixed, ordered set of renderer controllers.
///
/// The dispatcher becomes ready on the first observed size. Renders issued before that are
/// deferred (only the latest is kept); patches issued before that are dropped.
pub struct Dispatcher<P> {
    controllers: Vec<RendererController<P>>,
    sizes: SizeSubscription,
    ready: bool,
    on_ready: Option<Box<dyn FnOnce()>>,
    deferred: Option<P>,
}

impl<P: Clone> Dispatcher<P> {
    /// Take ownership of `controllers` and subscribe to `bounds`.
    pub fn new(controllers: Vec<RendererController<P>>, bounds: &mut dyn BoundsObserver) -> Self {
        Self {
            controllers,
            sizes: bounds.subscribe(),
            ready: false,
            on_ready: None,
            deferred: None,
        }
    }

    /// Run `callback` once, when the first size arrives.
    pub fn on_ready(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_ready = Some(Box::new(callback));
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn controllers(&self) -> &[RendererController<P>] {
        &self.controllers
    }

    /// Apply queued size observations and let every controller drain its own events.
    pub fn poll(&mut self) {
        while let Some(size) = self.sizes.try_next() {
            self.resize(size);
        }
        for controller in &mut self.controllers {
            controller.poll();
        }
    }

    /// Forward `size` to every controller.
    pub fn resize(&mut self, size: Size) {
        for controller in &mut self.controllers {
            if let Err(err) = controller.set_size(size) {
                tracing::warn!(renderer = controller.id(), error = %err, "set_size failed");
            }
        }
        if self.ready {
            return;
        }
        self.ready = true;
        tracing::debug!(width = size.width, height = size.height, "dispatcher ready");
        if let Some(callback) = self.on_ready.take() {
            callback();
        }
        if let Some(payload) = self.deferred.take() {
            self.render(payload);
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        for controller in &mut self.controllers {
            if let Err(err) = controller.set_viewport(viewport) {
                tracing::warn!(renderer = controller.id(), error = %err, "set_viewport failed");
            }
        }
    }

    /// Render `payload` on every enabled controller through its selector.
    pub fn render(&mut self, payload: P) {
        if !self.ready {
            self.deferred = Some(payload);
            return;
        }
        for controller in self.controllers.iter_mut().filter(|c| c.is_enabled()) {
            if let Err(err) = controller.render(&payload) {
                tracing::warn!(renderer = controller.id(), error = %err, "render failed");
            }
        }
    }

    pub fn render_patches(&mut self, patches: &[Patch]) {
        if !self.ready {
            tracing::debug!(count = patches.len(), "dropping patches before ready");
            return;
        }
        for controller in self.controllers.iter_mut().filter(|c| c.is_enabled()) {
            if let Err(err) = controller.render_patches(patches) {
                tracing::warn!(renderer = controller.id(), error = %err, "render_patches failed");
            }
        }
    }

    /// Enable or disable the controller named `id`.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> FleetResult<()> {
        let controller = self
            .controllers
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or_else(|| FleetError::configuration(format!("no renderer named '{id}'")))?;
        controller.set_enabled(enabled)
    }

    /// Query every controller, in order.
    pub fn pick_objects(&mut self, options: &PickingOptions) -> AggregatePick {
        let parts = self
            .controllers
            .iter_mut()
            .map(|c| (c.id().to_string(), c.pick_objects(options)))
            .collect();
        AggregatePick { parts }
    }

    /// Dispose every controller once and stop observing sizes.
    #[tracing::instrument(skip_all, fields(controllers = self.controllers.len()))]
    pub fn dispose(self) -> FleetResult<()> {
        let Self {
            mut controllers,
            sizes,
            ..
        } = self;
        sizes.unsubscribe();

        let mut first_err = None;
        for controller in &mut controllers {
            if let Err(err) = controller.dispose() {
                tracing::warn!(renderer = controller.id(), error = %err, "dispose failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Pick results of every controller, in controller order.
#[derive(Debug)]
pub struct AggregatePick {
    parts: Vec<(String, PickFuture)>,
}

impl AggregatePick {
    /// Concatenate every successful result. Rejected controllers are logged and skipped.
    pub fn wait(self) -> Vec<PickingResult> {
        merge(self.settle(None))
    }

    pub fn wait_timeout(self, timeout: Duration) -> Vec<PickingResult> {
        merge(self.settle(Some(Instant::now() + timeout)))
    }

    /// Per-controller outcome, including rejections.
    pub fn wait_settled(self) -> Vec<(String, FleetResult<Vec<PickingResult>>)> {
        self.settle(None)
    }

    fn settle(self, deadline: Option<Instant>) -> Vec<(String, FleetResult<Vec<PickingResult>>)> {
        self.parts
            .into_iter()
            .map(|(id, part)| (id, part.wait_until(deadline)))
            .collect()
    }
}

fn merge(settled: Vec<(String, FleetResult<Vec<PickingResult>>)>) -> Vec<PickingResult> {
    let mut out = Vec::new();
    for (id, result) in settled {
        match result {
            Ok(items) => out.extend(items),
            Err(err) => tracing::warn!(renderer = %id, error = %err, "pick rejected; skipping"),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/dispatch/dispatcher.rs"]
mod tests;
