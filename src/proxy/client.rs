use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::foundation::error::{FleetError, FleetResult};
use crate::foundation::geometry::{Size, Viewport};
use crate::payload::patch::Patch;
use crate::proxy::channel::{Envelope, ExecutionChannel};
use crate::proxy::pending::{PendingTable, RequestKind};
use crate::proxy::wire::{self, CreateRenderer, ProxyReply, ProxyRequest};
use crate::render::pick::PickFuture;
use crate::render::renderer::{PickingOptions, RenderPayload, Renderer};
use crate::render::surface::HostSurface;
use crate::schedule::scheduler::SchedulerOptions;
use crate::schedule::stats::RenderingStats;

/// Proxy configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProxyOptions {
    /// Scheduler the backend should be created with.
    pub scheduler: SchedulerOptions,
    /// Deadline applied to correlated requests; `None` waits forever.
    pub request_timeout: Option<Duration>,
}

/// Receives `renderingStats` messages; runs on the proxy's listener thread.
pub type StatsListener = Box<dyn FnMut(RenderingStats) + Send>;

/// Caller-side stand-in for a backend living in another execution context.
///
/// Fire-and-forget calls become messages; `pick_objects` and `dispose` are correlated with their
/// responses through a [`PendingTable`] that a listener thread resolves.
pub struct ExecutionProxy {
    name: String,
    sender: Option<Sender<Envelope>>,
    pending: Arc<PendingTable>,
    surface: Box<dyn HostSurface>,
    worker: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
    request_timeout: Option<Duration>,
    disposed: bool,
}

impl ExecutionProxy {
    /// Transfer `surface` to the execution context behind `channel` and construct the backend
    /// registered as `renderer_type` there.
    #[tracing::instrument(skip_all, fields(channel = %channel.name(), renderer_type = %renderer_type))]
    pub fn spawn(
        channel: ExecutionChannel,
        mut surface: Box<dyn HostSurface>,
        renderer_type: &str,
        params: Value,
        options: ProxyOptions,
        on_stats: Option<StatsListener>,
    ) -> FleetResult<Self> {
        let transfer = surface.transfer_control().map_err(|err| match err {
            FleetError::Construction(_) => err,
            other => FleetError::construction(format!(
                "cannot transfer surface to '{}': {other}",
                channel.name()
            )),
        })?;

        let (name, sender, receiver, worker) = channel.into_parts();
        let pending = PendingTable::new();
        let listener = thread::Builder::new()
            .name(format!("{name}-listener"))
            .spawn({
                let pending = Arc::clone(&pending);
                move || listen(receiver, pending, on_stats)
            })
            .map_err(|err| {
                FleetError::construction(format!("cannot start listener for '{name}': {err}"))
            })?;

        let proxy = Self {
            name,
            sender: Some(sender),
            pending,
            surface,
            worker,
            listener: Some(listener),
            request_timeout: options.request_timeout,
            disposed: false,
        };
        let create = ProxyRequest::CreateRenderer {
            data: CreateRenderer {
                renderer_type: renderer_type.to_string(),
                params,
                scheduler: options.scheduler,
            },
        };
        proxy.post(Envelope::with_transfer(wire::encode(&create)?, transfer))?;
        tracing::debug!("proxy ready");
        Ok(proxy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlated requests still awaiting a response.
    pub fn outstanding_requests(&self) -> usize {
        self.pending.len()
    }

    fn post(&self, envelope: Envelope) -> FleetResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| FleetError::disconnected(format!("'{}' is disposed", self.name)))?;
        sender.send(envelope).map_err(|_| {
            FleetError::disconnected(format!("execution context '{}' is gone", self.name))
        })
    }

    fn send(&self, request: &ProxyRequest) -> FleetResult<()> {
        self.post(Envelope::message(wire::encode(request)?))
    }

    /// Render an already-encoded payload.
    pub fn render_value(&mut self, payload: Value) -> FleetResult<()> {
        self.send(&ProxyRequest::Render { data: payload })
    }

    pub fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()> {
        self.send(&ProxyRequest::RenderPatches {
            data: patches.to_vec(),
        })
    }

    pub fn set_size(&mut self, size: Size) -> FleetResult<()> {
        self.send(&ProxyRequest::SetSize { data: size })
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> FleetResult<()> {
        self.send(&ProxyRequest::SetViewport { data: viewport })
    }

    /// Toggle the host placeholder and the backend together.
    pub fn set_visibility(&mut self, visible: bool) -> FleetResult<()> {
        self.surface.set_visible(visible);
        self.send(&ProxyRequest::SetVisibility { data: visible })
    }

    pub fn pick_objects(&mut self, options: &PickingOptions) -> PickFuture {
        let request = self.pending.register(RequestKind::PickObjects);
        let message = ProxyRequest::PickObjects {
            id: request.id(),
            data: *options,
        };
        match self.send(&message) {
            Ok(()) => PickFuture::remote(request, self.request_timeout),
            Err(err) => PickFuture::rejected(err),
        }
    }

    /// Ask the backend to dispose, wait for the acknowledgment, then close the channel.
    ///
    /// The execution context is joined only after a successful acknowledgment. Later calls are
    /// no-ops.
    #[tracing::instrument(skip(self), fields(channel = %self.name))]
    pub fn dispose(&mut self) -> FleetResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        let request = self.pending.register(RequestKind::Dispose);
        let id = request.id();
        let ack = self.send(&ProxyRequest::Dispose { id }).and_then(|()| {
            let deadline = self.request_timeout.map(|t| Instant::now() + t);
            request.wait_until(deadline).map(drop)
        });
        self.sender = None;

        match &ack {
            Ok(()) => {
                join(self.worker.take(), &self.name, "worker");
                join(self.listener.take(), &self.name, "listener");
            }
            Err(err) => {
                tracing::warn!(error = %err, "dispose was not acknowledged; detaching execution context");
                self.worker = None;
                self.listener = None;
            }
        }
        ack
    }

    /// Remove the host placeholder.
    pub fn detach_surface(&mut self) {
        self.surface.detach();
    }
}

fn join(handle: Option<JoinHandle<()>>, name: &str, role: &str) {
    if let Some(handle) = handle
        && handle.join().is_err()
    {
        tracing::warn!(channel = name, role, "execution thread panicked");
    }
}

fn listen(
    receiver: Receiver<Envelope>,
    pending: Arc<PendingTable>,
    mut on_stats: Option<StatsListener>,
) {
    while let Ok(envelope) = receiver.recv() {
        let reply: ProxyReply = match wire::decode(&envelope.frame) {
            Ok(reply) => reply,
            Err(err) => wire::unhandled_variant("host", &err),
        };
        let (kind, id, result) = match reply {
            ProxyReply::RenderingStats { data } => {
                if let Some(on_stats) = on_stats.as_mut() {
                    on_stats(data);
                }
                continue;
            }
            ProxyReply::PickObjects { id, result } => (
                RequestKind::PickObjects,
                id,
                result.into_result().map(Value::Array),
            ),
            ProxyReply::Dispose { id, result } => (
                RequestKind::Dispose,
                id,
                result.into_result().map(|()| Value::Null),
            ),
        };
        if !pending.resolve(kind, id, result) {
            tracing::debug!(kind = kind.as_str(), id, "ignoring response nobody waits for");
        }
    }
    let rejected = pending.clear("execution context terminated");
    if rejected > 0 {
        tracing::warn!(rejected, "execution context terminated with requests outstanding");
    }
}

impl<P: RenderPayload> Renderer<P> for ExecutionProxy {
    fn render(&mut self, payload: P) -> FleetResult<()> {
        let value = serde_json::to_value(&payload)?;
        self.render_value(value)
    }

    fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()> {
        ExecutionProxy::render_patches(self, patches)
    }

    fn set_size(&mut self, size: Size) -> FleetResult<()> {
        ExecutionProxy::set_size(self, size)
    }

    fn set_viewport(&mut self, viewport: Viewport) -> FleetResult<()> {
        ExecutionProxy::set_viewport(self, viewport)
    }

    fn set_visibility(&mut self, visible: bool) -> FleetResult<()> {
        ExecutionProxy::set_visibility(self, visible)
    }

    fn pick_objects(&mut self, options: &PickingOptions) -> PickFuture {
        ExecutionProxy::pick_objects(self, options)
    }

    fn dispose(&mut self) -> FleetResult<()> {
        ExecutionProxy::dispose(self)
    }
}
