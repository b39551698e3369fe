use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::foundation::error::{FleetError, FleetResult};
use crate::proxy::host::{WorkerOptions, serve};
use crate::render::registry::RendererRegistry;
use crate::render::renderer::RenderPayload;
use crate::render::surface::DrawingSurface;

/// One message: a JSON frame plus an optional surface whose ownership moves with it.
pub struct Envelope {
    pub frame: String,
    pub transfer: Option<Box<dyn DrawingSurface>>,
}

impl Envelope {
    pub fn message(frame: String) -> Self {
        Self {
            frame,
            transfer: None,
        }
    }

    pub fn with_transfer(frame: String, transfer: Box<dyn DrawingSurface>) -> Self {
        Self {
            frame,
            transfer: Some(transfer),
        }
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("frame", &self.frame)
            .field("transfer", &self.transfer.is_some())
            .finish()
    }
}

/// Host end of a bidirectional channel to one execution context.
pub struct ExecutionChannel {
    name: String,
    to_backend: Sender<Envelope>,
    from_backend: Receiver<Envelope>,
    worker: Option<JoinHandle<()>>,
}

/// Backend end of the same channel.
pub struct BackendEndpoint {
    pub name: String,
    pub to_host: Sender<Envelope>,
    pub from_host: Receiver<Envelope>,
}

/// Create both ends of a named channel.
pub fn channel_pair(name: &str) -> (ExecutionChannel, BackendEndpoint) {
    let (to_backend, from_host) = mpsc::channel();
    let (to_host, from_backend) = mpsc::channel();
    (
        ExecutionChannel {
            name: name.to_string(),
            to_backend,
            from_backend,
            worker: None,
        },
        BackendEndpoint {
            name: name.to_string(),
            to_host,
            from_host,
        },
    )
}

impl ExecutionChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the thread serving the backend end so disposal can join it.
    pub fn with_worker(mut self, worker: JoinHandle<()>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        String,
        Sender<Envelope>,
        Receiver<Envelope>,
        Option<JoinHandle<()>>,
    ) {
        (self.name, self.to_backend, self.from_backend, self.worker)
    }
}

/// Host-supplied way to open a channel to a fresh execution context, given its name.
pub type ChannelFactory = Arc<dyn Fn(&str) -> FleetResult<ExecutionChannel> + Send + Sync>;

/// Run a worker host for `registry` on a new thread named `name`.
pub fn spawn_worker<P: RenderPayload>(
    name: &str,
    registry: Arc<RendererRegistry<P>>,
    options: WorkerOptions,
) -> FleetResult<ExecutionChannel> {
    let (channel, endpoint) = channel_pair(name);
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || serve(endpoint, registry, options))
        .map_err(|err| {
            FleetError::construction(format!("cannot start execution context '{name}': {err}"))
        })?;
    Ok(channel.with_worker(handle))
}

/// [`ChannelFactory`] that spawns a worker thread per channel.
pub fn worker_factory<P: RenderPayload>(
    registry: Arc<RendererRegistry<P>>,
    options: WorkerOptions,
) -> ChannelFactory {
    Arc::new(move |name: &str| spawn_worker(name, Arc::clone(&registry), options))
}
