use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::foundation::error::FleetError;
use crate::proxy::channel::{BackendEndpoint, Envelope};
use crate::proxy::wire::{self, CreateRenderer, ProxyReply, ProxyRequest, Resolution};
use crate::render::registry::{RendererContext, RendererRegistry};
use crate::render::renderer::{RenderPayload, Renderer};
use crate::render::surface::DrawingSurface;
use crate::schedule::frame::{FrameQueue, NextFrame};
use crate::schedule::scheduler::Scheduler;

/// Worker host tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerOptions {
    /// Display-frame period driving frame-bound and continuous schedulers.
    pub frame_interval_ms: u64,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
        }
    }
}

impl WorkerOptions {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

enum Flow {
    Continue,
    Exit,
}

struct Worker<P> {
    name: String,
    to_host: Sender<Envelope>,
    registry: Arc<RendererRegistry<P>>,
    frames: FrameQueue,
    renderer: Option<Box<dyn Renderer<P>>>,
}

/// Serve one backend over `endpoint` until it is disposed or the host hangs up.
///
/// Runs on the backend's execution context. Messages are handled in arrival order; between
/// messages the loop advances the frame queue once per frame interval.
pub fn serve<P: RenderPayload>(
    endpoint: BackendEndpoint,
    registry: Arc<RendererRegistry<P>>,
    options: WorkerOptions,
) {
    let BackendEndpoint {
        name,
        to_host,
        from_host,
    } = endpoint;
    let span = tracing::debug_span!("worker", name = %name);
    let _enter = span.enter();

    let mut worker = Worker {
        name,
        to_host,
        registry,
        frames: FrameQueue::new(),
        renderer: None,
    };
    let interval = options.frame_interval();
    let mut next_frame = Instant::now() + interval;

    loop {
        let wait = next_frame.saturating_duration_since(Instant::now());
        match from_host.recv_timeout(wait) {
            Ok(envelope) => {
                if let Flow::Exit = worker.handle(envelope) {
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("host hung up");
                break;
            }
        }
        if Instant::now() >= next_frame {
            worker.frames.run_frame();
            if let Some(renderer) = worker.renderer.as_mut() {
                renderer.poll();
            }
            next_frame = Instant::now() + interval;
        }
    }

    if let Some(mut renderer) = worker.renderer.take()
        && let Err(err) = renderer.dispose()
    {
        tracing::warn!(error = %err, "backend dispose failed during shutdown");
    }
}

impl<P: RenderPayload> Worker<P> {
    fn handle(&mut self, envelope: Envelope) -> Flow {
        let request: ProxyRequest = match wire::decode(&envelope.frame) {
            Ok(request) => request,
            Err(err) => wire::unhandled_variant(&self.name, &err),
        };
        tracing::trace!(message = request.message_type(), "request");
        match request {
            ProxyRequest::CreateRenderer { data } => {
                self.create(data, envelope.transfer);
                Flow::Continue
            }
            other => self.dispatch(other),
        }
    }

    fn create(&mut self, data: CreateRenderer, surface: Option<Box<dyn DrawingSurface>>) {
        if self.renderer.is_some() {
            let err = FleetError::protocol("renderer already created");
            wire::unhandled_variant(&self.name, &err);
        }
        let to_host = self.to_host.clone();
        let next_frame: Rc<dyn NextFrame> = Rc::new(self.frames.clone());
        let scheduler = Scheduler::from_options(&data.scheduler, next_frame, move |stats| {
            post(&to_host, &ProxyReply::RenderingStats { data: stats });
        });
        let ctx = RendererContext {
            scheduler,
            surface,
            params: data.params,
        };
        match self.registry.construct(&data.renderer_type, ctx) {
            Ok(renderer) => {
                tracing::debug!(renderer_type = %data.renderer_type, "backend created");
                self.renderer = Some(renderer);
            }
            Err(err) => wire::unhandled_variant(&self.name, &err),
        }
    }

    fn dispatch(&mut self, request: ProxyRequest) -> Flow {
        let Some(renderer) = self.renderer.as_mut() else {
            let err = FleetError::protocol(format!(
                "'{}' received before createRenderer",
                request.message_type()
            ));
            wire::unhandled_variant(&self.name, &err);
        };

        let delivered = match request {
            // routed to `create` before dispatch
            ProxyRequest::CreateRenderer { .. } => Ok(()),
            ProxyRequest::Render { data } => match serde_json::from_value::<P>(data) {
                Ok(payload) => renderer.render(payload),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping payload that does not match the backend schema");
                    Ok(())
                }
            },
            ProxyRequest::RenderPatches { data } => renderer.render_patches(&data),
            ProxyRequest::SetSize { data } => renderer.set_size(data),
            ProxyRequest::SetViewport { data } => renderer.set_viewport(data),
            ProxyRequest::SetVisibility { data } => renderer.set_visibility(data),
            ProxyRequest::PickObjects { id, data } => {
                let result = renderer.pick_objects(&data).wait();
                post(
                    &self.to_host,
                    &ProxyReply::PickObjects {
                        id,
                        result: Resolution::from(result),
                    },
                );
                Ok(())
            }
            ProxyRequest::Dispose { id } => {
                let result = renderer.dispose();
                self.renderer = None;
                post(
                    &self.to_host,
                    &ProxyReply::Dispose {
                        id,
                        result: Resolution::from(result),
                    },
                );
                return Flow::Exit;
            }
        };
        if let Err(err) = delivered {
            tracing::warn!(error = %err, "backend call failed");
        }
        Flow::Continue
    }
}

fn post(to_host: &Sender<Envelope>, reply: &ProxyReply) {
    let frame = match wire::encode(reply) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::error!(error = %err, "cannot encode reply");
            return;
        }
    };
    if to_host.send(Envelope::message(frame)).is_err() {
        tracing::debug!("host is gone; reply dropped");
    }
}
