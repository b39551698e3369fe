use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::foundation::error::{FleetError, FleetResult};
use crate::pool::balancer::BalancerOptions;
use crate::pool::orchestrated::{OrchestratedPool, PoolConfig, StatsCallback, SurfaceFactory};
use crate::proxy::channel::{ChannelFactory, ExecutionChannel};
use crate::proxy::client::{ExecutionProxy, ProxyOptions, StatsListener};
use crate::render::controller::{ExecutionEnvironment, RendererController};
use crate::render::registry::{RendererContext, RendererRegistry};
use crate::render::renderer::RenderPayload;
use crate::render::surface::{DrawingSurface, HostSurface};
use crate::schedule::frame::NextFrame;
use crate::schedule::scheduler::{RenderMode, Scheduler, SchedulerOptions};
use crate::schedule::stats::RenderingStats;

/// Frame-time profiling for every renderer a factory creates.
#[derive(Clone)]
pub struct ProfilingOptions {
    /// Frames per snapshot.
    pub window: u32,
    /// Called with the renderer id and one snapshot per executor.
    pub on_stats: StatsCallback,
}

impl std::fmt::Debug for ProfilingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingOptions")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

/// Factory-wide defaults.
#[derive(Clone, Debug)]
pub struct FactoryOptions {
    pub render_mode: RenderMode,
    /// Whether the host can run backends in background execution contexts.
    pub remote_execution: bool,
    pub profiling: Option<ProfilingOptions>,
    /// Deadline for correlated proxy requests.
    pub request_timeout: Option<Duration>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::FrameBound,
            remote_execution: true,
            profiling: None,
            request_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Builds [`RendererController`]s, choosing where each backend runs.
pub struct RendererControllerFactory<P> {
    registry: Arc<RendererRegistry<P>>,
    options: FactoryOptions,
    channels: Option<ChannelFactory>,
    next_frame: Rc<dyn NextFrame>,
}

impl<P: RenderPayload> RendererControllerFactory<P> {
    /// `next_frame` drives schedulers of backends created on the control thread.
    pub fn new(
        registry: Arc<RendererRegistry<P>>,
        next_frame: Rc<dyn NextFrame>,
        options: FactoryOptions,
    ) -> Self {
        Self {
            registry,
            options,
            channels: None,
            next_frame,
        }
    }

    pub fn with_channel_factory(mut self, channels: ChannelFactory) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }

    fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            mode: self.options.render_mode,
            profiling_window: self.options.profiling.as_ref().map(|p| p.window),
        }
    }

    fn proxy_options(&self) -> ProxyOptions {
        ProxyOptions {
            scheduler: self.scheduler_options(),
            request_timeout: self.options.request_timeout,
        }
    }

    /// `Some(open)` when backends should run remotely, `None` to fall back to in-process.
    fn remote_channels(&self) -> FleetResult<Option<&ChannelFactory>> {
        if !self.options.remote_execution {
            return Ok(None);
        }
        self.channels.as_ref().map(Some).ok_or_else(|| {
            FleetError::configuration(
                "remote execution is supported but no channel factory was provided",
            )
        })
    }

    fn create_local(
        &self,
        id: &str,
        renderer_type: &str,
        params: Value,
        surface: Option<Box<dyn DrawingSurface>>,
        enabled: bool,
    ) -> FleetResult<RendererController<P>> {
        let options = self.scheduler_options();
        let on_stats = self.options.profiling.as_ref().map(|p| Arc::clone(&p.on_stats));
        let owner = id.to_string();
        let scheduler = Scheduler::from_options(&options, Rc::clone(&self.next_frame), move |s| {
            if let Some(on_stats) = &on_stats {
                on_stats(&owner, &[s]);
            }
        });
        let ctx = RendererContext {
            scheduler,
            surface,
            params,
        };
        let renderer = self.registry.construct(renderer_type, ctx)?;
        RendererController::new(id, renderer, ExecutionEnvironment::InProcess, enabled)
    }

    /// Backend on the control thread.
    #[tracing::instrument(skip(self, params))]
    pub fn create(
        &self,
        id: &str,
        renderer_type: &str,
        params: Value,
        enabled: bool,
    ) -> FleetResult<RendererController<P>> {
        self.create_local(id, renderer_type, params, None, enabled)
    }

    /// Backend in its own execution context drawing onto `surface`, or in process with the
    /// surface's drawing target when the host cannot run it remotely.
    #[tracing::instrument(skip(self, params, surface))]
    pub fn create_if_remote_available(
        &self,
        id: &str,
        renderer_type: &str,
        params: Value,
        mut surface: Box<dyn HostSurface>,
        enabled: bool,
    ) -> FleetResult<RendererController<P>> {
        let Some(channels) = self.remote_channels()? else {
            tracing::debug!("remote execution unavailable; creating in process");
            let target = surface.transfer_control()?;
            return self.create_local(id, renderer_type, params, Some(target), enabled);
        };

        if !self.registry.contains(renderer_type) {
            return Err(FleetError::protocol(format!(
                "unknown renderer type '{renderer_type}'"
            )));
        }
        let channel: ExecutionChannel = channels(id)?;
        let on_stats: Option<StatsListener> = self.options.profiling.as_ref().map(|p| {
            let on_stats = Arc::clone(&p.on_stats);
            let owner = id.to_string();
            Box::new(move |s: RenderingStats| on_stats(&owner, &[s])) as StatsListener
        });
        let proxy = ExecutionProxy::spawn(
            channel,
            surface,
            renderer_type,
            params,
            self.proxy_options(),
            on_stats,
        )?;
        RendererController::new(
            id,
            Box::new(proxy),
            ExecutionEnvironment::RemoteChannel,
            enabled,
        )
    }

    /// Self-scaling pool of remote backends, or a single in-process backend drawing onto the
    /// first surface when the host cannot run them remotely.
    #[tracing::instrument(skip(self, params, surfaces, balancer))]
    pub fn create_orchestrated_if_remote_available(
        &self,
        id: &str,
        renderer_type: &str,
        params: Value,
        mut surfaces: SurfaceFactory,
        balancer: BalancerOptions,
        enabled: bool,
    ) -> FleetResult<RendererController<P>> {
        let Some(channels) = self.remote_channels()? else {
            tracing::debug!("remote execution unavailable; creating in process");
            let target = surfaces(0)?.transfer_control()?;
            return self.create_local(id, renderer_type, params, Some(target), enabled);
        };

        if !self.registry.contains(renderer_type) {
            return Err(FleetError::protocol(format!(
                "unknown renderer type '{renderer_type}'"
            )));
        }
        let max_executors = balancer.max_executors;
        let config = PoolConfig {
            id: id.to_string(),
            renderer_type: renderer_type.to_string(),
            params,
            balancer,
            proxy: self.proxy_options(),
            on_stats: self.options.profiling.as_ref().map(|p| Arc::clone(&p.on_stats)),
        };
        let pool: OrchestratedPool<P> = OrchestratedPool::new(config, Arc::clone(channels), surfaces)?;
        RendererController::new(
            id,
            Box::new(pool),
            ExecutionEnvironment::OrchestratedPool { max_executors },
            enabled,
        )
    }
}
