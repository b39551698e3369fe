#![forbid(unsafe_code)]

//! Dispatch rendering work across pluggable backends, optionally moving each backend into its own
//! execution context and scaling the heaviest ones across a self-balancing pool.

pub mod dispatch;
pub mod foundation;
pub mod payload;
pub mod pool;
pub mod proxy;
pub mod render;
pub mod schedule;

pub use dispatch::bounds::{BoundsObserver, ChannelBounds, SizeReporter, SizeSubscription};
pub use dispatch::dispatcher::{AggregatePick, Dispatcher};
pub use foundation::error::{FleetError, FleetResult};
pub use foundation::geometry::{Point, Rect, Rectangle, Size, Vec2, Viewport};
pub use payload::patch::{Patch, apply_patches, apply_patches_to};
pub use payload::shard::{ShardSelector, chunk};
pub use pool::balancer::{BalancerDecision, BalancerOptions, FrameTimeThresholds, decide};
pub use pool::orchestrated::{OrchestratedPool, PoolConfig, StatsCallback, SurfaceFactory};
pub use proxy::channel::{ChannelFactory, ExecutionChannel, spawn_worker, worker_factory};
pub use proxy::client::{ExecutionProxy, ProxyOptions};
pub use proxy::host::WorkerOptions;
pub use render::controller::{ExecutionEnvironment, RendererController};
pub use render::factory::{FactoryOptions, ProfilingOptions, RendererControllerFactory};
pub use render::pick::PickFuture;
pub use render::registry::{RendererContext, RendererRegistry};
pub use render::renderer::{PickingOptions, PickingResult, RenderPayload, Renderer};
pub use render::surface::{DrawingSurface, HeadlessSurface, HostSurface, OffscreenCanvas};
pub use schedule::frame::{FrameQueue, NextFrame};
pub use schedule::scheduler::{RenderMode, Scheduler, SchedulerOptions};
pub use schedule::stats::{PerformanceStats, RenderingStats, StatsAccumulator};
