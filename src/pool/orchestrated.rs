use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;

use crate::foundation::error::{FleetError, FleetResult};
use crate::foundation::geometry::{Size, Viewport};
use crate::payload::patch::{Patch, apply_patches};
use crate::payload::shard::{BalancedFields, ShardSelector, shard_selectors};
use crate::pool::balancer::{BalancerDecision, BalancerOptions, decide};
use crate::proxy::channel::ChannelFactory;
use crate::proxy::client::{ExecutionProxy, ProxyOptions, StatsListener};
use crate::render::pick::PickFuture;
use crate::render::renderer::{PickingOptions, RenderPayload, Renderer};
use crate::render::surface::HostSurface;
use crate::schedule::stats::{DEFAULT_STATS_WINDOW, PerformanceStats, RenderingStats};

/// Host-supplied constructor of the placeholder surface for member `index`.
pub type SurfaceFactory = Box<dyn FnMut(usize) -> FleetResult<Box<dyn HostSurface>>>;

/// Receives per-member profiling snapshots, keyed by renderer id.
pub type StatsCallback = Arc<dyn Fn(&str, &[RenderingStats]) + Send + Sync>;

/// Static pool configuration.
#[derive(Clone)]
pub struct PoolConfig {
    /// Renderer id; member channels are named `"{id}_{index}"`.
    pub id: String,
    pub renderer_type: String,
    pub params: Value,
    pub balancer: BalancerOptions,
    pub proxy: ProxyOptions,
    pub on_stats: Option<StatsCallback>,
}

impl PoolConfig {
    pub fn new(id: impl Into<String>, renderer_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            renderer_type: renderer_type.into(),
            params: Value::Null,
            balancer: BalancerOptions::default(),
            proxy: ProxyOptions::default(),
            on_stats: None,
        }
    }
}

enum PoolEvent {
    Stats { serial: u64, stats: RenderingStats },
    Tick,
}

struct PoolMember {
    serial: u64,
    proxy: ExecutionProxy,
    selector: ShardSelector,
    profile_stats: Option<PerformanceStats>,
    balancer_stats: PerformanceStats,
}

#[derive(Debug)]
struct ReplicatedState {
    payload: Option<Value>,
    size: Option<Size>,
    viewport: Option<Viewport>,
    visible: bool,
}

/// Background thread that enqueues a balancing tick every period.
struct Ticker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    fn spawn(name: String, period: Duration, events: Sender<PoolEvent>) -> FleetResult<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            if events.send(PoolEvent::Tick).is_err() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|err| FleetError::construction(format!("cannot start balancer: {err}")))?;
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.stop = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Dispose `member` and remove its host placeholder.
fn retire(member: &mut PoolMember) {
    if let Err(err) = member.proxy.dispose() {
        tracing::warn!(member = member.proxy.name(), error = %err, "member dispose failed");
    }
    member.proxy.detach_surface();
}

/// One logical renderer backed by N proxied executors, each rendering a shard of the payload.
///
/// N starts at `min_executors` and moves by one per balancing round according to the mean frame
/// time the members report. All events (stats, ticks) are processed on the control thread in
/// [`OrchestratedPool::poll`], which every public call runs first.
pub struct OrchestratedPool<P> {
    config: PoolConfig,
    fields: BalancedFields,
    channels: ChannelFactory,
    surfaces: SurfaceFactory,
    members: Vec<PoolMember>,
    next_serial: u64,
    state: ReplicatedState,
    events_tx: Sender<PoolEvent>,
    events_rx: Receiver<PoolEvent>,
    ticker: Option<Ticker>,
    disposed: bool,
    _payload: PhantomData<fn(P)>,
}

impl<P: RenderPayload> OrchestratedPool<P> {
    /// Start `min_executors` members and the balancing ticker.
    #[tracing::instrument(skip_all, fields(pool = %config.id))]
    pub fn new(
        mut config: PoolConfig,
        channels: ChannelFactory,
        surfaces: SurfaceFactory,
    ) -> FleetResult<Self> {
        config.balancer.validate()?;
        if config.proxy.scheduler.profiling_window.is_none() {
            config.proxy.scheduler.profiling_window = Some(DEFAULT_STATS_WINDOW);
        }

        let (events_tx, events_rx) = mpsc::channel();
        let fields = config.balancer.fields();
        let mut pool = Self {
            config,
            fields,
            channels,
            surfaces,
            members: Vec::new(),
            next_serial: 0,
            state: ReplicatedState {
                payload: None,
                size: None,
                viewport: None,
                visible: true,
            },
            events_tx,
            events_rx,
            ticker: None,
            disposed: false,
            _payload: PhantomData,
        };

        let initial = pool.config.balancer.min_executors;
        for selector in shard_selectors(initial, &pool.fields) {
            let member = pool.spawn_member(selector)?;
            pool.members.push(member);
        }
        pool.ticker = Some(Ticker::spawn(
            format!("{}-balancer", pool.config.id),
            pool.config.balancer.frequency(),
            pool.events_tx.clone(),
        )?);
        tracing::info!(members = initial, "pool started");
        Ok(pool)
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Members with at least one stats report since the last balancing round.
    pub fn reported_members(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.balancer_stats.frames_count > 0)
            .count()
    }

    fn spawn_member(&mut self, selector: ShardSelector) -> FleetResult<PoolMember> {
        let index = selector.index();
        let name = format!("{}_{}", self.config.id, index);
        let surface = (self.surfaces)(index)?;
        let channel = (self.channels)(&name)?;

        let serial = self.next_serial;
        self.next_serial += 1;
        let events = self.events_tx.clone();
        let listener: StatsListener = Box::new(move |stats| {
            let _ = events.send(PoolEvent::Stats { serial, stats });
        });

        let proxy = ExecutionProxy::spawn(
            channel,
            surface,
            &self.config.renderer_type,
            self.config.params.clone(),
            self.config.proxy.clone(),
            Some(listener),
        )?;
        let mut member = PoolMember {
            serial,
            proxy,
            selector,
            profile_stats: None,
            balancer_stats: PerformanceStats::default(),
        };
        let warmed = self.warm(&mut member.proxy, &member.selector);
        if let Err(err) = warmed {
            retire(&mut member);
            return Err(err);
        }
        Ok(member)
    }

    /// Replay the replicated state onto a member that is not yet admitted.
    fn warm(&self, proxy: &mut ExecutionProxy, selector: &ShardSelector) -> FleetResult<()> {
        if let Some(size) = self.state.size {
            proxy.set_size(size)?;
        }
        if let Some(viewport) = self.state.viewport {
            proxy.set_viewport(viewport)?;
        }
        proxy.set_visibility(self.state.visible)?;
        if let Some(payload) = &self.state.payload {
            proxy.render_value(selector.select(payload))?;
        }
        Ok(())
    }

    fn each_member(
        &mut self,
        mut f: impl FnMut(&mut PoolMember) -> FleetResult<()>,
    ) -> FleetResult<()> {
        let mut first_err = None;
        for member in &mut self.members {
            if let Err(err) = f(member) {
                tracing::warn!(member = member.proxy.name(), error = %err, "member call failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn ensure_live(&self) -> FleetResult<()> {
        if self.disposed {
            return Err(FleetError::disconnected(format!(
                "pool '{}' is disposed",
                self.config.id
            )));
        }
        Ok(())
    }

    /// Process queued stats and ticks; runs a balancing round on tick.
    pub fn poll(&mut self) -> FleetResult<()> {
        let mut ticked = false;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                PoolEvent::Stats { serial, stats } => self.update_stats(serial, stats),
                PoolEvent::Tick => ticked = true,
            }
        }
        if ticked && !self.disposed {
            self.balance(false)?;
        }
        Ok(())
    }

    /// Drain pending stats and run a balancing round now, even if some members never reported.
    pub fn balance_now(&mut self) -> FleetResult<()> {
        self.ensure_live()?;
        while let Ok(event) = self.events_rx.try_recv() {
            if let PoolEvent::Stats { serial, stats } = event {
                self.update_stats(serial, stats);
            }
        }
        self.balance(true)
    }

    fn balance(&mut self, forced: bool) -> FleetResult<()> {
        if !forced && self.reported_members() < self.members.len() {
            tracing::debug!(
                reported = self.reported_members(),
                members = self.members.len(),
                "waiting for every member to report"
            );
            return Ok(());
        }
        let stats: Vec<PerformanceStats> =
            self.members.iter().map(|m| m.balancer_stats).collect();
        let decision = decide(&stats, &self.config.balancer);
        for member in &mut self.members {
            member.balancer_stats = PerformanceStats::default();
        }
        match decision {
            BalancerDecision::Keep => Ok(()),
            BalancerDecision::Rebalance { selectors } => self.resize_pool(selectors),
        }
    }

    fn update_stats(&mut self, serial: u64, stats: RenderingStats) {
        let Some(member) = self.members.iter_mut().find(|m| m.serial == serial) else {
            tracing::trace!(serial, "ignoring stats from a retired member");
            return;
        };
        member.balancer_stats.accumulate(&stats);
        member
            .profile_stats
            .get_or_insert_with(PerformanceStats::default)
            .accumulate(&stats);
        self.notify_profiler();
    }

    /// Report one snapshot per member once every member has profiling data, then start over.
    fn notify_profiler(&mut self) {
        if self.members.iter().any(|m| m.profile_stats.is_none()) {
            return;
        }
        let snapshots: Vec<RenderingStats> = self
            .members
            .iter_mut()
            .filter_map(|m| m.profile_stats.take())
            .map(|s| s.snapshot())
            .collect();
        if let Some(on_stats) = &self.config.on_stats {
            on_stats(&self.config.id, &snapshots);
        }
    }

    /// Move to `selectors.len()` members: new members are warmed before they are admitted,
    /// surplus members are removed from the tail after their disposal completes, and survivors
    /// re-render with their new shard.
    #[tracing::instrument(skip_all, fields(pool = %self.config.id))]
    fn resize_pool(&mut self, selectors: Vec<ShardSelector>) -> FleetResult<()> {
        let current = self.members.len();
        let target = selectors.len();
        tracing::info!(from = current, to = target, "resizing pool");

        let mut staged = Vec::new();
        for selector in selectors.iter().skip(current) {
            match self.spawn_member(selector.clone()) {
                Ok(member) => staged.push(member),
                Err(err) => {
                    tracing::warn!(error = %err, members = current, "cannot grow pool");
                    for mut member in staged {
                        retire(&mut member);
                    }
                    return Err(err);
                }
            }
        }
        self.members.append(&mut staged);
        while self.members.len() > target {
            let Some(mut member) = self.members.pop() else {
                break;
            };
            retire(&mut member);
        }

        for (member, selector) in self.members.iter_mut().zip(selectors).take(current) {
            member.selector = selector;
        }
        let Some(payload) = self.state.payload.clone() else {
            return Ok(());
        };
        let mut first_err = None;
        for member in self.members.iter_mut().take(current) {
            if let Err(err) = member.proxy.render_value(member.selector.select(&payload)) {
                tracing::warn!(member = member.proxy.name(), error = %err, "member re-shard failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn render(&mut self, payload: P) -> FleetResult<()> {
        self.ensure_live()?;
        self.poll()?;
        let value = serde_json::to_value(&payload)?;
        self.state.payload = Some(value.clone());
        self.each_member(|m| m.proxy.render_value(m.selector.select(&value)))
    }

    /// Apply `patches` to the replicated payload, then route them: the first member receives
    /// every patch, the others every patch except appends to balanced fields.
    ///
    /// The batch is all-or-nothing: if any patch fails, neither the replicated payload nor any
    /// member sees it.
    pub fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()> {
        self.ensure_live()?;
        self.poll()?;
        let Some(mirror) = self.state.payload.as_ref() else {
            tracing::warn!("dropping patches received before the first render");
            return Ok(());
        };
        let mut patched = mirror.clone();
        apply_patches(&mut patched, patches)?;
        self.state.payload = Some(patched);

        let fields = Arc::clone(&self.fields);
        let shared: Vec<Patch> = patches
            .iter()
            .filter(|p| !(p.is_array_add() && fields.iter().any(|f| f == p.path())))
            .cloned()
            .collect();
        let mut first = true;
        self.each_member(|m| {
            let routed = if std::mem::take(&mut first) {
                patches
            } else {
                shared.as_slice()
            };
            if routed.is_empty() {
                Ok(())
            } else {
                m.proxy.render_patches(routed)
            }
        })
    }

    pub fn set_size(&mut self, size: Size) -> FleetResult<()> {
        self.ensure_live()?;
        self.poll()?;
        self.state.size = Some(size);
        self.each_member(|m| m.proxy.set_size(size))
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> FleetResult<()> {
        self.ensure_live()?;
        self.poll()?;
        self.state.viewport = Some(viewport);
        self.each_member(|m| m.proxy.set_viewport(viewport))
    }

    pub fn set_visibility(&mut self, visible: bool) -> FleetResult<()> {
        self.ensure_live()?;
        self.poll()?;
        self.state.visible = visible;
        self.each_member(|m| m.proxy.set_visibility(visible))
    }

    /// Query every member; the pool's result is their concatenation in member order.
    pub fn pick_objects(&mut self, options: &PickingOptions) -> PickFuture {
        if let Err(err) = self.ensure_live().and_then(|()| self.poll()) {
            return PickFuture::rejected(err);
        }
        let parts = self
            .members
            .iter_mut()
            .map(|m| m.proxy.pick_objects(options))
            .collect();
        PickFuture::all(parts)
    }

    /// Stop balancing and dispose every member. Later calls are no-ops.
    #[tracing::instrument(skip_all, fields(pool = %self.config.id))]
    pub fn dispose(&mut self) -> FleetResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
        let result = self.each_member(|m| {
            let disposed = m.proxy.dispose();
            m.proxy.detach_surface();
            disposed
        });
        self.members.clear();
        tracing::info!("pool disposed");
        result
    }
}

impl<P: RenderPayload> Renderer<P> for OrchestratedPool<P> {
    fn render(&mut self, payload: P) -> FleetResult<()> {
        OrchestratedPool::render(self, payload)
    }

    fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()> {
        OrchestratedPool::render_patches(self, patches)
    }

    fn set_size(&mut self, size: Size) -> FleetResult<()> {
        OrchestratedPool::set_size(self, size)
    }

    fn set_viewport(&mut self, viewport: Viewport) -> FleetResult<()> {
        OrchestratedPool::set_viewport(self, viewport)
    }

    fn set_visibility(&mut self, visible: bool) -> FleetResult<()> {
        OrchestratedPool::set_visibility(self, visible)
    }

    fn pick_objects(&mut self, options: &PickingOptions) -> PickFuture {
        OrchestratedPool::pick_objects(self, options)
    }

    fn dispose(&mut self) -> FleetResult<()> {
        OrchestratedPool::dispose(self)
    }

    fn poll(&mut self) {
        if let Err(err) = OrchestratedPool::poll(self) {
            tracing::warn!(pool = %self.config.id, error = %err, "pool poll failed");
        }
    }
}
