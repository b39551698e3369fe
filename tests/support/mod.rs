#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use renderfleet::{
    FleetError, FleetResult, HostSurface, Patch, PickFuture, PickingOptions, Renderer,
    RendererContext, RendererRegistry, Scheduler, Size, Viewport, apply_patches_to,
};
use serde_json::Value;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub items: Vec<u32>,
    #[serde(default)]
    pub label: String,
    /// Simulated cost of drawing this scene.
    #[serde(default)]
    pub frame_time_ms: u64,
}

impl Scene {
    pub fn with_items(count: u32) -> Self {
        Self {
            items: (0..count).collect(),
            ..Self::default()
        }
    }

    pub fn costing(mut self, frame_time_ms: u64) -> Self {
        self.frame_time_ms = frame_time_ms;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Size(Size),
    Viewport(Viewport),
    Visibility(bool),
    Render(Scene),
    Patches(usize),
    Dispose,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// `label` param of the backend, or the name of the thread it runs on.
    pub origin: String,
    pub call: Call,
}

#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<Event>>>);

impl Log {
    pub fn push(&self, origin: &str, call: Call) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Event {
                origin: origin.to_string(),
                call,
            });
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn calls_on(&self, origin: &str) -> Vec<Call> {
        self.events()
            .into_iter()
            .filter(|e| e.origin == origin)
            .map(|e| e.call)
            .collect()
    }

    pub fn renders_on(&self, origin: &str) -> Vec<Scene> {
        self.calls_on(origin)
            .into_iter()
            .filter_map(|c| match c {
                Call::Render(scene) => Some(scene),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, origin: &str, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls_on(origin).iter().filter(|c| pred(c)).count()
    }

    /// Poll `pred` against the log until it holds or [`WAIT`] passes.
    pub fn wait_for(&self, pred: impl Fn(&[Event]) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        loop {
            if pred(&self.events()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

/// Backend that records every call and otherwise does nothing but sleep for the scene's cost.
///
/// Params: `label` (origin override), `pick` (fixed pick result), `reject` (reject picks with
/// this message), `echoPick` (answer with the queried x), `pickDelayMs`.
pub struct Recorder {
    origin: String,
    log: Log,
    scheduler: Scheduler,
    scene: Option<Scene>,
    params: Value,
}

impl Recorder {
    pub fn construct(log: Log, ctx: RendererContext) -> FleetResult<Box<dyn Renderer<Scene>>> {
        let origin = ctx
            .params
            .get("label")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| std::thread::current().name().map(str::to_string))
            .unwrap_or_default();
        Ok(Box::new(Self {
            origin,
            log,
            scheduler: ctx.scheduler,
            scene: None,
            params: ctx.params,
        }))
    }

    fn record(&self, call: Call) {
        self.log.push(&self.origin, call);
    }
}

impl Renderer<Scene> for Recorder {
    fn render(&mut self, payload: Scene) -> FleetResult<()> {
        self.record(Call::Render(payload.clone()));
        let cost = Duration::from_millis(payload.frame_time_ms);
        self.scene = Some(payload);
        self.scheduler.schedule_render(move || std::thread::sleep(cost));
        Ok(())
    }

    fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()> {
        self.record(Call::Patches(patches.len()));
        if let Some(scene) = self.scene.as_mut() {
            apply_patches_to(scene, patches)?;
        }
        Ok(())
    }

    fn set_size(&mut self, size: Size) -> FleetResult<()> {
        self.record(Call::Size(size));
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> FleetResult<()> {
        self.record(Call::Viewport(viewport));
        Ok(())
    }

    fn set_visibility(&mut self, visible: bool) -> FleetResult<()> {
        self.record(Call::Visibility(visible));
        Ok(())
    }

    fn pick_objects(&mut self, options: &PickingOptions) -> PickFuture {
        if let Some(ms) = self.params.get("pickDelayMs").and_then(Value::as_u64) {
            std::thread::sleep(Duration::from_millis(ms));
        }
        if let Some(reason) = self.params.get("reject").and_then(Value::as_str) {
            return PickFuture::rejected(FleetError::rejected(reason));
        }
        if self.params.get("echoPick").is_some() {
            let x = match options {
                PickingOptions::Position { position } => position.x,
                PickingOptions::Area { rectangle } => rectangle.x,
            };
            return PickFuture::ready(vec![Value::from(x)]);
        }
        if let Some(Value::Array(fixed)) = self.params.get("pick") {
            return PickFuture::ready(fixed.clone());
        }
        let held = self
            .scene
            .iter()
            .flat_map(|s| s.items.iter().copied())
            .map(Value::from)
            .collect();
        PickFuture::ready(held)
    }

    fn dispose(&mut self) -> FleetResult<()> {
        self.record(Call::Dispose);
        self.scheduler.stop();
        Ok(())
    }
}

pub fn registry(log: &Log) -> Arc<RendererRegistry<Scene>> {
    let log = log.clone();
    Arc::new(
        RendererRegistry::new()
            .with("recorder", move |ctx| Recorder::construct(log.clone(), ctx)),
    )
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceState {
    pub transferred: bool,
    pub visible: Option<bool>,
    pub detached: bool,
}

/// Host surface whose state stays observable after it is handed to a proxy.
pub struct TestSurface {
    state: Arc<Mutex<SurfaceState>>,
    fail_transfer: bool,
}

#[derive(Clone)]
pub struct SurfaceHandle(Arc<Mutex<SurfaceState>>);

impl SurfaceHandle {
    pub fn state(&self) -> SurfaceState {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TestSurface {
    pub fn new() -> (Box<dyn HostSurface>, SurfaceHandle) {
        Self::build(false)
    }

    pub fn failing() -> (Box<dyn HostSurface>, SurfaceHandle) {
        Self::build(true)
    }

    fn build(fail_transfer: bool) -> (Box<dyn HostSurface>, SurfaceHandle) {
        let state = Arc::new(Mutex::new(SurfaceState::default()));
        let handle = SurfaceHandle(Arc::clone(&state));
        (
            Box::new(Self {
                state,
                fail_transfer,
            }),
            handle,
        )
    }

    fn with_state(&self, f: impl FnOnce(&mut SurfaceState)) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard);
    }
}

impl HostSurface for TestSurface {
    fn transfer_control(&mut self) -> FleetResult<Box<dyn renderfleet::DrawingSurface>> {
        if self.fail_transfer {
            return Err(FleetError::construction("surface is not transferable"));
        }
        let mut already = false;
        self.with_state(|s| {
            already = s.transferred;
            s.transferred = true;
        });
        if already {
            return Err(FleetError::construction("surface already transferred"));
        }
        Ok(Box::new(Size::ZERO))
    }

    fn set_visible(&mut self, visible: bool) {
        self.with_state(|s| s.visible = Some(visible));
    }

    fn detach(&mut self) {
        self.with_state(|s| s.detached = true);
    }
}

/// Surface factory that records a handle per created surface.
pub fn surfaces(handles: &Arc<Mutex<Vec<SurfaceHandle>>>) -> renderfleet::SurfaceFactory {
    let handles = Arc::clone(handles);
    Box::new(move |_index| {
        let (surface, handle) = TestSurface::new();
        handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(surface)
    })
}
