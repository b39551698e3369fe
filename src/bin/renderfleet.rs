use std::cell::RefCell;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use renderfleet::render::surface::downcast_surface;
use renderfleet::{
    BalancerOptions, ChannelBounds, Dispatcher, FactoryOptions, FleetResult, FrameQueue,
    HeadlessSurface, HostSurface, OffscreenCanvas, Patch, PickFuture, PickingOptions,
    ProfilingOptions, RenderMode, Renderer, RendererContext, RendererControllerFactory,
    RendererRegistry, RenderingStats, Scheduler, Size, SurfaceFactory, Viewport, WorkerOptions,
    apply_patches_to, worker_factory,
};

#[derive(Parser, Debug)]
#[command(name = "renderfleet", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive a self-scaling pool with a synthetic per-item workload and log its decisions.
    Simulate(SimulateArgs),
    /// Print the default balancer configuration as JSON.
    Defaults,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Number of items in the rendered payload.
    #[arg(long, default_value_t = 2_000)]
    items: u32,

    /// Simulated render cost per item, in microseconds.
    #[arg(long, default_value_t = 20)]
    cost_us: u64,

    /// Frames to render before picking and shutting down.
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Delay between frames on the control thread, in milliseconds.
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Balancer configuration JSON (defaults otherwise; `items` is always balanced).
    #[arg(long)]
    balancer: Option<PathBuf>,

    /// Override the balancing period, in milliseconds.
    #[arg(long)]
    frequency_ms: Option<u64>,

    /// Frames per profiling snapshot.
    #[arg(long, default_value_t = 30)]
    window: u32,

    /// Scheduling mode of the backends.
    #[arg(long, value_enum, default_value_t = ModeChoice::Immediate)]
    mode: ModeChoice,

    /// Render on the control thread instead of in background execution contexts.
    #[arg(long)]
    in_process: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeChoice {
    Immediate,
    FrameBound,
    Continuous,
}

impl From<ModeChoice> for RenderMode {
    fn from(mode: ModeChoice) -> Self {
        match mode {
            ModeChoice::Immediate => RenderMode::Immediate,
            ModeChoice::FrameBound => RenderMode::FrameBound,
            ModeChoice::Continuous => RenderMode::Continuous,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct Scene {
    items: Vec<u32>,
    frame: u64,
}

/// Backend whose frame cost grows linearly with the number of items it holds.
struct BusyRenderer {
    scheduler: Scheduler,
    canvas: Option<OffscreenCanvas>,
    scene: Rc<RefCell<Option<Scene>>>,
    cost_per_item: Duration,
    visible: bool,
}

impl BusyRenderer {
    fn construct(ctx: RendererContext) -> FleetResult<Box<dyn Renderer<Scene>>> {
        let cost_us = ctx
            .params
            .get("costMicros")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(20);
        let canvas = ctx
            .surface
            .map(downcast_surface::<OffscreenCanvas>)
            .transpose()?
            .map(|c| *c);
        Ok(Box::new(Self {
            scheduler: ctx.scheduler,
            canvas,
            scene: Rc::new(RefCell::new(None)),
            cost_per_item: Duration::from_micros(cost_us),
            visible: true,
        }))
    }

    fn draw(&self) {
        if !self.visible {
            return;
        }
        let scene = Rc::clone(&self.scene);
        let cost = self.cost_per_item;
        self.scheduler.schedule_render(move || {
            let items = scene.borrow().as_ref().map_or(0, |s| s.items.len());
            std::thread::sleep(cost * items as u32);
        });
    }
}

impl Renderer<Scene> for BusyRenderer {
    fn render(&mut self, payload: Scene) -> FleetResult<()> {
        *self.scene.borrow_mut() = Some(payload);
        self.draw();
        Ok(())
    }

    fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()> {
        if let Some(scene) = self.scene.borrow_mut().as_mut() {
            apply_patches_to(scene, patches)?;
        }
        self.draw();
        Ok(())
    }

    fn set_size(&mut self, size: Size) -> FleetResult<()> {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.size = size;
        }
        Ok(())
    }

    fn set_viewport(&mut self, _viewport: Viewport) -> FleetResult<()> {
        self.draw();
        Ok(())
    }

    fn set_visibility(&mut self, visible: bool) -> FleetResult<()> {
        self.visible = visible;
        Ok(())
    }

    fn pick_objects(&mut self, options: &PickingOptions) -> PickFuture {
        let hit = |item: u32| match options {
            PickingOptions::Position { position } => f64::from(item) == position.x.floor(),
            PickingOptions::Area { rectangle } => {
                let x = f64::from(item);
                x >= rectangle.x && x < rectangle.x + rectangle.width
            }
        };
        let scene = self.scene.borrow();
        let picked = scene
            .iter()
            .flat_map(|s| s.items.iter().copied())
            .filter(|&item| hit(item))
            .map(serde_json::Value::from)
            .collect();
        PickFuture::ready(picked)
    }

    fn dispose(&mut self) -> FleetResult<()> {
        self.scheduler.stop();
        Ok(())
    }
}

fn load_balancer(args: &SimulateArgs) -> anyhow::Result<BalancerOptions> {
    let mut options = match &args.balancer {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("open balancer config '{}'", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parse balancer config '{}'", path.display()))?
        }
        None => BalancerOptions::default(),
    };
    if let Some(frequency_ms) = args.frequency_ms {
        options.frequency_ms = frequency_ms;
    }
    if !options.balanced_fields.iter().any(|f| f == "items") {
        options.balanced_fields.push("items".to_string());
    }
    options.validate().context("invalid balancer config")?;
    Ok(options)
}

fn simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let balancer = load_balancer(&args)?;
    let registry = Arc::new(RendererRegistry::new().with("busy", BusyRenderer::construct));

    let options = FactoryOptions {
        render_mode: args.mode.into(),
        remote_execution: !args.in_process,
        profiling: Some(ProfilingOptions {
            window: args.window,
            on_stats: Arc::new(|id: &str, stats: &[RenderingStats]| {
                let mean = stats.iter().map(|s| s.average_frame_time).sum::<f64>()
                    / stats.len().max(1) as f64;
                tracing::info!(renderer = id, executors = stats.len(), mean_ms = mean, "stats");
            }),
        }),
        request_timeout: Some(Duration::from_secs(5)),
    };
    let frames = FrameQueue::new();
    let factory = RendererControllerFactory::new(
        Arc::clone(&registry),
        Rc::new(frames.clone()),
        options,
    )
    .with_channel_factory(worker_factory(registry, WorkerOptions::default()));

    let surfaces: SurfaceFactory = Box::new(|index: usize| {
        Ok(Box::new(HeadlessSurface::new(format!("layer-{index}"))) as Box<dyn HostSurface>)
    });
    let controller = factory
        .create_orchestrated_if_remote_available(
            "scene",
            "busy",
            serde_json::json!({ "costMicros": args.cost_us }),
            surfaces,
            balancer,
            true,
        )
        .context("create pool")?;
    tracing::info!(environment = ?controller.environment(), "renderer created");

    let mut bounds = ChannelBounds::new();
    let mut dispatcher = Dispatcher::new(vec![controller], &mut bounds)
        .on_ready(|| tracing::info!("dispatcher ready"));
    bounds.report(Size::new(1280.0, 720.0));

    let items: Vec<u32> = (0..args.items).collect();
    for frame in 0..args.frames {
        dispatcher.poll();
        dispatcher.render(Scene {
            items: items.clone(),
            frame,
        });
        frames.run_frame();
        std::thread::sleep(Duration::from_millis(args.frame_ms));
    }

    let picked = dispatcher
        .pick_objects(&PickingOptions::at(42.0, 0.0))
        .wait_timeout(Duration::from_secs(5));
    println!("picked at x=42: {picked:?}");

    dispatcher.dispose().context("dispose dispatcher")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => simulate(args),
        Command::Defaults => {
            let json = serde_json::to_string_pretty(&BalancerOptions::default())
                .context("serialize defaults")?;
            println!("{json}");
            Ok(())
        }
    }
}
