use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use crate::schedule::frame::NextFrame;
use crate::schedule::stats::{RenderingStats, StatsAccumulator};

/// When a scheduled render callback runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    /// Run synchronously inside `schedule_render`.
    Immediate,
    /// Run once at the next frame boundary.
    #[default]
    FrameBound,
    /// Run the most recently registered callback on every frame.
    Continuous,
}

/// Scheduler configuration; travels inside the proxy construction message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerOptions {
    /// Scheduling variant.
    pub mode: RenderMode,
    /// Enable frame-time profiling, reporting every `n` frames.
    pub profiling_window: Option<u32>,
}

/// Callback invoked by the scheduler to produce a frame.
pub type RenderCallback = Box<dyn FnMut() + 'static>;

/// Receiver for profiling snapshots.
pub type StatsSink = Box<dyn FnMut(RenderingStats) + 'static>;

/// Per-instance render scheduler.
///
/// Cloning yields another handle to the same scheduler. A scheduler belongs to the thread that
/// drives its [`NextFrame`] primitive.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

struct Inner {
    mode: RenderMode,
    next_frame: Rc<dyn NextFrame>,
    profiler: Option<RefCell<Profiler>>,
    continuous: RefCell<Continuous>,
}

struct Profiler {
    acc: StatsAccumulator,
    sink: StatsSink,
}

#[derive(Default)]
struct Continuous {
    callback: Option<Rc<RefCell<RenderCallback>>>,
    armed: bool,
}

impl Scheduler {
    /// Scheduler without profiling.
    pub fn new(mode: RenderMode, next_frame: Rc<dyn NextFrame>) -> Self {
        Self::build(mode, next_frame, None)
    }

    /// Scheduler that times every invocation and reports a snapshot every `window` frames.
    pub fn profiled(
        mode: RenderMode,
        next_frame: Rc<dyn NextFrame>,
        window: u32,
        sink: impl FnMut(RenderingStats) + 'static,
    ) -> Self {
        let profiler = Profiler {
            acc: StatsAccumulator::new(window),
            sink: Box::new(sink),
        };
        Self::build(mode, next_frame, Some(profiler))
    }

    /// Build from serialized options; `sink` is only used when profiling is enabled.
    pub fn from_options(
        options: &SchedulerOptions,
        next_frame: Rc<dyn NextFrame>,
        sink: impl FnMut(RenderingStats) + 'static,
    ) -> Self {
        match options.profiling_window {
            Some(window) => Self::profiled(options.mode, next_frame, window, sink),
            None => Self::new(options.mode, next_frame),
        }
    }

    fn build(mode: RenderMode, next_frame: Rc<dyn NextFrame>, profiler: Option<Profiler>) -> Self {
        Self {
            inner: Rc::new(Inner {
                mode,
                next_frame,
                profiler: profiler.map(RefCell::new),
                continuous: RefCell::new(Continuous::default()),
            }),
        }
    }

    /// Scheduling variant of this instance.
    pub fn mode(&self) -> RenderMode {
        self.inner.mode
    }

    /// Return `true` when invocations are timed.
    pub fn is_profiled(&self) -> bool {
        self.inner.profiler.is_some()
    }

    /// Schedule `callback` according to [`Scheduler::mode`].
    pub fn schedule_render(&self, callback: impl FnMut() + 'static) {
        let mut callback: RenderCallback = Box::new(callback);
        match self.inner.mode {
            RenderMode::Immediate => self.inner.invoke(&mut *callback),
            RenderMode::FrameBound => {
                let inner = Rc::clone(&self.inner);
                self.inner
                    .next_frame
                    .request_frame(Box::new(move || inner.invoke(&mut *callback)));
            }
            RenderMode::Continuous => {
                let mut state = self.inner.continuous.borrow_mut();
                state.callback = Some(Rc::new(RefCell::new(callback)));
                if !state.armed {
                    state.armed = true;
                    drop(state);
                    arm_continuous(&self.inner);
                }
            }
        }
    }

    /// Drop the captured continuous callback; the frame loop winds down on its next frame.
    pub fn stop(&self) {
        self.inner.continuous.borrow_mut().callback = None;
    }
}

impl Inner {
    fn invoke(&self, callback: &mut dyn FnMut()) {
        let Some(profiler) = &self.profiler else {
            callback();
            return;
        };
        let start = Instant::now();
        callback();
        let elapsed = start.elapsed();

        let mut guard = profiler.borrow_mut();
        let profiler = &mut *guard;
        if let Some(stats) = profiler.acc.record(elapsed) {
            (profiler.sink)(stats);
        }
    }
}

fn arm_continuous(inner: &Rc<Inner>) {
    let weak = Rc::downgrade(inner);
    inner.next_frame.request_frame(Box::new(move || {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let current = inner.continuous.borrow().callback.clone();
        let Some(current) = current else {
            inner.continuous.borrow_mut().armed = false;
            return;
        };
        {
            let mut callback = current.borrow_mut();
            inner.invoke(&mut **callback);
        }
        arm_continuous(&inner);
    }));
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;
