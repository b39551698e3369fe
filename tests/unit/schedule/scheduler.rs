use super::*;
use crate::schedule::frame::FrameQueue;
use std::cell::Cell;

fn queue() -> (FrameQueue, Rc<dyn NextFrame>) {
    let q = FrameQueue::new();
    let next: Rc<dyn NextFrame> = Rc::new(q.clone());
    (q, next)
}

fn counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
    let count = Rc::new(Cell::new(0));
    let c = Rc::clone(&count);
    (count, move || c.set(c.get() + 1))
}

#[test]
fn immediate_runs_synchronously() {
    let (q, next) = queue();
    let sched = Scheduler::new(RenderMode::Immediate, next);
    let (count, cb) = counter();
    sched.schedule_render(cb);
    assert_eq!(count.get(), 1);
    assert_eq!(q.pending(), 0);
}

#[test]
fn frame_bound_runs_once_on_next_frame() {
    let (q, next) = queue();
    let sched = Scheduler::new(RenderMode::FrameBound, next);
    let (count, cb) = counter();
    sched.schedule_render(cb);
    assert_eq!(count.get(), 0);
    assert_eq!(q.run_frame(), 1);
    assert_eq!(count.get(), 1);
    assert_eq!(q.run_frame(), 0);
    assert_eq!(count.get(), 1);
}

#[test]
fn continuous_replaces_captured_callback() {
    let (q, next) = queue();
    let sched = Scheduler::new(RenderMode::Continuous, next);
    let (first, cb1) = counter();
    let (second, cb2) = counter();

    sched.schedule_render(cb1);
    q.run_frame();
    q.run_frame();
    assert_eq!(first.get(), 2);

    sched.schedule_render(cb2);
    q.run_frame();
    q.run_frame();
    q.run_frame();
    assert_eq!(first.get(), 2);
    assert_eq!(second.get(), 3);
    // exactly one loop stays armed
    assert_eq!(q.pending(), 1);
}

#[test]
fn continuous_stops_on_stop_and_drop() {
    let (q, next) = queue();
    let sched = Scheduler::new(RenderMode::Continuous, next);
    let (count, cb) = counter();
    sched.schedule_render(cb);
    q.run_frame();
    sched.stop();
    q.run_frame();
    assert_eq!(count.get(), 1);
    assert_eq!(q.pending(), 0);

    let (again, cb) = counter();
    sched.schedule_render(cb);
    drop(sched);
    q.run_frame();
    assert_eq!(again.get(), 0);
}

#[test]
fn profiling_preserves_invocation_count_and_reports_per_window() {
    for mode in [
        RenderMode::Immediate,
        RenderMode::FrameBound,
        RenderMode::Continuous,
    ] {
        let (q, next) = queue();
        let reports = Rc::new(RefCell::new(Vec::<RenderingStats>::new()));
        let sink = Rc::clone(&reports);
        let sched = Scheduler::profiled(mode, next, 2, move |s| sink.borrow_mut().push(s));
        assert!(sched.is_profiled());

        let (count, _) = counter();
        for _ in 0..4 {
            let c = Rc::clone(&count);
            sched.schedule_render(move || c.set(c.get() + 1));
            q.run_frame();
        }
        sched.stop();
        q.run_frame();

        assert_eq!(count.get(), 4, "mode {mode:?}");
        assert_eq!(reports.borrow().len(), 2, "mode {mode:?}");
    }
}

#[test]
fn from_options_enables_profiling_only_with_window() {
    let (_q, next) = queue();
    let plain = Scheduler::from_options(&SchedulerOptions::default(), Rc::clone(&next), |_| {});
    assert!(!plain.is_profiled());
    assert_eq!(plain.mode(), RenderMode::FrameBound);

    let opts = SchedulerOptions {
        mode: RenderMode::Immediate,
        profiling_window: Some(5),
    };
    let profiled = Scheduler::from_options(&opts, next, |_| {});
    assert!(profiled.is_profiled());
    assert_eq!(profiled.mode(), RenderMode::Immediate);
}

#[test]
fn options_wire_shape() {
    let opts = SchedulerOptions {
        mode: RenderMode::Continuous,
        profiling_window: Some(60),
    };
    assert_eq!(
        serde_json::to_value(opts).unwrap(),
        serde_json::json!({"mode": "continuous", "profilingWindow": 60})
    );
}
