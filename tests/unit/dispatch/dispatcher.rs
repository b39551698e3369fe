use super::*;
use crate::dispatch::bounds::ChannelBounds;
use crate::render::controller::ExecutionEnvironment;
use crate::render::renderer::Renderer;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

type Journal = Rc<RefCell<Vec<String>>>;

struct Fake {
    name: &'static str,
    journal: Journal,
    pick: FleetResult<Vec<PickingResult>>,
}

impl Fake {
    fn note(&self, what: impl std::fmt::Display) {
        self.journal.borrow_mut().push(format!("{}:{what}", self.name));
    }
}

impl Renderer<u32> for Fake {
    fn render(&mut self, payload: u32) -> FleetResult<()> {
        self.note(format!("render {payload}"));
        Ok(())
    }
    fn render_patches(&mut self, patches: &[Patch]) -> FleetResult<()> {
        self.note(format!("patches {}", patches.len()));
        Ok(())
    }
    fn set_size(&mut self, size: Size) -> FleetResult<()> {
        self.note(format!("size {}x{}", size.width, size.height));
        Ok(())
    }
    fn set_viewport(&mut self, viewport: Viewport) -> FleetResult<()> {
        self.note(format!("zoom {}", viewport.zoom));
        Ok(())
    }
    fn set_visibility(&mut self, visible: bool) -> FleetResult<()> {
        self.note(format!("visible {visible}"));
        Ok(())
    }
    fn pick_objects(&mut self, _options: &PickingOptions) -> PickFuture {
        match &self.pick {
            Ok(items) => PickFuture::ready(items.clone()),
            Err(err) => PickFuture::rejected(FleetError::rejected(err.to_string())),
        }
    }
    fn dispose(&mut self) -> FleetResult<()> {
        self.note("dispose");
        Ok(())
    }
}

fn controller(
    name: &'static str,
    journal: &Journal,
    pick: FleetResult<Vec<PickingResult>>,
) -> RendererController<u32> {
    let fake = Fake {
        name,
        journal: Rc::clone(journal),
        pick,
    };
    RendererController::new(name, Box::new(fake), ExecutionEnvironment::InProcess, true).unwrap()
}

fn setup() -> (Dispatcher<u32>, ChannelBounds, Journal) {
    let journal: Journal = Rc::default();
    let mut bounds = ChannelBounds::new();
    let dispatcher = Dispatcher::new(
        vec![
            controller("a", &journal, Ok(vec![json!("a")])),
            controller("b", &journal, Ok(vec![json!("b")])),
        ],
        &mut bounds,
    );
    journal.borrow_mut().clear();
    (dispatcher, bounds, journal)
}

#[test]
fn not_ready_until_first_size() {
    let (mut d, mut bounds, journal) = setup();
    d.render(1);
    d.render(2);
    d.render_patches(&[Patch::field("x", json!(1))]);
    d.poll();
    assert!(!d.is_ready());
    assert!(journal.borrow().is_empty());

    bounds.report(Size::new(2.0, 1.0));
    d.poll();
    assert!(d.is_ready());
    assert_eq!(
        *journal.borrow(),
        vec!["a:size 2x1", "b:size 2x1", "a:render 2", "b:render 2"]
    );
}

#[test]
fn ready_callback_fires_once() {
    let (d, mut bounds, _journal) = setup();
    let fired = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&fired);
    let mut d = d.on_ready(move || *counter.borrow_mut() += 1);
    bounds.report(Size::new(1.0, 1.0));
    bounds.report(Size::new(2.0, 2.0));
    d.poll();
    d.resize(Size::new(3.0, 3.0));
    assert_eq!(*fired.borrow(), 1);
}

#[test]
fn viewport_and_patches_fan_out_after_ready() {
    let (mut d, _bounds, journal) = setup();
    d.resize(Size::new(1.0, 1.0));
    journal.borrow_mut().clear();
    d.set_viewport(Viewport::default().zoom_at(2.0, crate::foundation::geometry::Point::ZERO));
    d.render_patches(&[Patch::field("x", json!(1))]);
    assert_eq!(
        *journal.borrow(),
        vec!["a:zoom 2", "b:zoom 2", "a:patches 1", "b:patches 1"]
    );
}

#[test]
fn pick_concatenates_in_order_and_drops_rejections() {
    let journal: Journal = Rc::default();
    let mut bounds = ChannelBounds::new();
    let mut d = Dispatcher::new(
        vec![
            controller("a", &journal, Ok(vec![json!("a")])),
            controller("x", &journal, Err(FleetError::rejected("down"))),
            controller("b", &journal, Ok(vec![json!("b")])),
        ],
        &mut bounds,
    );
    let picked = d.pick_objects(&PickingOptions::at(10.0, 10.0)).wait();
    assert_eq!(picked, vec![json!("a"), json!("b")]);

    let settled = d
        .pick_objects(&PickingOptions::at(10.0, 10.0))
        .wait_timeout(Duration::from_secs(1));
    assert_eq!(settled.len(), 2);
}

#[test]
fn dispose_disposes_each_controller_once_and_unsubscribes() {
    let (d, mut bounds, journal) = setup();
    d.dispose().unwrap();
    assert_eq!(*journal.borrow(), vec!["a:dispose", "b:dispose"]);
    assert_eq!(bounds.subscriber_count(), 0);
    bounds.report(Size::new(1.0, 1.0));
    assert_eq!(journal.borrow().len(), 2);
}

#[test]
fn set_enabled_unknown_id_is_an_error() {
    let (mut d, _bounds, journal) = setup();
    d.set_enabled("b", false).unwrap();
    assert_eq!(*journal.borrow(), vec!["b:visible false"]);
    assert!(d.set_enabled("zzz", true).is_err());
    d.resize(Size::new(1.0, 1.0));
    d.render(5);
    assert!(journal.borrow().contains(&"a:render 5".to_string()));
    assert!(!journal.borrow().contains(&"b:render 5".to_string()));
}
