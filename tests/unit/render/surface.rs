use super::*;

#[test]
fn headless_surface_transfers_once() {
    let mut surface = HeadlessSurface::new("layer-0");
    let canvas = surface.transfer_control().unwrap();
    let canvas = downcast_surface::<OffscreenCanvas>(canvas).unwrap();
    assert_eq!(canvas.label, "layer-0");

    let err = surface.transfer_control().err().unwrap();
    assert!(matches!(err, FleetError::Construction(_)));
}

#[test]
fn headless_surface_tracks_visibility_and_detach() {
    let mut surface = HeadlessSurface::new("x");
    assert!(surface.is_visible());
    surface.set_visible(false);
    assert!(!surface.is_visible());
    assert!(surface.is_attached());
    surface.detach();
    assert!(!surface.is_attached());
}

#[test]
fn downcast_to_wrong_type_is_rejected() {
    let surface: Box<dyn DrawingSurface> = Box::new(42u32);
    assert!(downcast_surface::<String>(surface).is_err());
}
