use super::*;
use crate::foundation::geometry::{Point, Rectangle};
use crate::schedule::scheduler::RenderMode;
use serde_json::json;

#[test]
fn requests_use_message_type_tag() {
    let frame = encode(&ProxyRequest::PickObjects {
        id: 7,
        data: PickingOptions::Position {
            position: Point::new(10.0, 10.0),
        },
    })
    .unwrap();
    let value: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(
        value,
        json!({
            "messageType": "pickObjects",
            "id": 7,
            "data": {"mode": "position", "position": {"x": 10.0, "y": 10.0}}
        })
    );
}

#[test]
fn construction_message_carries_type_params_and_scheduler() {
    let frame = json!({
        "messageType": "createRenderer",
        "data": {
            "rendererType": "points",
            "params": {"radius": 2},
            "scheduler": {"mode": "continuous", "profilingWindow": 30}
        }
    })
    .to_string();
    let request: ProxyRequest = decode(&frame).unwrap();
    assert_eq!(
        request,
        ProxyRequest::CreateRenderer {
            data: CreateRenderer {
                renderer_type: "points".to_string(),
                params: json!({"radius": 2}),
                scheduler: SchedulerOptions {
                    mode: RenderMode::Continuous,
                    profiling_window: Some(30),
                },
            }
        }
    );
    assert_eq!(request.message_type(), "createRenderer");
}

#[test]
fn fire_and_forget_messages_decode() {
    let cases = [
        (json!({"messageType": "setSize", "data": {"width": 4.0, "height": 3.0}}), "setSize"),
        (json!({"messageType": "setVisibility", "data": false}), "setVisibility"),
        (
            json!({"messageType": "setViewport", "data": {"position": {"x": 1.0, "y": 2.0}, "zoom": 2.0}}),
            "setViewport",
        ),
        (
            json!({"messageType": "renderPatches", "data": [{"path": "items", "op": "add", "values": [1]}]}),
            "renderPatches",
        ),
        (json!({"messageType": "render", "data": {"items": []}}), "render"),
        (json!({"messageType": "dispose", "id": 3}), "dispose"),
    ];
    for (frame, kind) in cases {
        let request: ProxyRequest = decode(&frame.to_string()).unwrap();
        assert_eq!(request.message_type(), kind);
    }
}

#[test]
fn replies_carry_resolution() {
    let fulfilled = ProxyReply::PickObjects {
        id: 1,
        result: Resolution::from(Ok(vec![json!("a")])),
    };
    assert_eq!(
        serde_json::to_value(&fulfilled).unwrap(),
        json!({
            "messageType": "pickObjects",
            "id": 1,
            "result": {"resolution": "fulfilled", "value": ["a"]}
        })
    );

    let rejected: ProxyReply = decode(
        &json!({
            "messageType": "dispose",
            "id": 2,
            "result": {"resolution": "rejected", "error": "busy"}
        })
        .to_string(),
    )
    .unwrap();
    let ProxyReply::Dispose { id, result } = rejected else {
        panic!("expected dispose reply");
    };
    assert_eq!(id, 2);
    assert!(matches!(result.into_result(), Err(FleetError::Rejected(msg)) if msg == "busy"));
}

#[test]
fn dispose_ack_round_trips_unit_value() {
    let ack = ProxyReply::Dispose {
        id: 9,
        result: Resolution::Fulfilled { value: () },
    };
    let back: ProxyReply = decode(&encode(&ack).unwrap()).unwrap();
    assert_eq!(back, ack);
}

#[test]
fn area_picking_options_use_rectangle() {
    let options = PickingOptions::area(Rectangle::new(1.0, 2.0, 3.0, 4.0));
    assert_eq!(
        serde_json::to_value(options).unwrap(),
        json!({"mode": "area", "rectangle": {"x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0}})
    );
}

#[test]
fn unknown_message_type_is_a_protocol_error() {
    let err = decode::<ProxyRequest>(r#"{"messageType":"explode"}"#).unwrap_err();
    assert!(matches!(err, FleetError::Protocol(_)));
    let err = decode::<ProxyReply>("not json").unwrap_err();
    assert!(matches!(err, FleetError::Protocol(_)));
}

#[test]
#[should_panic(expected = "unhandled message variant")]
fn unhandled_variant_panics() {
    unhandled_variant("test", &FleetError::protocol("bad"));
}
