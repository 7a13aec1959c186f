#![forbid(unsafe_code)]

//! Integration tests: full object lifecycles against the recording bridge.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::json;
use tether_core::{Event, EventSource, NativeObject, Phase, Properties, Value};
use tether_harness::{EventLog, Harness, assert_traffic};

// ============================================================================
// Lifecycle scenario
// ============================================================================

#[test]
fn select_then_dispose() {
    let h = Harness::new();
    let w = h.widget();
    let log = EventLog::attach(&w, &["selectionChanged", "dispose"]);
    w.set("selection", true);
    assert_traffic!(
        h,
        "
        create $1 Widget
        listen $1 select on
        set $1 selection true
        "
    );
    assert_eq!(log.values("selectionChanged"), [Value::Bool(true)]);

    w.dispose();
    assert_eq!(log.types(), ["selectionChanged", "dispose"]);
    assert_traffic!(h, "destroy $1");

    w.set("selection", false);
    assert_traffic!(h, "");
    assert_eq!(log.len(), 2);
    assert!(h.session().find("$1").is_none());
}

#[test]
fn dispose_event_precedes_destroy() {
    let h = Harness::new();
    let w = h.widget();
    let bridge = Rc::clone(h.bridge());
    let destroyed_before = Rc::new(Cell::new(None));
    let probe = Rc::clone(&destroyed_before);
    w.on_fn("dispose", move |_: &Event| probe.set(Some(bridge.destroy_count("$1"))))
        .unwrap();
    w.dispose();
    assert_eq!(destroyed_before.get(), Some(0));
    assert_eq!(h.bridge().destroy_count("$1"), 1);
}

#[test]
fn dispose_is_idempotent_and_reentrant() {
    let h = Harness::new();
    let w = h.widget();
    let again = w.clone();
    w.on_fn("dispose", move |_: &Event| again.dispose()).unwrap();
    let log = EventLog::attach(&w, &["dispose"]);
    w.dispose();
    w.dispose();
    assert_eq!(log.count("dispose"), 1);
    assert_eq!(h.bridge().destroy_count("$1"), 1);
    assert_eq!(w.phase(), Phase::Disposed);
}

#[test]
fn owned_children_go_with_their_parent() {
    let h = Harness::new();
    let parent = h.widget();
    let child = h.label();
    parent.own(&child);
    h.clear();
    parent.dispose();
    assert!(child.is_disposed());
    assert_traffic!(h, "destroy $1");
}

#[test]
fn shutdown_disposes_in_reverse_creation_order() {
    let h = Harness::new();
    let _a = h.widget();
    let _b = h.label();
    let _c = h.widget();
    h.clear();
    h.session().shutdown();
    assert_traffic!(
        h,
        "
        destroy $3
        destroy $2
        destroy $1
        "
    );
    assert!(h.session().registry().is_empty());
    assert!(NativeObject::create(h.session(), &tether_harness::widget_class()).is_err());
}

// ============================================================================
// Creation payloads
// ============================================================================

#[test]
fn create_payload_follows_declared_order_and_skips_invalid() {
    let h = Harness::new();
    let _w = h.widget_with(
        Properties::new()
            .with("text", "hi")
            .with("count", "many")
            .with("background", "#ff0000")
            .with("bounds", vec![0, 0, 10, 10]),
    );
    assert_traffic!(
        h,
        r#"create $1 Widget {"text":"hi","background":[255,0,0,255]}"#
    );
}

#[test]
fn attached_singleton_sends_sets_instead_of_create() {
    let h = Harness::new();
    let w = NativeObject::builder(&tether_harness::widget_class())
        .id("tether.App")
        .attach_existing()
        .property("text", "boot")
        .create(h.session())
        .unwrap();
    assert_eq!(w.id().as_str(), "tether.App");
    assert_traffic!(h, r#"set tether.App text "boot""#);
    assert!(
        NativeObject::builder(&tether_harness::widget_class())
            .id("tether.App")
            .attach_existing()
            .create(h.session())
            .is_err()
    );
}

// ============================================================================
// Inbound notifications
// ============================================================================

#[test]
fn native_select_updates_cache_then_fires() {
    let h = Harness::new();
    let w = h.widget();
    let log = EventLog::attach(&w, &["selectionChanged", "select"]);
    h.session().notify("$1", "select", json!({"value": true}));
    assert_eq!(log.types(), ["selectionChanged", "select"]);
    assert_eq!(w.get("selection"), Value::Bool(true));
    h.session().notify("$1", "select", json!({"value": true}));
    assert_eq!(log.count("selectionChanged"), 1);
    assert_eq!(log.count("select"), 2);
}

#[test]
fn wire_name_and_custom_extractor() {
    let h = Harness::new();
    let w = h.widget();
    let log = EventLog::attach(&w, &["scrollOffsetChanged"]);
    assert_traffic!(
        h,
        "
        create $1 Widget
        listen $1 scrollEvent on
        "
    );
    h.session().notify("$1", "scrollEvent", json!({"offset": 12}));
    h.session().notify("$1", "scrollEvent", json!({"offset": 12}));
    assert_eq!(log.values("scrollOffsetChanged"), [Value::from(12), Value::from(12)]);
}

#[test]
fn notifications_for_unknown_or_disposed_ids_are_dropped() {
    let h = Harness::new();
    let w = h.widget();
    let log = EventLog::attach(&w, &["tap"]);
    h.session().notify("$99", "tap", json!(null));
    w.dispose();
    h.session().notify("$1", "tap", json!(null));
    assert!(log.is_empty());
}

#[test]
fn proxy_properties_resolve_through_the_registry() {
    let h = Harness::new();
    let a = h.widget();
    let b = h.widget();
    h.clear();
    a.set("buddy", &b);
    assert_traffic!(h, r#"set $1 buddy "$2""#);
    assert_eq!(a.get("buddy"), Value::from(&b));
    b.dispose();
    h.clear();
    a.set("buddy", Value::Null);
    assert_traffic!(h, "set $1 buddy null");
}

// ============================================================================
// Calls and queries
// ============================================================================

#[test]
fn call_and_native_get_round_trip_through_the_bridge() {
    let h = Harness::new();
    let w = h.widget();
    h.bridge().reply_call("measure", json!({"width": 40}));
    h.bridge().reply_get("bounds", json!([1, 2, 3, 4]));
    h.clear();
    let size = w.call("measure", [("wrap", true)]).unwrap();
    assert_eq!(size.get("width"), Some(&Value::from(40)));
    let bounds = w.get("bounds");
    assert_eq!(bounds.get("width"), Some(&Value::from(3)));
    assert_traffic!(
        h,
        r#"
        call $1 measure {"wrap":true}
        get $1 bounds
        "#
    );
    w.dispose();
    assert!(w.call("measure", Properties::new()).is_err());
    assert!(w.native_get("bounds").is_err());
}
