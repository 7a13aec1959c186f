#![no_main]

//! Arbitrary inbound notifications against a live object must never panic
//! and must leave the registry consistent.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::json;
use tether_core::testing::RecordingBridge;
use tether_core::{EventSpec, NativeClass, NativeObject, PropertySpec, Session, TypeRegistry};

#[derive(Debug, Arbitrary)]
enum Payload {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Value(String),
    Offset(i64),
}

#[derive(Debug, Arbitrary)]
struct Notification {
    target: u8,
    event: u8,
    payload: Payload,
}

const EVENTS: [&str; 4] = ["select", "scrollEvent", "tap", "unknown"];

fuzz_target!(|input: Vec<Notification>| {
    let class = NativeClass::builder("Widget")
        .property("selection", PropertySpec::new("boolean").default(false))
        .property("offset", PropertySpec::new("number").nocache())
        .event("select", EventSpec::native().changes("selection"))
        .event("scroll", EventSpec::new().wire_name("scrollEvent").changes("offset"))
        .event("tap", EventSpec::native())
        .build(&TypeRegistry::standard())
        .expect("fuzz class is valid");
    let session = Session::new(RecordingBridge::new());
    let objects: Vec<NativeObject> = (0..3)
        .map(|_| NativeObject::create(&session, &class).expect("session open"))
        .collect();

    for n in input.iter().take(256) {
        let payload = match &n.payload {
            Payload::Null => json!(null),
            Payload::Bool(b) => json!({ "value": b }),
            Payload::Number(x) => json!({ "value": x }),
            Payload::Text(s) => json!(s),
            Payload::Value(s) => json!({ "value": s }),
            Payload::Offset(o) => json!({ "value": o }),
        };
        let id = format!("${}", n.target % 5);
        session.notify(&id, EVENTS[usize::from(n.event) % EVENTS.len()], payload);
        if n.event == u8::MAX {
            objects[usize::from(n.target) % objects.len()].dispose();
        }
    }
    for object in &objects {
        assert_eq!(session.find(object.id().as_str()).is_some(), !object.is_disposed());
    }
    session.shutdown();
});
