#![forbid(unsafe_code)]

//! Reference classes and listener recorders.
//!
//! `Widget` exercises every modifier and both kinds of native event:
//!
//! | Property | Type | Modifiers | Default |
//! |----------|------|-----------|---------|
//! | `selection` | boolean | | `false` |
//! | `count` | natural | | `0` |
//! | `text` | string | | `""` |
//! | `alignment` | string | choice `left`/`center`/`right` | `"left"` |
//! | `background` | color | nullable | `null` |
//! | `font` | font | nullable | `null` |
//! | `serial` | string | const | `""` |
//! | `bounds` | bounds | readonly | |
//! | `scrollOffset` | number | nocache | |
//! | `badge` | string | always fire on first set | `""` |
//! | `buddy` | proxy | nullable | `null` |
//!
//! Events: `select` (changes `selection`), `tap`, and `scroll` (wire name
//! `scrollEvent`, changes `scrollOffset` through the payload's `offset`).
//!
//! `Label` has a `text` and a `textColor` and no native events.

use std::cell::RefCell;
use std::rc::Rc;

use tether_core::{
    Event, EventSource, EventSpec, Listener, NativeClass, PropertySpec, TypeRegistry, Value,
    WireValue,
};

thread_local! {
    static WIDGET: Rc<NativeClass> = build_widget();
    static LABEL: Rc<NativeClass> = build_label();
}

/// The `Widget` reference class.
#[must_use]
pub fn widget_class() -> Rc<NativeClass> {
    WIDGET.with(Rc::clone)
}

/// The `Label` reference class.
#[must_use]
pub fn label_class() -> Rc<NativeClass> {
    LABEL.with(Rc::clone)
}

fn scroll_offset(payload: &WireValue) -> WireValue {
    payload.get("offset").cloned().unwrap_or(WireValue::Null)
}

fn build_widget() -> Rc<NativeClass> {
    NativeClass::builder("Widget")
        .property("selection", PropertySpec::new("boolean").default(false))
        .property("count", PropertySpec::new("natural").default(0))
        .property("text", PropertySpec::new("string").default(""))
        .property(
            "alignment",
            PropertySpec::new("string")
                .default("left")
                .choice(["left", "center", "right"]),
        )
        .property("background", PropertySpec::new("color").nullable().default(Value::Null))
        .property("font", PropertySpec::new("font").nullable().default(Value::Null))
        .property("serial", PropertySpec::new("string").constant().default(""))
        .property("bounds", PropertySpec::new("bounds").readonly())
        .property("scrollOffset", PropertySpec::new("number").nocache())
        .property(
            "badge",
            PropertySpec::new("string").default("").always_fire_on_first_set(),
        )
        .property("buddy", PropertySpec::new("proxy").nullable().default(Value::Null))
        .event("select", EventSpec::native().changes("selection"))
        .event("tap", EventSpec::native())
        .event(
            "scroll",
            EventSpec::new()
                .wire_name("scrollEvent")
                .changes_with("scrollOffset", scroll_offset),
        )
        .set_order(["bounds", "text"])
        .build(&TypeRegistry::standard())
        .expect("Widget class is valid")
}

fn build_label() -> Rc<NativeClass> {
    NativeClass::builder("Label")
        .property("text", PropertySpec::new("string").default(""))
        .property("textColor", PropertySpec::new("color").default("black"))
        .build(&TypeRegistry::standard())
        .expect("Label class is valid")
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Records `(event_type, value)` for every event it is attached to.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<(String, Value)>>>,
    listener: Option<Listener>,
}

impl EventLog {
    /// Listen to each of `event_types` on `source`.
    ///
    /// # Panics
    ///
    /// If `source` is disposed.
    pub fn attach<S: EventSource>(source: &S, event_types: &[&str]) -> Self {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&entries);
        let listener = Listener::new(move |event: &Event| {
            sink.borrow_mut()
                .push((event.event_type().to_owned(), event.value()));
        });
        for event_type in event_types {
            source
                .on(event_type, &listener)
                .expect("event log attaches to a live source");
        }
        Self {
            entries,
            listener: Some(listener),
        }
    }

    /// Stop recording `event_types` on `source`.
    pub fn detach<S: EventSource>(&self, source: &S, event_types: &[&str]) {
        if let Some(listener) = &self.listener {
            for event_type in event_types {
                source.off(event_type, listener);
            }
        }
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.entries.borrow().clone()
    }

    /// Event types in dispatch order.
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Values recorded for `event_type`.
    #[must_use]
    pub fn values(&self, event_type: &str) -> Vec<Value> {
        self.entries
            .borrow()
            .iter()
            .filter(|(t, _)| t == event_type)
            .map(|(_, v)| v.clone())
            .collect()
    }

    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(t, _)| t == event_type)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}
