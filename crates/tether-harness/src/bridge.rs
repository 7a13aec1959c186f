#![forbid(unsafe_code)]

//! Session + recording bridge pair and traffic transcripts.
//!
//! # Transcript format
//!
//! | Operation | Line |
//! |-----------|------|
//! | create | `create <id> <type> [<props json>]` |
//! | set | `set <id> <property> <json>` |
//! | get | `get <id> <property>` |
//! | listen | `listen <id> <event> on\|off` |
//! | call | `call <id> <method> <params json>` |
//! | destroy | `destroy <id>` |
//!
//! JSON is compact with sorted keys.

use std::rc::Rc;

use tether_core::testing::{BridgeCall, RecordingBridge};
use tether_core::{NativeObject, Properties, Session, SessionConfig};

use crate::fixtures::{label_class, widget_class};

/// Render recorded calls, one per line.
#[must_use]
pub fn transcript(calls: &[BridgeCall]) -> String {
    calls.iter().map(line).collect::<Vec<_>>().join("\n")
}

fn line(call: &BridgeCall) -> String {
    match call {
        BridgeCall::Create {
            id,
            type_name,
            properties: Some(props),
        } => format!("create {id} {type_name} {props}"),
        BridgeCall::Create { id, type_name, .. } => format!("create {id} {type_name}"),
        BridgeCall::Set {
            id,
            property,
            value,
        } => format!("set {id} {property} {value}"),
        BridgeCall::Get { id, property } => format!("get {id} {property}"),
        BridgeCall::Listen { id, event, enabled } => {
            format!("listen {id} {event} {}", if *enabled { "on" } else { "off" })
        }
        BridgeCall::Call { id, method, params } => format!("call {id} {method} {params}"),
        BridgeCall::Destroy { id } => format!("destroy {id}"),
    }
}

/// Trim every line of `expected` and drop blank ones.
#[must_use]
pub fn normalize(expected: &str) -> String {
    expected
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A session wired to a [`RecordingBridge`]. Shuts the session down on drop.
pub struct Harness {
    bridge: Rc<RecordingBridge>,
    session: Session,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        let bridge = RecordingBridge::new();
        let session = Session::with_config(bridge.clone(), config);
        Self { bridge, session }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn bridge(&self) -> &Rc<RecordingBridge> {
        &self.bridge
    }

    /// A fresh `Widget` with default properties.
    ///
    /// # Panics
    ///
    /// If the session is already shut down.
    #[must_use]
    pub fn widget(&self) -> NativeObject {
        self.widget_with(Properties::new())
    }

    /// # Panics
    ///
    /// If the session is already shut down.
    #[must_use]
    pub fn widget_with(&self, properties: impl Into<Properties>) -> NativeObject {
        NativeObject::builder(&widget_class())
            .properties(properties)
            .create(&self.session)
            .expect("harness session is open")
    }

    /// # Panics
    ///
    /// If the session is already shut down.
    #[must_use]
    pub fn label(&self) -> NativeObject {
        NativeObject::create(&self.session, &label_class()).expect("harness session is open")
    }

    /// Transcript of the traffic since the last call; clears the record.
    pub fn take_transcript(&self) -> String {
        transcript(&self.bridge.take_calls())
    }

    /// Forget recorded traffic.
    pub fn clear(&self) {
        self.bridge.clear();
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.session.shutdown();
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("live_objects", &self.session.registry().len())
            .field("recorded", &self.bridge.calls().len())
            .finish()
    }
}
