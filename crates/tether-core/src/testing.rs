#![forbid(unsafe_code)]

//! Test doubles, available with the `test-helpers` feature.
//!
//! [`RecordingBridge`] records every outbound operation and answers `get` and
//! `call` from scripted replies, so tests can assert on exact bridge traffic.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::bridge::{Bridge, WireMap, WireValue};
use crate::class::NativeClass;
use crate::id::ObjectId;
use crate::types::TypeRegistry;

/// One recorded bridge operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    Create {
        id: String,
        type_name: String,
        properties: Option<WireValue>,
    },
    Set {
        id: String,
        property: String,
        value: WireValue,
    },
    Get {
        id: String,
        property: String,
    },
    Listen {
        id: String,
        event: String,
        enabled: bool,
    },
    Call {
        id: String,
        method: String,
        params: WireValue,
    },
    Destroy {
        id: String,
    },
}

impl BridgeCall {
    /// Operation name: `create`, `set`, `get`, `listen`, `call` or `destroy`.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Set { .. } => "set",
            Self::Get { .. } => "get",
            Self::Listen { .. } => "listen",
            Self::Call { .. } => "call",
            Self::Destroy { .. } => "destroy",
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Create { id, .. }
            | Self::Set { id, .. }
            | Self::Get { id, .. }
            | Self::Listen { id, .. }
            | Self::Call { id, .. }
            | Self::Destroy { id } => id,
        }
    }
}

/// In-memory [`Bridge`] that records traffic.
#[derive(Debug, Default)]
pub struct RecordingBridge {
    calls: RefCell<Vec<BridgeCall>>,
    get_replies: RefCell<AHashMap<String, WireValue>>,
    call_replies: RefCell<AHashMap<String, WireValue>>,
}

impl RecordingBridge {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Answer every `get` of `property` with `value`.
    pub fn reply_get(&self, property: &str, value: WireValue) {
        self.get_replies
            .borrow_mut()
            .insert(property.to_owned(), value);
    }

    /// Answer every `call` of `method` with `value`.
    pub fn reply_call(&self, method: &str, value: WireValue) {
        self.call_replies
            .borrow_mut()
            .insert(method.to_owned(), value);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<BridgeCall> {
        self.calls.take()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Number of recorded calls of `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Net `listen(true)` minus `listen(false)` for one id and event.
    ///
    /// A `destroy` of `id` releases its native listeners, so the balance
    /// restarts from zero there.
    #[must_use]
    pub fn listen_balance(&self, id: &str, event: &str) -> i64 {
        self.calls.borrow().iter().fold(0, |balance, c| match c {
            BridgeCall::Listen {
                id: i,
                event: e,
                enabled,
            } if i == id && e == event => balance + if *enabled { 1 } else { -1 },
            BridgeCall::Destroy { id: i } if i == id => 0,
            _ => balance,
        })
    }

    #[must_use]
    pub fn destroy_count(&self, id: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, BridgeCall::Destroy { id: i } if i == id))
            .count()
    }

    fn record(&self, call: BridgeCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl Bridge for RecordingBridge {
    fn create(&self, id: &ObjectId, type_name: &str, properties: Option<&WireMap>) {
        self.record(BridgeCall::Create {
            id: id.to_string(),
            type_name: type_name.to_owned(),
            properties: properties.map(|p| WireValue::Object(p.clone())),
        });
    }

    fn set(&self, id: &ObjectId, property: &str, value: &WireValue) {
        self.record(BridgeCall::Set {
            id: id.to_string(),
            property: property.to_owned(),
            value: value.clone(),
        });
    }

    fn get(&self, id: &ObjectId, property: &str) -> WireValue {
        self.record(BridgeCall::Get {
            id: id.to_string(),
            property: property.to_owned(),
        });
        self.get_replies
            .borrow()
            .get(property)
            .cloned()
            .unwrap_or(WireValue::Null)
    }

    fn listen(&self, id: &ObjectId, event: &str, enabled: bool) {
        self.record(BridgeCall::Listen {
            id: id.to_string(),
            event: event.to_owned(),
            enabled,
        });
    }

    fn call(&self, id: &ObjectId, method: &str, params: &WireMap) -> WireValue {
        self.record(BridgeCall::Call {
            id: id.to_string(),
            method: method.to_owned(),
            params: WireValue::Object(params.clone()),
        });
        self.call_replies
            .borrow()
            .get(method)
            .cloned()
            .unwrap_or(WireValue::Null)
    }

    fn destroy(&self, id: &ObjectId) {
        self.record(BridgeCall::Destroy { id: id.to_string() });
    }
}

/// A class with no properties and no events, typed `Plain`.
///
/// # Panics
///
/// Never in practice: an empty declaration always validates.
#[must_use]
pub fn plain_class() -> Rc<NativeClass> {
    NativeClass::builder("Plain")
        .build(&TypeRegistry::new())
        .expect("empty class is valid")
}
