#![forbid(unsafe_code)]

//! Proptest strategies over `Widget` operations.

use proptest::prelude::*;
use tether_core::{Properties, Value};

/// Event types whose listeners drive native `listen`, with the wire event
/// each one activates.
pub const LISTENED: [(&str, &str); 4] = [
    ("select", "select"),
    ("selectionChanged", "select"),
    ("tap", "tap"),
    ("scroll", "scrollEvent"),
];

/// Number of distinct listeners the listener strategies pick from.
pub const LISTENER_POOL: usize = 3;

/// One step against a live widget's listener table.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerOp {
    On { event: usize, listener: usize },
    Once { event: usize, listener: usize },
    Off { event: usize, listener: usize },
    /// Deliver the wire event of `LISTENED[event]` from the native side.
    Notify { event: usize },
}

/// One step against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryOp {
    Create,
    /// Create with the fixed id `fixed-<n>`.
    CreateFixed(u8),
    /// Dispose the n-th live object (modulo the live count).
    Dispose(usize),
}

pub fn arb_listener_op() -> impl Strategy<Value = ListenerOp> {
    let event = 0..LISTENED.len();
    let listener = 0..LISTENER_POOL;
    prop_oneof![
        3 => (event.clone(), listener.clone()).prop_map(|(event, listener)| ListenerOp::On { event, listener }),
        1 => (event.clone(), listener.clone()).prop_map(|(event, listener)| ListenerOp::Once { event, listener }),
        3 => (event.clone(), listener).prop_map(|(event, listener)| ListenerOp::Off { event, listener }),
        1 => event.prop_map(|event| ListenerOp::Notify { event }),
    ]
}

pub fn arb_listener_ops() -> impl Strategy<Value = Vec<ListenerOp>> {
    prop::collection::vec(arb_listener_op(), 0..40)
}

pub fn arb_registry_op() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        2 => Just(RegistryOp::Create),
        1 => (0u8..4).prop_map(RegistryOp::CreateFixed),
        2 => any::<usize>().prop_map(RegistryOp::Dispose),
    ]
}

pub fn arb_registry_ops() -> impl Strategy<Value = Vec<RegistryOp>> {
    prop::collection::vec(arb_registry_op(), 0..30)
}

/// A `(property, value)` pair the `Widget` accepts.
pub fn arb_valid_write() -> impl Strategy<Value = (&'static str, Value)> {
    prop_oneof![
        any::<bool>().prop_map(|b| ("selection", Value::from(b))),
        (0u32..1000).prop_map(|n| ("count", Value::from(n))),
        "[a-z]{0,8}".prop_map(|s| ("text", Value::from(s))),
        prop::sample::select(vec!["left", "center", "right"])
            .prop_map(|s| ("alignment", Value::from(s))),
    ]
}

/// A `(property, value)` pair the `Widget` rejects at conversion.
pub fn arb_invalid_write() -> impl Strategy<Value = (&'static str, Value)> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(|s| ("count", Value::from(s))),
        (-1000i32..0).prop_map(|n| ("count", Value::from(n))),
        "[a-z]{7,8}".prop_map(|s| ("alignment", Value::from(s))),
        "[g-z]{3}".prop_map(|s| ("background", Value::from(format!("#{s}")))),
    ]
}

/// A batch of valid writes with one invalid write mixed in.
pub fn arb_mixed_batch() -> impl Strategy<Value = (Properties, &'static str, &'static str)> {
    (arb_valid_write(), arb_invalid_write())
        .prop_filter("distinct properties", |((valid, _), (invalid, _))| {
            valid != invalid
        })
        .prop_map(|((valid, v), (invalid, i))| {
            (Properties::new().with(valid, v).with(invalid, i), valid, invalid)
        })
}
