#![forbid(unsafe_code)]

//! Everything an application needs to declare classes, drive a session and
//! observe objects.

pub use tether_core::{
    Bridge, Context, Event, EventSource, EventSpec, Listener, Modifiers, NativeClass,
    NativeObject, Properties, PropertySpec, Reply, Session, SessionConfig, TypeRegistry, Value,
    WireMap, WireValue,
};

#[cfg(feature = "runtime")]
pub use tether_runtime::{
    BindingScope, ChangeEvent, Observable, ObservableData, Observer, PropertyAccess,
    Subscription, TwoWayBinding, bind_mapped, bind_property, change_events, mutations,
    sync_property,
};
