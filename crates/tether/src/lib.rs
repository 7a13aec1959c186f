#![forbid(unsafe_code)]

//! Reactive proxies for native objects.
//!
//! `tether` keeps an in-process proxy for every object living on the far
//! side of a [`Bridge`]: it types and caches properties, routes native
//! notifications into events, and exposes observable streams over both.
//!
//! # Crates
//!
//! - [`core`] (`tether-core`): registry, property types, classes, proxies,
//!   events and the session scheduler.
//! - [`runtime`] (`tether-runtime`, feature `runtime`): observables,
//!   mutation coalescing, bindings and `ObservableData`.
//!
//! # Quick start
//!
//! ```ignore
//! use tether::prelude::*;
//!
//! let class = NativeClass::builder("Switch")
//!     .property("checked", PropertySpec::new("boolean").default(false))
//!     .event("toggle", EventSpec::native().changes("checked"))
//!     .build(&TypeRegistry::standard())?;
//!
//! let session = Session::new(my_bridge);
//! let switch = NativeObject::create(&session, &class)?;
//! switch.on_fn("checkedChanged", |event| println!("now {}", event.value()))?;
//! switch.set("checked", true);
//! ```
//!
//! # Features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | `runtime` (default) | observable layer |
//! | `subscriber` | `logging::init()` installs a `tracing-subscriber` |
//! | `config` | `SessionConfig::from_toml_str` |

pub use tether_core as core;
#[cfg(feature = "runtime")]
pub use tether_runtime as runtime;

pub use tether_core::{
    Bridge, ConfigError, Error, Event, EventSource, NativeClass, NativeObject, Properties,
    Session, SessionConfig, UsageError, Value, ValueError, WireValue, logging,
};

pub mod prelude;
