#![forbid(unsafe_code)]

//! Structured logging.
//!
//! The core reports every non-fatal condition through `tracing`:
//!
//! | Target | Level | Events |
//! |--------|-------|--------|
//! | `tether::object` | warn | skipped property writes, reads of disposed objects |
//! | `tether::event` | warn | listener failures, triggers on disposed objects |
//! | `tether::bridge` | trace | every outbound bridge operation |
//! | `tether::session` | debug | dropped inbound notifications |
//! | `tether::reactive` | error | observer recursion |
//! | `tether::config` | warn | ignored environment overrides |
//!
//! With the `subscriber` feature, [`init`] installs a formatting subscriber
//! filtered by `TETHER_LOG` (falling back to `RUST_LOG`, then `warn`).

/// Target names used by the core.
pub mod targets {
    pub const OBJECT: &str = "tether::object";
    pub const EVENT: &str = "tether::event";
    pub const BRIDGE: &str = "tether::bridge";
    pub const SESSION: &str = "tether::session";
    pub const REACTIVE: &str = "tether::reactive";
    pub const CONFIG: &str = "tether::config";
}

/// Install a global `fmt` subscriber.
///
/// Fails if a global subscriber is already set.
#[cfg(feature = "subscriber")]
pub fn init() -> Result<(), crate::BoxError> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("TETHER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| err as crate::BoxError)
}
