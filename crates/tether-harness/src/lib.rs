#![forbid(unsafe_code)]

//! Test harness for tether.
//!
//! - [`bridge`]: a [`Harness`] pairing a session with a
//!   [`RecordingBridge`], and [`transcript`] rendering recorded traffic as
//!   one line per operation.
//! - [`fixtures`]: reference classes (`Widget`, `Label`) and an [`EventLog`]
//!   that records what listeners saw.
//! - [`strategies`]: `proptest` strategies for operation sequences.
//!
//! # Traffic assertions
//!
//! ```ignore
//! let h = Harness::new();
//! let w = h.widget();
//! w.set("selection", true);
//! assert_traffic!(h, "
//!     create $1 Widget
//!     set $1 selection true
//! ");
//! ```
//!
//! Expected text is compared line by line after trimming, and blank lines
//! are ignored, so expectations can be indented with the test body.

pub mod bridge;
pub mod fixtures;
pub mod strategies;

pub use bridge::{Harness, normalize, transcript};
pub use fixtures::{EventLog, label_class, widget_class};
pub use tether_core::testing::{BridgeCall, RecordingBridge};

/// Assert that the bridge traffic recorded since the last assertion matches
/// `expected` (see [`transcript`] for the line format), then clear it.
#[macro_export]
macro_rules! assert_traffic {
    ($harness:expr, $expected:expr $(,)?) => {{
        let actual = $harness.take_transcript();
        let expected = $crate::normalize($expected);
        assert_eq!(
            actual, expected,
            "\n--- bridge traffic ---\n{actual}\n--- expected ---\n{expected}\n"
        );
    }};
}
