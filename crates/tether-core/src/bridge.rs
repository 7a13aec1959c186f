#![forbid(unsafe_code)]

//! The narrow transport to the native host.
//!
//! Every operation is synchronous from the caller's point of view. Native
//! work that completes later comes back as an inbound notification through
//! [`Session::notify`](crate::Session::notify), never as a blocking call.
//!
//! | Operation | Contract |
//! |-----------|----------|
//! | `create`  | first operation for an id; creates the native peer |
//! | `set`     | fire-and-forget |
//! | `get`     | synchronous reply with the current wire value |
//! | `listen`  | toggles native emission of one event; idempotent natively |
//! | `call`    | imperative native action with a synchronous reply |
//! | `destroy` | releases the peer; the id is meaningless afterwards |

use crate::id::ObjectId;

/// Value representation on the wire.
pub type WireValue = serde_json::Value;

/// Encoded property map on the wire.
pub type WireMap = serde_json::Map<String, serde_json::Value>;

/// Outbound half of the native host protocol.
///
/// Implementations use interior mutability; the core only ever holds shared
/// references and calls from a single thread.
pub trait Bridge {
    fn create(&self, id: &ObjectId, type_name: &str, properties: Option<&WireMap>);

    fn set(&self, id: &ObjectId, property: &str, value: &WireValue);

    fn get(&self, id: &ObjectId, property: &str) -> WireValue;

    fn listen(&self, id: &ObjectId, event: &str, enabled: bool);

    fn call(&self, id: &ObjectId, method: &str, params: &WireMap) -> WireValue;

    fn destroy(&self, id: &ObjectId);
}
