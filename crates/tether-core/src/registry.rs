#![forbid(unsafe_code)]

//! Object registry: the sole authority on which ids denote live objects.
//!
//! # Invariants
//!
//! 1. No two live objects share an id; generated ids skip any id that is
//!    currently registered.
//! 2. Only object creation and disposal mutate the map; callers outside the
//!    crate get a read-only view.
//!
//! # Failure Modes
//!
//! - A caller-fixed id that is already live fails with
//!   [`UsageError::DuplicateId`]; nothing is registered.
//! - `find` for an unknown id returns `None`; `remove` of an unknown id is a
//!   no-op.

use std::cell::{Cell, RefCell};

use ahash::AHashMap;

use crate::error::UsageError;
use crate::id::ObjectId;
use crate::object::NativeObject;

/// Map from id to live proxy, owned by a [`Session`](crate::Session).
///
/// Entries come and go with [`NativeObject::create`] and
/// [`NativeObject::dispose`]; there is no way to drop or alias an entry by
/// hand:
///
/// ```compile_fail
/// fn evict(registry: &tether_core::Registry) {
///     registry.remove("$1");
/// }
/// ```
pub struct Registry {
    prefix: String,
    counter: Cell<u64>,
    objects: RefCell<AHashMap<ObjectId, NativeObject>>,
}

impl Registry {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Cell::new(0),
            objects: RefCell::new(AHashMap::new()),
        }
    }

    /// Register the object produced by `make`.
    ///
    /// `make` receives the id to use and a creation serial. With `fixed`,
    /// that id is used verbatim (singleton system objects); otherwise a fresh
    /// `{prefix}{counter}` id is generated.
    pub(crate) fn register(
        &self,
        fixed: Option<ObjectId>,
        make: impl FnOnce(ObjectId, u64) -> NativeObject,
    ) -> Result<NativeObject, UsageError> {
        let serial = self.next_serial();
        let id = match fixed {
            Some(id) if self.contains(id.as_str()) => return Err(UsageError::DuplicateId(id)),
            Some(id) => id,
            None => self.fresh_id(serial),
        };
        let object = make(id.clone(), serial);
        let mut objects = self.objects.borrow_mut();
        if objects.contains_key(&id) {
            return Err(UsageError::DuplicateId(id));
        }
        objects.insert(id, object.clone());
        Ok(object)
    }

    /// The live object registered under `id`.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<NativeObject> {
        self.objects.borrow().get(id).cloned()
    }

    /// Drop the mapping for `id`. Returns whether an entry existed.
    pub(crate) fn remove(&self, id: &str) -> bool {
        let removed = self.objects.borrow_mut().remove(id);
        removed.is_some()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.objects.borrow().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }

    /// Live objects in creation order.
    #[must_use]
    pub fn live_objects(&self) -> Vec<NativeObject> {
        let mut objects: Vec<_> = self.objects.borrow().values().cloned().collect();
        objects.sort_by_key(NativeObject::serial);
        objects
    }

    fn next_serial(&self) -> u64 {
        let serial = self.counter.get() + 1;
        self.counter.set(serial);
        serial
    }

    fn fresh_id(&self, serial: u64) -> ObjectId {
        let mut candidate = ObjectId::from(format!("{}{serial}", self.prefix));
        while self.contains(candidate.as_str()) {
            let serial = self.next_serial();
            candidate = ObjectId::from(format!("{}{serial}", self.prefix));
        }
        candidate
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("prefix", &self.prefix)
            .field("live", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{RecordingBridge, plain_class};
    use crate::{NativeObject, ObjectId, Session, SessionConfig, UsageError};
    use proptest::prelude::*;

    #[test]
    fn generated_ids_use_prefix() {
        let session = Session::with_config(
            RecordingBridge::new(),
            SessionConfig::default().with_id_prefix("w"),
        );
        let a = NativeObject::create(&session, &plain_class()).unwrap();
        let b = NativeObject::create(&session, &plain_class()).unwrap();
        assert_eq!(a.id(), "w1");
        assert_eq!(b.id(), "w2");
        assert_eq!(session.registry().len(), 2);
    }

    #[test]
    fn fixed_id_rejected_while_live() {
        let session = Session::new(RecordingBridge::new());
        let app = NativeObject::builder(&plain_class())
            .id("tabris.App")
            .attach_existing()
            .create(&session)
            .unwrap();
        let err = NativeObject::builder(&plain_class())
            .id("tabris.App")
            .create(&session)
            .unwrap_err();
        assert_eq!(err, UsageError::DuplicateId(ObjectId::from("tabris.App")));
        assert!(session.registry().find("tabris.App").unwrap() == app);
    }

    #[test]
    fn generated_ids_skip_fixed_ids() {
        let session = Session::new(RecordingBridge::new());
        let fixed = NativeObject::builder(&plain_class())
            .id("$1")
            .create(&session)
            .unwrap();
        let generated = NativeObject::create(&session, &plain_class()).unwrap();
        assert_ne!(fixed.id(), generated.id());
    }

    #[test]
    fn remove_is_idempotent() {
        let session = Session::new(RecordingBridge::new());
        let obj = NativeObject::create(&session, &plain_class()).unwrap();
        let id = obj.id().clone();
        assert!(session.registry().remove(id.as_str()));
        assert!(!session.registry().remove(id.as_str()));
        assert!(session.registry().find(id.as_str()).is_none());
    }

    proptest! {
        #[test]
        fn live_ids_are_unique(ops in proptest::collection::vec(any::<(bool, u8)>(), 1..64)) {
            let session = Session::new(RecordingBridge::new());
            let mut live: Vec<NativeObject> = Vec::new();
            for (create, pick) in ops {
                if create || live.is_empty() {
                    live.push(NativeObject::create(&session, &plain_class()).unwrap());
                } else {
                    let victim = live.remove(pick as usize % live.len());
                    victim.dispose();
                }
                let mut ids: Vec<_> = live.iter().map(|o| o.id().clone()).collect();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), live.len());
                prop_assert_eq!(session.registry().len(), live.len());
            }
        }
    }
}
