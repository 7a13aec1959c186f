#![forbid(unsafe_code)]

//! The prelude is enough to implement a bridge and drive objects.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether::core::ObjectId;
use tether::prelude::*;

/// Echoes every `set` back as a native `<property>Set` count.
#[derive(Default)]
struct CountingBridge {
    sets: Cell<usize>,
    destroyed: RefCell<Vec<String>>,
}

impl Bridge for CountingBridge {
    fn create(&self, _id: &ObjectId, _type_name: &str, _properties: Option<&WireMap>) {}

    fn set(&self, _id: &ObjectId, _property: &str, _value: &WireValue) {
        self.sets.set(self.sets.get() + 1);
    }

    fn get(&self, _id: &ObjectId, _property: &str) -> WireValue {
        WireValue::Null
    }

    fn listen(&self, _id: &ObjectId, _event: &str, _enabled: bool) {}

    fn call(&self, _id: &ObjectId, _method: &str, _params: &WireMap) -> WireValue {
        WireValue::Null
    }

    fn destroy(&self, id: &ObjectId) {
        self.destroyed.borrow_mut().push(id.to_string());
    }
}

fn switch_class() -> Rc<NativeClass> {
    NativeClass::builder("Switch")
        .property("checked", PropertySpec::new("boolean").default(false))
        .event("toggle", EventSpec::native().changes("checked"))
        .build(&TypeRegistry::standard())
        .unwrap()
}

#[test]
fn custom_bridge_drives_a_switch() {
    let bridge = Rc::new(CountingBridge::default());
    let session = Session::new(bridge.clone());
    let switch = NativeObject::create(&session, &switch_class()).unwrap();
    let seen = Rc::new(Cell::new(0));
    let sink = Rc::clone(&seen);
    let _sub = change_events(&switch).subscribe(move |_: ChangeEvent| sink.set(sink.get() + 1));
    switch.set("checked", true);
    switch.set("checked", true);
    assert_eq!(bridge.sets.get(), 1);
    assert_eq!(seen.get(), 1);
    session.shutdown();
    assert_eq!(*bridge.destroyed.borrow(), ["$1"]);
}

#[test]
fn observable_data_binds_to_objects() {
    let session = Session::new(Rc::new(CountingBridge::default()));
    let switch = NativeObject::create(&session, &switch_class()).unwrap();
    let model = ObservableData::new(&session);
    let _link = TwoWayBinding::new(&model, "on", &switch, "checked");
    model.set("on", true);
    assert_eq!(switch.get("checked"), Value::Bool(true));
    session.shutdown();
}
