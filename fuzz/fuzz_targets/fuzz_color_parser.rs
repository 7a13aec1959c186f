#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_core::types::{COLOR, DecodeContext, parse_color};
use tether_core::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(rgba) = parse_color(input) {
        // Anything that parses must survive a convert/encode/decode cycle.
        let converted = COLOR.convert(&Value::from(input)).expect("parsed color converts");
        let wire = COLOR.encode(&converted).expect("converted color encodes");
        let decoded = COLOR.decode(&wire, &DecodeContext::detached());
        let reparsed = parse_color(decoded.as_str().expect("decoded color is a string"));
        assert_eq!(reparsed.map(|c| c[..3] == rgba[..3]), Ok(true));
    }
});
