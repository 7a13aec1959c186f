#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_core::types::{DecodeContext, FONT, parse_font};
use tether_core::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(font) = parse_font(input) {
        let _ = font.to_shorthand();
        if let Ok(wire) = FONT.convert(&Value::from(input)).and_then(|v| FONT.encode(&v)) {
            let _ = FONT.decode(&wire, &DecodeContext::detached());
        }
    }
});
