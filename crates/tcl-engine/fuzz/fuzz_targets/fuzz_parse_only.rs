//! Fuzz target: parse arbitrary TCL source (no evaluation).
//!
//! Exercises only `parse.rs`'s recursive-descent scanner. A crash here
//! indicates a bug in the parser — it should never panic regardless of
//! input, only ever return `Complete`, `Incomplete`, or `Error`.

#![no_main]

use libfuzzer_sys::fuzz_target;

use tcl_engine::Interp;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    if source.len() > 8192 {
        return;
    }

    let interp = Interp::new();
    let _ = interp.parse(source);
});
