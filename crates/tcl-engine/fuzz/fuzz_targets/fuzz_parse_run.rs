//! Fuzz target: parse and evaluate arbitrary TCL source.
//!
//! Exercises the full pipeline — parsing, substitution, command dispatch,
//! proc calls — with a tight recursion limit so the fuzzer doesn't waste
//! time on legitimate "too much recursion" errors (those are handled
//! gracefully, not a bug). Findings here indicate real safety issues:
//! panics or stack overflows that evade the recursion limit.

#![no_main]

use libfuzzer_sys::fuzz_target;

use tcl_engine::Interp;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    if source.len() > 4096 {
        return;
    }

    let mut interp = Interp::new();
    interp.set_recursion_limit(50);

    // Discard the result — we only care that evaluation doesn't panic.
    let _ = interp.eval(source);
});
