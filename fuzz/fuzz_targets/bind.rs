#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 32 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    let Ok(program) = pipebind::parse_program(&src) else {
        return;
    };

    let bound = pipebind::bind_program(&program);
    if bound.has_errors() {
        return;
    }

    // Exercise syntax lowering on well-typed inputs.
    let _lowered = pipebind::bind_program(&program.lowered());
});
