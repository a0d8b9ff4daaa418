//! Fuzz test for size and write directive parsing
//!
//! Parsing must never panic or overflow, only return Ok/Err.

#![no_main]

use libfuzzer_sys::fuzz_target;

use rotcheck_core::size::parse_size_with_default_unit;
use rotcheck_core::{parse_size, parse_write_target, WriteTarget};

fuzz_target!(|data: &str| {
    let result = parse_size(data);

    // A directive that parses as a size must agree with parse_size
    match parse_write_target(data) {
        Ok(WriteTarget::Bytes(n)) => assert_eq!(result.ok(), Some(n)),
        Ok(WriteTarget::Fill) => assert!(result.is_err()),
        Err(_) => assert!(result.is_err()),
    }

    for suffix in ["", "B", "K", "Ki", "KiB", "M", "Mi", "G", "Gi", "T", "Ti", "b", "g"] {
        let test_input = format!("{}{}", data.trim(), suffix);
        let _ = parse_size(&test_input);
    }

    let _ = parse_size_with_default_unit(data, 1);
    let _ = parse_size_with_default_unit(data, u64::MAX);

    let whitespace_input = format!("  {}  ", data);
    let _ = parse_size(&whitespace_input);
});
