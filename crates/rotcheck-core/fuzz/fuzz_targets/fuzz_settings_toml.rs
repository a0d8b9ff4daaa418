//! Fuzz test for settings TOML parsing
//!
//! Deserialization and conversion to a runtime config must handle arbitrary TOML.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rotcheck_core::Settings;

fuzz_target!(|data: &str| {
    if let Ok(settings) = Settings::from_toml(data) {
        // Any accepted config must be within engine limits
        if let Ok(config) = settings.to_config() {
            assert!(config.chunk_size >= rotcheck_core::MIN_CHUNK_SIZE);
            assert!(config.chunk_size <= rotcheck_core::MAX_CHUNK_SIZE);
            assert_eq!(config.chunk_size % rotcheck_core::CHUNK_ALIGNMENT, 0);
            assert!(config.progress_interval > 0);
            assert!(config.throughput_window > 0);
        }
    }

    let wrapped = format!("[test]\n{}", data);
    if let Ok(settings) = Settings::from_toml(&wrapped) {
        let _ = settings.to_config();
    }

    let wrapped = format!("[behavior]\n{}", data);
    let _ = Settings::from_toml(&wrapped);
});
