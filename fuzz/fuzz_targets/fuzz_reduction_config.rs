//! Fuzz target for reduction.json configuration parsing.
//!
//! Tests that configuration parsing and validation handle arbitrary input
//! without panicking.

#![no_main]

use gsmp_config::{validate_config, ReductionConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<ReductionConfig>(data) {
        let _ = validate_config(&config);
    }
});
