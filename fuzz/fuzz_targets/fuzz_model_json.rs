//! Fuzz target for GSMP model parsing and resolution.
//!
//! Arbitrary JSON must either fail to parse, fail validation, or resolve;
//! never panic.

#![no_main]

use gsmp_core::{GsmpModel, ModelContext, ResolvedModel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(model) = serde_json::from_slice::<GsmpModel>(data) else {
        return;
    };
    // Oversized state spaces only exercise allocation.
    if model.num_states > 4096 {
        return;
    }
    let _ = ResolvedModel::new(&model, &ModelContext::new());
});
