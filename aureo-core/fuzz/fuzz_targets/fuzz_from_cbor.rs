#![no_main]

//! Fuzz target for SealRecord::from_cbor()
//!
//! Malformed records, including ones with invalid seal ids, must come back as
//! errors rather than panics.
//!
//! Run with: cargo +nightly fuzz run fuzz_from_cbor

use aureo_core::{SealRecord, SecretSalt};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = SealRecord::from_cbor(data) {
        let _ = record.is_authentic(&SecretSalt::development());
        let _ = record.payload();
    }
});
