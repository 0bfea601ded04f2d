#![no_main]

//! Fuzz target for blind detection
//!
//! Arbitrary bytes must either decode and yield a verdict or fail with an
//! unreadable-image error. The container walkers must never panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_detect

use aureo_core::{Container, MetadataBlock, SpiralDetector};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = SpiralDetector::default().detect(data);
    let _ = MetadataBlock::extract(Container::Jpeg, data);
    let _ = MetadataBlock::extract(Container::Png, data);
});
