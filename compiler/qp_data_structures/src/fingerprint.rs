// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deterministic fingerprinting used for waveform/weight table dedup.
//!
//! Uses `rustc_hash`'s `FxHasher`, the same unseeded, deterministic hasher the
//! teacher uses throughout `qsc_rir` for its `FxHashMap`/`FxHashSet`s. Unlike
//! `std::collections::hash_map::RandomState`, `FxHasher` produces the same
//! output across process runs, which determinism (spec §8 property 1)
//! requires.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    #[must_use]
    pub fn of<T: Hash>(value: &T) -> Self {
        let mut hasher = FxHasher::default();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Rounds a sample to a fixed-point grid so that fingerprinting is stable
/// under floating point noise that does not affect the emitted waveform.
/// Matches the DAC quantization grid used by [`qp_data_structures::constants::DAC_FULL_SCALE`].
#[must_use]
pub fn quantize_sample(sample: f64) -> i32 {
    (sample * f64::from(crate::constants::DAC_FULL_SCALE)).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_fingerprint() {
        let a = Fingerprint::of(&vec![1i32, 2, 3]);
        let b = Fingerprint::of(&vec![1i32, 2, 3]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_different_fingerprint() {
        let a = Fingerprint::of(&vec![1i32, 2, 3]);
        let b = Fingerprint::of(&vec![1i32, 2, 4]);
        assert_ne!(a, b);
    }

    #[test]
    fn quantize_rounds_to_dac_grid() {
        assert_eq!(quantize_sample(1.0), 32_767);
        assert_eq!(quantize_sample(-1.0), -32_767);
        assert_eq!(quantize_sample(0.0), 0);
    }
}
