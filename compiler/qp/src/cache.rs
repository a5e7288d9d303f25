// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pure cache-key helper (spec §5): `(IR structural hash, bus_mapping,
//! calibration fingerprint, nshots, repetition_duration, backend
//! parameters)`. No storage is implemented here; caching the compiled
//! output itself is a runtime concern left to the caller.

use qp_data_structures::fingerprint::Fingerprint;
use qp_ir::Node;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// The cache key described in spec §5. Equal inputs always produce an
/// equal key; a collision between unequal inputs is possible, as with any
/// hash-based identity, but not expected in practice.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CacheKey {
    pub ir_structural_hash: Fingerprint,
    pub bus_mapping_hash: Fingerprint,
    pub calibration_fingerprint: Fingerprint,
    pub nshots: u32,
    pub repetition_duration_ns: u64,
    pub backend_parameters_hash: Fingerprint,
}

/// Computes a [`CacheKey`] for one compilation request.
///
/// `root` is hashed through its serialized form rather than directly:
/// `Node` does not implement `Hash` since the variable ids it carries are
/// builder-session-local, and `SerializedProgram::from_root` already
/// normalizes them to dense first-occurrence indices before this function
/// ever sees them.
///
/// `bus_mapping_text`, `calibration_text`, and `backend_parameters_text`
/// are expected to be the JSON forms produced by `BusMapping`,
/// `Calibration::save_to_string`, and `BackendConfig::save_to_string`
/// respectively, so that two equivalent configurations hash identically.
#[must_use]
pub fn cache_key(
    root: &[Node],
    bus_mapping_text: &str,
    calibration_text: &str,
    nshots: u32,
    repetition_duration_ns: u64,
    backend_parameters_text: &str,
) -> CacheKey {
    let serialized = qp_ir::SerializedProgram::from_root(root);
    let structural_text = serde_json::to_string(&serialized).unwrap_or_default();
    CacheKey {
        ir_structural_hash: fingerprint_of_str(&structural_text),
        bus_mapping_hash: fingerprint_of_str(bus_mapping_text),
        calibration_fingerprint: fingerprint_of_str(calibration_text),
        nshots,
        repetition_duration_ns,
        backend_parameters_hash: fingerprint_of_str(backend_parameters_text),
    }
}

fn fingerprint_of_str(text: &str) -> Fingerprint {
    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    Fingerprint(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qp_ir::{Builder, WaveformRef};
    use qp_waveforms::Waveform;

    fn program(duration_ns: u32) -> Vec<Node> {
        let mut b = Builder::new();
        b.play(
            "q0",
            WaveformRef::Waveform(Waveform::Square {
                amplitude: 1.0,
                duration_ns,
            }),
            None,
        )
        .unwrap();
        b.finish()
    }

    #[test]
    fn identical_inputs_produce_identical_keys() {
        let a = cache_key(&program(40), "{}", "{}", 1000, 200_000, "{}");
        let b = cache_key(&program(40), "{}", "{}", 1000, 200_000, "{}");
        assert_eq!(a, b);
    }

    #[test]
    fn differing_nshots_changes_the_key() {
        let a = cache_key(&program(40), "{}", "{}", 1000, 200_000, "{}");
        let b = cache_key(&program(40), "{}", "{}", 2000, 200_000, "{}");
        assert_ne!(a, b);
    }

    #[test]
    fn differing_program_changes_only_the_structural_hash() {
        let a = cache_key(&program(40), "{}", "{}", 1000, 200_000, "{}");
        let b = cache_key(&program(80), "{}", "{}", 1000, 200_000, "{}");
        assert_ne!(a.ir_structural_hash, b.ir_structural_hash);
        assert_eq!(a.bus_mapping_hash, b.bus_mapping_hash);
    }
}
