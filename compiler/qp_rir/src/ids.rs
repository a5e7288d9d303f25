// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

qp_data_structures::index_type! {
    /// Index of a waveform table entry, assigned in fingerprint-insertion
    /// order (spec §3.5, §6.2).
    pub struct WaveformId(u16);
}

qp_data_structures::index_type! {
    /// Index of a weight table entry, assigned in fingerprint-insertion
    /// order (spec §3.5, §6.2).
    pub struct WeightId(u16);
}

qp_data_structures::index_type! {
    /// Index of an acquisition bin accumulator (spec §3.5).
    pub struct AcquisitionIndex(u16);
}

/// A Q1ASM register, `R0..Rn` (spec §4.4.1).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Register(pub u8);

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}
