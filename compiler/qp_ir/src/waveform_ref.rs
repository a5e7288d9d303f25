// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_waveforms::{IQPair, Waveform, Weights};
use serde::{Deserialize, Serialize};

/// Either a precalibrated value, resolved by name at finalization time
/// against a `Calibration` store (spec §3.4), or an already-resolved
/// in-line descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WaveformRef {
    Named(String),
    Waveform(Waveform),
    IQPair(IQPair),
}

impl WaveformRef {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            WaveformRef::Named(name) => Some(name),
            WaveformRef::Waveform(_) | WaveformRef::IQPair(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WeightsRef {
    Named(String),
    Weights(Weights),
    /// `Acquire`'s `weights_or_duration`: an unweighted integration window of
    /// the given duration (spec §3.3).
    Duration(u32),
}

impl WeightsRef {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            WeightsRef::Named(name) => Some(name),
            WeightsRef::Weights(_) | WeightsRef::Duration(_) => None,
        }
    }
}
