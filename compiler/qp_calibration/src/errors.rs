// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Raised when a `Calibration` store has no entry for a referenced name
/// (spec §3.4, §4.1).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CalibrationMiss {
    #[error("no calibrated waveform named `{name}` on bus `{bus}`")]
    Waveform { bus: String, name: String },

    #[error("no calibrated weights named `{name}` on bus `{bus}`")]
    Weights { bus: String, name: String },

    #[error("no calibrated block named `{0}`")]
    Block(String),
}
