// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_rir::RegisterOverflow;
use thiserror::Error;

/// Errors raised while lowering a scheduled, calibration-resolved IR tree
/// into a single bus's Q1ASM program (spec §4.4.10).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CodegenError {
    #[error("bus `{bus}`: {source}")]
    Registers {
        bus: String,
        #[source]
        source: RegisterOverflow,
    },
    #[error("bus `{bus}`: acquisition overflow, {count} distinct indices requested (max {max})")]
    AcquisitionOverflow { bus: String, count: usize, max: usize },
    #[error("bus `{bus}`: waveform has zero duration, which cannot be played")]
    BadWaveformDuration { bus: String },
    #[error("bus `{bus}`: value {value} for `{param}` is out of range {min}..={max}")]
    OutOfRange {
        bus: String,
        param: String,
        value: f64,
        min: f64,
        max: f64,
    },
}
