// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Errors raised while projecting a `QProgram` onto per-bus timelines
/// (spec §4.3).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SchedulerError {
    #[error("parallel branches must share an iteration count, found {counts:?}")]
    ParallelLengthMismatch { counts: Vec<usize> },

    #[error("bus `{bus}` has a waveform whose name was never resolved by calibration")]
    UnresolvedWaveform { bus: String },

    #[error("bus `{bus}` has weights whose name was never resolved by calibration")]
    UnresolvedWeights { bus: String },
}

/// A non-fatal scheduling diagnostic (spec §4.3 "reports via a structured
/// diagnostic").
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerDiagnostic {
    /// Two consecutive plays on `bus` fell within less than `MIN_CLOCK`;
    /// the earlier one was padded by `inserted_ns` to restore alignment.
    ClockPadding { bus: String, inserted_ns: u32 },
}
