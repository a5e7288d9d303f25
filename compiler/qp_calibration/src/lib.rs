// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Human-editable calibration data: named waveforms, weights, and
//! precompiled blocks that a [`qp_ir::Builder`] session resolves against at
//! construction time, or a finished [`qp_ir::QProgram`] is finalized
//! against before scheduling.

mod calibration;
mod errors;

pub use calibration::{Calibration, CalibratedWaveform, CURRENT_VERSION};
pub use errors::CalibrationMiss;
