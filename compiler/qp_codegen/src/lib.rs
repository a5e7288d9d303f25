// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lowers a scheduled, calibrated per-bus `Node` tree into a Q1ASM
//! [`qp_rir::BusProgram`]: register allocation, wait coalescing, waveform
//! chunking, and acquisition bookkeeping (spec §4.4-§4.5).

mod acquire;
mod context;
mod errors;
mod lower;
mod play;
mod quantize;
mod wait;

pub use errors::CodegenError;
pub use lower::lower_bus;
pub use quantize::{freq_hz, gain, phase_rad, time_ns};
