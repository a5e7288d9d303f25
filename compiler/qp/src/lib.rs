// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Top-level orchestration crate (spec §2, final stage): wires the IR
//! builder, calibration store, bus mapping, scheduler, and code generator
//! into a single [`compile`] entrypoint, producing one Q1ASM
//! [`CompilationOutput`] per bus touched by a program.

mod bus_mapping;
mod cache;
mod compile;
mod config;
mod errors;
mod output;

pub use bus_mapping::BusMapping;
pub use cache::{cache_key, CacheKey};
pub use compile::compile;
pub use config::{BackendConfig, BusConfig};
pub use errors::CompileError;
pub use output::{ArmParameters, BusOutput, CompilationOutput};

pub use qp_calibration::{CalibratedWaveform, Calibration};
pub use qp_ir::{Builder, BuildError, Domain, Node, Operand, ScalarType, Variable, WaveformRef, WeightsRef};
pub use qp_scheduler::{SchedulerDiagnostic, SchedulerError};
