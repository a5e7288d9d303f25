// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The Q1ASM-level representation: per-bus instruction sections, waveform
//! and weight tables, acquisition descriptors, and the register allocator
//! the code generator lowers into.

mod debug;
mod ids;
mod instr;
mod program;
mod register;
mod table;

pub use debug::BusProgramDump;
pub use ids::{AcquisitionIndex, Register, WaveformId, WeightId};
pub use instr::{Instr, Value};
pub use program::{AcquisitionSpec, BusProgram, WaveformEntry, WeightEntry};
pub use register::{RegisterAllocator, RegisterOverflow};
pub use table::DedupTable;
