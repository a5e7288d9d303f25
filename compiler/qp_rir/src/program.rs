// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ids::{AcquisitionIndex, WaveformId, WeightId};
use crate::instr::Instr;
use crate::table::DedupTable;

/// A dedup-table entry for a single real-valued sample sequence. `I` and
/// `Q` channels of a waveform or weight each occupy their own entry (spec
/// §6.2: "real+imag each count once").
pub type WaveformEntry = Vec<f64>;
pub type WeightEntry = Vec<f64>;

/// Bin/loop-shape metadata for one acquisition index (spec §3.5, §4.4.6).
#[derive(Clone, Debug, PartialEq)]
pub struct AcquisitionSpec {
    pub index: AcquisitionIndex,
    pub num_bins: u32,
    /// Iteration counts of the loop nest the acquire sits in, outermost
    /// first, so callers can reshape a flat bin buffer back to N-D.
    pub loop_shape: Vec<u32>,
}

/// The fully lowered Q1ASM program for one bus (spec §4.4, §4.5).
#[derive(Default)]
pub struct BusProgram {
    pub setup: Vec<Instr>,
    pub main: Vec<Instr>,
    pub stop: Vec<Instr>,
    pub waveforms: DedupTable<WaveformId, WaveformEntry>,
    pub weights: DedupTable<WeightId, WeightEntry>,
    pub acquisitions: Vec<AcquisitionSpec>,
}

impl BusProgram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All instructions in on-disk program order: `setup`, then `main`,
    /// then `stop`.
    pub fn instructions(&self) -> impl Iterator<Item = &Instr> {
        self.setup.iter().chain(&self.main).chain(&self.stop)
    }
}

impl std::fmt::Display for BusProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "setup:")?;
        for instr in &self.setup {
            writeln!(f, "{instr}")?;
        }
        writeln!(f, "main:")?;
        for instr in &self.main {
            writeln!(f, "{instr}")?;
        }
        writeln!(f, "stop:")?;
        for instr in &self.stop {
            writeln!(f, "{instr}")?;
        }
        Ok(())
    }
}
