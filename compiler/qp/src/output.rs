// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_rir::BusProgram;
use serde::{Deserialize, Serialize};

/// Per-bus sequencer arm-time parameters carried alongside the Q1ASM text
/// (spec §6.1 `ArmParameters`).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ArmParameters {
    pub markers_default: u8,
}

/// One bus's compiled output (spec §4.5, §6.2): the Q1ASM program text plus
/// its waveform, weight, and acquisition tables, each flattened in
/// fingerprint-insertion order.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BusOutput {
    pub bus: String,
    pub program: String,
    pub waveforms: Vec<(u16, Vec<f64>)>,
    pub weights: Vec<(u16, Vec<f64>)>,
    pub acquisitions: Vec<(u16, u32)>,
    pub arm_parameters: ArmParameters,
}

impl BusOutput {
    #[must_use]
    pub fn from_program(bus: String, program: BusProgram, arm_parameters: ArmParameters) -> Self {
        let waveforms = program.waveforms.iter().map(|(id, wf)| (id.0, wf.clone())).collect();
        let weights = program.weights.iter().map(|(id, w)| (id.0, w.clone())).collect();
        let acquisitions = program
            .acquisitions
            .iter()
            .map(|spec| (spec.index.0, spec.num_bins))
            .collect();
        Self {
            bus,
            program: program.to_string(),
            waveforms,
            weights,
            acquisitions,
            arm_parameters,
        }
    }
}

/// The compiled output for an entire backend request (spec §4.5): one
/// [`BusOutput`] per bus touched by the program.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CompilationOutput {
    pub buses: Vec<BusOutput>,
}

impl CompilationOutput {
    #[must_use]
    pub fn bus(&self, name: &str) -> Option<&BusOutput> {
        self.buses.iter().find(|b| b.bus == name)
    }
}
