// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The pulse-level program intermediate representation: a tree of scoped
//! blocks and leaf operations over named buses, built with [`Builder`] and
//! handed to the scheduler and calibration passes further down the pipeline.

mod block;
mod builder;
mod domain;
mod errors;
mod operand;
mod ops;
mod serialize;
mod variable;
mod waveform_ref;

pub use block::{for_loop_iteration_count, LoopKind, Node, ParallelBranch};
pub use builder::Builder;
pub use domain::{Domain, ScalarType};
pub use errors::BuildError;
pub use operand::{FreqOperand, GainOperand, Operand, PhaseOperand, TimeOperand};
pub use ops::{Bus, Operation};
pub use serialize::{SerializedProgram, CURRENT_VERSION};
pub use variable::{Variable, VariableId};
pub use waveform_ref::{WaveformRef, WeightsRef};

/// A complete pulse program: a forest of top-level [`Node`]s built by a
/// [`Builder`] session (spec §3.1, §4.1).
#[derive(Clone, Debug, PartialEq)]
pub struct QProgram {
    pub root: Vec<Node>,
}

impl QProgram {
    #[must_use]
    pub fn new(root: Vec<Node>) -> Self {
        Self { root }
    }

    /// Visits every leaf [`Operation`] in program order.
    pub fn for_each_operation(&self, mut visit: impl FnMut(&Operation)) {
        for node in &self.root {
            node.for_each_operation(&mut visit);
        }
    }

    #[must_use]
    pub fn to_serialized(&self) -> SerializedProgram {
        SerializedProgram::from_root(&self.root)
    }

    #[must_use]
    pub fn from_serialized(serialized: SerializedProgram) -> Option<Self> {
        serialized.into_root().map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform_ref::WaveformRef;
    use qp_waveforms::Waveform;

    #[test]
    fn for_each_operation_visits_in_program_order() {
        let mut b = Builder::new();
        b.play(
            "q0",
            WaveformRef::Waveform(Waveform::Square {
                amplitude: 1.0,
                duration_ns: 40,
            }),
            None,
        )
        .unwrap();
        b.play(
            "q0",
            WaveformRef::Waveform(Waveform::Square {
                amplitude: 0.5,
                duration_ns: 20,
            }),
            None,
        )
        .unwrap();
        let program = QProgram::new(b.finish());

        let mut seen = Vec::new();
        program.for_each_operation(|op| {
            if let Operation::Play { waveform, .. } = op {
                if let WaveformRef::Waveform(Waveform::Square { duration_ns, .. }) = waveform {
                    seen.push(*duration_ns);
                }
            }
        });
        assert_eq!(seen, vec![40, 20]);
    }
}
