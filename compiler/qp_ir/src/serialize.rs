// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Versioned, on-disk representation of a [`crate::QProgram`].
//!
//! Variable ids are builder-session-local (spec §4.1): two programs built in
//! separate `Builder` sessions may reuse the same raw `VariableId` values
//! without meaning the same thing. Serialization walks the tree in
//! pre-order, assigns each variable a dense index at its first occurrence,
//! and writes operands against that dense index instead of the raw id; load
//! reverses the process, allocating fresh ids as each dense index is first
//! seen (spec §4.1).

use crate::block::{LoopKind, Node, ParallelBranch};
use crate::operand::Operand;
use crate::ops::Operation;
use crate::variable::{Variable, VariableId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerializedProgram {
    pub version: u32,
    pub root: Vec<Node>,
}

impl SerializedProgram {
    /// Serializes `root`, remapping every [`VariableId`] to a dense,
    /// first-occurrence index so the result is stable across builder
    /// sessions.
    #[must_use]
    pub fn from_root(root: &[Node]) -> Self {
        let mut remap = FxHashMap::default();
        let remapped = root.iter().map(|n| remap_node(n, &mut remap)).collect();
        SerializedProgram {
            version: CURRENT_VERSION,
            root: remapped,
        }
    }

    /// Loads a program, allocating fresh [`VariableId`]s as each dense index
    /// is first encountered. Returns `None` for an unsupported version.
    #[must_use]
    pub fn into_root(self) -> Option<Vec<Node>> {
        if self.version != CURRENT_VERSION {
            return None;
        }
        let mut remap = FxHashMap::default();
        let mut next_id = 0u32;
        Some(
            self.root
                .into_iter()
                .map(|n| unmap_node(n, &mut remap, &mut next_id))
                .collect(),
        )
    }
}

fn remap_variable(var: &Variable, remap: &mut FxHashMap<VariableId, VariableId>) -> Variable {
    let next = remap.len() as u32;
    let dense = *remap.entry(var.id()).or_insert(VariableId(next));
    let mut remapped = var.clone();
    remapped.id = dense;
    remapped
}

fn remap_operand<T: Clone>(
    operand: &Operand<T>,
    remap: &mut FxHashMap<VariableId, VariableId>,
) -> Operand<T> {
    match operand {
        Operand::Literal(value) => Operand::Literal(value.clone()),
        Operand::Variable(var) => Operand::Variable(remap_variable(var, remap)),
    }
}

fn remap_operation(op: &Operation, remap: &mut FxHashMap<VariableId, VariableId>) -> Operation {
    match op {
        Operation::Play {
            bus,
            waveform,
            wait_time_ns,
        } => Operation::Play {
            bus: bus.clone(),
            waveform: waveform.clone(),
            wait_time_ns: wait_time_ns.as_ref().map(|o| remap_operand(o, remap)),
        },
        Operation::Measure {
            bus,
            readout_waveform,
            weights,
            save_adc,
            rotation,
            threshold,
        } => Operation::Measure {
            bus: bus.clone(),
            readout_waveform: readout_waveform.clone(),
            weights: weights.clone(),
            save_adc: *save_adc,
            rotation: rotation.as_ref().map(|o| remap_operand(o, remap)),
            threshold: *threshold,
        },
        Operation::Acquire {
            bus,
            weights,
            save_adc,
        } => Operation::Acquire {
            bus: bus.clone(),
            weights: weights.clone(),
            save_adc: *save_adc,
        },
        Operation::Wait { bus, duration_ns } => Operation::Wait {
            bus: bus.clone(),
            duration_ns: remap_operand(duration_ns, remap),
        },
        Operation::Sync { buses } => Operation::Sync {
            buses: buses.clone(),
        },
        Operation::WaitTrigger {
            bus,
            duration_ns,
            trigger_address,
        } => Operation::WaitTrigger {
            bus: bus.clone(),
            duration_ns: remap_operand(duration_ns, remap),
            trigger_address: *trigger_address,
        },
        Operation::SetFrequency { bus, freq_hz } => Operation::SetFrequency {
            bus: bus.clone(),
            freq_hz: remap_operand(freq_hz, remap),
        },
        Operation::SetPhase { bus, phase_rad } => Operation::SetPhase {
            bus: bus.clone(),
            phase_rad: remap_operand(phase_rad, remap),
        },
        Operation::ResetPhase { bus } => Operation::ResetPhase { bus: bus.clone() },
        Operation::SetGain {
            bus,
            gain_i,
            gain_q,
        } => Operation::SetGain {
            bus: bus.clone(),
            gain_i: remap_operand(gain_i, remap),
            gain_q: gain_q.as_ref().map(|o| remap_operand(o, remap)),
        },
        Operation::SetOffset {
            bus,
            offset_i,
            offset_q,
        } => Operation::SetOffset {
            bus: bus.clone(),
            offset_i: remap_operand(offset_i, remap),
            offset_q: offset_q.as_ref().map(|o| remap_operand(o, remap)),
        },
        Operation::SetMarkers { bus, mask } => Operation::SetMarkers {
            bus: bus.clone(),
            mask: *mask,
        },
        Operation::MeasureReset {
            bus,
            readout_waveform,
            weights,
            control_bus,
            reset_pulse,
            trigger_address,
        } => Operation::MeasureReset {
            bus: bus.clone(),
            readout_waveform: readout_waveform.clone(),
            weights: weights.clone(),
            control_bus: control_bus.clone(),
            reset_pulse: reset_pulse.clone(),
            trigger_address: *trigger_address,
        },
    }
}

fn remap_loop_kind(kind: &LoopKind, remap: &mut FxHashMap<VariableId, VariableId>) -> LoopKind {
    match kind {
        LoopKind::For {
            var,
            start,
            stop,
            step,
        } => LoopKind::For {
            var: remap_variable(var, remap),
            start: *start,
            stop: *stop,
            step: *step,
        },
        LoopKind::Values { var, values } => LoopKind::Values {
            var: remap_variable(var, remap),
            values: values.clone(),
        },
    }
}

fn remap_node(node: &Node, remap: &mut FxHashMap<VariableId, VariableId>) -> Node {
    match node {
        Node::Block(children) => {
            Node::Block(children.iter().map(|c| remap_node(c, remap)).collect())
        }
        Node::InfiniteLoop(children) => {
            Node::InfiniteLoop(children.iter().map(|c| remap_node(c, remap)).collect())
        }
        Node::ForLoop {
            var,
            start,
            stop,
            step,
            body,
        } => Node::ForLoop {
            var: remap_variable(var, remap),
            start: *start,
            stop: *stop,
            step: *step,
            body: body.iter().map(|c| remap_node(c, remap)).collect(),
        },
        Node::Loop { var, values, body } => Node::Loop {
            var: remap_variable(var, remap),
            values: values.clone(),
            body: body.iter().map(|c| remap_node(c, remap)).collect(),
        },
        Node::Parallel { branches } => Node::Parallel {
            branches: branches
                .iter()
                .map(|b| ParallelBranch {
                    kind: remap_loop_kind(&b.kind, remap),
                    body: b.body.iter().map(|c| remap_node(c, remap)).collect(),
                })
                .collect(),
        },
        Node::Average { shots, body } => Node::Average {
            shots: *shots,
            body: body.iter().map(|c| remap_node(c, remap)).collect(),
        },
        Node::Op(op) => Node::Op(remap_operation(op, remap)),
    }
}

fn unmap_variable(
    var: Variable,
    remap: &mut FxHashMap<VariableId, VariableId>,
    next_id: &mut u32,
) -> Variable {
    let fresh = *remap.entry(var.id()).or_insert_with(|| {
        let id = VariableId(*next_id);
        *next_id += 1;
        id
    });
    let mut var = var;
    var.id = fresh;
    var
}

fn unmap_operand<T>(
    operand: Operand<T>,
    remap: &mut FxHashMap<VariableId, VariableId>,
    next_id: &mut u32,
) -> Operand<T> {
    match operand {
        Operand::Literal(value) => Operand::Literal(value),
        Operand::Variable(var) => Operand::Variable(unmap_variable(var, remap, next_id)),
    }
}

fn unmap_operation(
    op: Operation,
    remap: &mut FxHashMap<VariableId, VariableId>,
    next_id: &mut u32,
) -> Operation {
    match op {
        Operation::Play {
            bus,
            waveform,
            wait_time_ns,
        } => Operation::Play {
            bus,
            waveform,
            wait_time_ns: wait_time_ns.map(|o| unmap_operand(o, remap, next_id)),
        },
        Operation::Measure {
            bus,
            readout_waveform,
            weights,
            save_adc,
            rotation,
            threshold,
        } => Operation::Measure {
            bus,
            readout_waveform,
            weights,
            save_adc,
            rotation: rotation.map(|o| unmap_operand(o, remap, next_id)),
            threshold,
        },
        Operation::Acquire {
            bus,
            weights,
            save_adc,
        } => Operation::Acquire {
            bus,
            weights,
            save_adc,
        },
        Operation::Wait { bus, duration_ns } => Operation::Wait {
            bus,
            duration_ns: unmap_operand(duration_ns, remap, next_id),
        },
        Operation::Sync { buses } => Operation::Sync { buses },
        Operation::WaitTrigger {
            bus,
            duration_ns,
            trigger_address,
        } => Operation::WaitTrigger {
            bus,
            duration_ns: unmap_operand(duration_ns, remap, next_id),
            trigger_address,
        },
        Operation::SetFrequency { bus, freq_hz } => Operation::SetFrequency {
            bus,
            freq_hz: unmap_operand(freq_hz, remap, next_id),
        },
        Operation::SetPhase { bus, phase_rad } => Operation::SetPhase {
            bus,
            phase_rad: unmap_operand(phase_rad, remap, next_id),
        },
        Operation::ResetPhase { bus } => Operation::ResetPhase { bus },
        Operation::SetGain {
            bus,
            gain_i,
            gain_q,
        } => Operation::SetGain {
            bus,
            gain_i: unmap_operand(gain_i, remap, next_id),
            gain_q: gain_q.map(|o| unmap_operand(o, remap, next_id)),
        },
        Operation::SetOffset {
            bus,
            offset_i,
            offset_q,
        } => Operation::SetOffset {
            bus,
            offset_i: unmap_operand(offset_i, remap, next_id),
            offset_q: offset_q.map(|o| unmap_operand(o, remap, next_id)),
        },
        Operation::SetMarkers { bus, mask } => Operation::SetMarkers { bus, mask },
        Operation::MeasureReset {
            bus,
            readout_waveform,
            weights,
            control_bus,
            reset_pulse,
            trigger_address,
        } => Operation::MeasureReset {
            bus,
            readout_waveform,
            weights,
            control_bus,
            reset_pulse,
            trigger_address,
        },
    }
}

fn unmap_loop_kind(
    kind: LoopKind,
    remap: &mut FxHashMap<VariableId, VariableId>,
    next_id: &mut u32,
) -> LoopKind {
    match kind {
        LoopKind::For {
            var,
            start,
            stop,
            step,
        } => LoopKind::For {
            var: unmap_variable(var, remap, next_id),
            start,
            stop,
            step,
        },
        LoopKind::Values { var, values } => LoopKind::Values {
            var: unmap_variable(var, remap, next_id),
            values,
        },
    }
}

fn unmap_node(
    node: Node,
    remap: &mut FxHashMap<VariableId, VariableId>,
    next_id: &mut u32,
) -> Node {
    match node {
        Node::Block(children) => Node::Block(
            children
                .into_iter()
                .map(|c| unmap_node(c, remap, next_id))
                .collect(),
        ),
        Node::InfiniteLoop(children) => Node::InfiniteLoop(
            children
                .into_iter()
                .map(|c| unmap_node(c, remap, next_id))
                .collect(),
        ),
        Node::ForLoop {
            var,
            start,
            stop,
            step,
            body,
        } => Node::ForLoop {
            var: unmap_variable(var, remap, next_id),
            start,
            stop,
            step,
            body: body
                .into_iter()
                .map(|c| unmap_node(c, remap, next_id))
                .collect(),
        },
        Node::Loop { var, values, body } => Node::Loop {
            var: unmap_variable(var, remap, next_id),
            values,
            body: body
                .into_iter()
                .map(|c| unmap_node(c, remap, next_id))
                .collect(),
        },
        Node::Parallel { branches } => Node::Parallel {
            branches: branches
                .into_iter()
                .map(|b| ParallelBranch {
                    kind: unmap_loop_kind(b.kind, remap, next_id),
                    body: b
                        .body
                        .into_iter()
                        .map(|c| unmap_node(c, remap, next_id))
                        .collect(),
                })
                .collect(),
        },
        Node::Average { shots, body } => Node::Average {
            shots,
            body: body
                .into_iter()
                .map(|c| unmap_node(c, remap, next_id))
                .collect(),
        },
        Node::Op(op) => Node::Op(unmap_operation(op, remap, next_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::domain::Domain;
    use crate::waveform_ref::WaveformRef;
    use qp_waveforms::Waveform;

    fn square(duration_ns: u32) -> WaveformRef {
        WaveformRef::Waveform(Waveform::Square {
            amplitude: 1.0,
            duration_ns,
        })
    }

    #[test]
    fn round_trip_preserves_structure() {
        let mut b = Builder::new();
        let f = b.variable("f", Domain::Frequency).unwrap();
        b.for_loop(&f, 100e6, 200e6, 10e6, |inner| {
            inner
                .set_frequency("readout", Operand::Variable(f.clone()))
                .unwrap();
            inner.play("readout", square(100), None).unwrap();
        });
        let root = b.finish();

        let serialized = SerializedProgram::from_root(&root);
        assert_eq!(serialized.version, CURRENT_VERSION);
        let restored = serialized.into_root().expect("current version loads");

        let Node::ForLoop { var, .. } = &restored[0] else {
            panic!("expected a for loop");
        };
        assert_eq!(var.id(), VariableId(0));
    }

    #[test]
    fn unsupported_version_refuses_to_load() {
        let serialized = SerializedProgram {
            version: CURRENT_VERSION + 1,
            root: Vec::new(),
        };
        assert!(serialized.into_root().is_none());
    }
}
