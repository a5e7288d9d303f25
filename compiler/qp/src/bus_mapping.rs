// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_ir::{Node, Operation};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Virtual-to-physical bus renaming applied after calibration and before
/// scheduling (spec §6.1). A bus absent from the map is left unchanged
/// (identity mapping).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BusMapping {
    map: FxHashMap<String, String>,
}

impl BusMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, virtual_bus: impl Into<String>, physical_bus: impl Into<String>) {
        self.map.insert(virtual_bus.into(), physical_bus.into());
    }

    /// Resolves a virtual bus name, falling back to `bus` itself when no
    /// mapping entry exists.
    #[must_use]
    pub fn resolve<'a>(&'a self, bus: &'a str) -> &'a str {
        self.map.get(bus).map_or(bus, String::as_str)
    }

    /// Rewrites every bus name reachable from `root` through this mapping.
    /// Mirrors `Calibration::finalize`'s recursive per-`Node`/`Operation`
    /// rewrite, since the two passes walk the same tree shape in sequence.
    #[must_use]
    pub fn apply(&self, root: &[Node]) -> Vec<Node> {
        root.iter().map(|n| self.apply_node(n)).collect()
    }

    fn apply_node(&self, node: &Node) -> Node {
        match node {
            Node::Block(children) => Node::Block(self.apply(children)),
            Node::InfiniteLoop(children) => Node::InfiniteLoop(self.apply(children)),
            Node::ForLoop {
                var,
                start,
                stop,
                step,
                body,
            } => Node::ForLoop {
                var: var.clone(),
                start: *start,
                stop: *stop,
                step: *step,
                body: self.apply(body),
            },
            Node::Loop { var, values, body } => Node::Loop {
                var: var.clone(),
                values: values.clone(),
                body: self.apply(body),
            },
            Node::Parallel { branches } => Node::Parallel {
                branches: branches
                    .iter()
                    .map(|b| qp_ir::ParallelBranch {
                        kind: b.kind.clone(),
                        body: self.apply(&b.body),
                    })
                    .collect(),
            },
            Node::Average { shots, body } => Node::Average {
                shots: *shots,
                body: self.apply(body),
            },
            Node::Op(op) => Node::Op(self.apply_operation(op)),
        }
    }

    fn apply_operation(&self, op: &Operation) -> Operation {
        match op {
            Operation::Play {
                bus,
                waveform,
                wait_time_ns,
            } => Operation::Play {
                bus: self.resolve(bus).to_string(),
                waveform: waveform.clone(),
                wait_time_ns: wait_time_ns.clone(),
            },
            Operation::Measure {
                bus,
                readout_waveform,
                weights,
                save_adc,
                rotation,
                threshold,
            } => Operation::Measure {
                bus: self.resolve(bus).to_string(),
                readout_waveform: readout_waveform.clone(),
                weights: weights.clone(),
                save_adc: *save_adc,
                rotation: rotation.clone(),
                threshold: *threshold,
            },
            Operation::Acquire {
                bus,
                weights,
                save_adc,
            } => Operation::Acquire {
                bus: self.resolve(bus).to_string(),
                weights: weights.clone(),
                save_adc: *save_adc,
            },
            Operation::Wait { bus, duration_ns } => Operation::Wait {
                bus: self.resolve(bus).to_string(),
                duration_ns: duration_ns.clone(),
            },
            Operation::Sync { buses } => Operation::Sync {
                buses: buses.iter().map(|b| self.resolve(b).to_string()).collect(),
            },
            Operation::WaitTrigger {
                bus,
                duration_ns,
                trigger_address,
            } => Operation::WaitTrigger {
                bus: self.resolve(bus).to_string(),
                duration_ns: duration_ns.clone(),
                trigger_address: *trigger_address,
            },
            Operation::SetFrequency { bus, freq_hz } => Operation::SetFrequency {
                bus: self.resolve(bus).to_string(),
                freq_hz: freq_hz.clone(),
            },
            Operation::SetPhase { bus, phase_rad } => Operation::SetPhase {
                bus: self.resolve(bus).to_string(),
                phase_rad: phase_rad.clone(),
            },
            Operation::ResetPhase { bus } => Operation::ResetPhase {
                bus: self.resolve(bus).to_string(),
            },
            Operation::SetGain { bus, gain_i, gain_q } => Operation::SetGain {
                bus: self.resolve(bus).to_string(),
                gain_i: gain_i.clone(),
                gain_q: gain_q.clone(),
            },
            Operation::SetOffset {
                bus,
                offset_i,
                offset_q,
            } => Operation::SetOffset {
                bus: self.resolve(bus).to_string(),
                offset_i: offset_i.clone(),
                offset_q: offset_q.clone(),
            },
            Operation::SetMarkers { bus, mask } => Operation::SetMarkers {
                bus: self.resolve(bus).to_string(),
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
                bus: self.resolve(bus).to_string(),
                readout_waveform: readout_waveform.clone(),
                weights: weights.clone(),
                control_bus: self.resolve(control_bus).to_string(),
                reset_pulse: reset_pulse.clone(),
                trigger_address: *trigger_address,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qp_ir::{Builder, WaveformRef};
    use qp_waveforms::Waveform;

    #[test]
    fn unmapped_bus_is_left_unchanged() {
        let mapping = BusMapping::new();
        assert_eq!(mapping.resolve("q0"), "q0");
    }

    #[test]
    fn mapped_bus_is_renamed_throughout_the_tree() {
        let mut mapping = BusMapping::new();
        mapping.set("q0", "sequencer3");

        let mut b = Builder::new();
        b.play("q0", WaveformRef::Waveform(Waveform::Square { amplitude: 1.0, duration_ns: 40 }), None)
            .unwrap();
        let root = b.finish();

        let mapped = mapping.apply(&root);
        let Node::Op(Operation::Play { bus, .. }) = &mapped[0] else {
            panic!("expected a Play operation");
        };
        assert_eq!(bus, "sequencer3");
    }
}
