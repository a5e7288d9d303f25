// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::CalibrationMiss;
use qp_ir::{Node, Operation, WaveformRef, WeightsRef};
use qp_waveforms::{IQPair, Waveform, Weights};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: u32 = 1;

/// A calibrated waveform entry: either a single-channel descriptor or an I/Q
/// pair (spec §3.4).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CalibratedWaveform {
    Single(Waveform),
    IqPair(IQPair),
}

impl CalibratedWaveform {
    fn into_waveform_ref(self) -> WaveformRef {
        match self {
            CalibratedWaveform::Single(wf) => WaveformRef::Waveform(wf),
            CalibratedWaveform::IqPair(iq) => WaveformRef::IQPair(iq),
        }
    }
}

/// Human-editable calibration store: named waveforms, weights, and
/// precompiled blocks, keyed per bus (spec §3.4, §6.1). Persisted as JSON
/// text so a calibration file can be hand-edited between experiment runs.
#[derive(Clone, Debug)]
pub struct Calibration {
    version: u32,
    waveforms: FxHashMap<(String, String), CalibratedWaveform>,
    weights: FxHashMap<(String, String), Weights>,
    blocks: FxHashMap<String, Vec<Node>>,
}

impl Calibration {
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: CURRENT_VERSION,
            waveforms: FxHashMap::default(),
            weights: FxHashMap::default(),
            blocks: FxHashMap::default(),
        }
    }

    pub fn add_waveform(&mut self, bus: impl Into<String>, name: impl Into<String>, wf: CalibratedWaveform) {
        self.waveforms.insert((bus.into(), name.into()), wf);
    }

    pub fn add_weights(&mut self, bus: impl Into<String>, name: impl Into<String>, weights: Weights) {
        self.weights.insert((bus.into(), name.into()), weights);
    }

    pub fn add_block(&mut self, name: impl Into<String>, block: Vec<Node>) {
        self.blocks.insert(name.into(), block);
    }

    /// Looks up a precompiled block by name, for use with
    /// `qp_ir::Builder::insert_precompiled`.
    pub fn block(&self, name: &str) -> Result<&[Node], CalibrationMiss> {
        self.blocks
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CalibrationMiss::Block(name.to_string()))
    }

    /// Serializes this calibration store to its JSON text form.
    ///
    /// # Errors
    /// Returns an error if the in-memory store somehow contains
    /// non-serializable data; in practice this never fails for values built
    /// through the public API.
    pub fn save_to_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&SerializedCalibration::from(self))
    }

    /// Parses a calibration store from its JSON text form.
    ///
    /// # Errors
    /// Returns an error if `text` is not valid calibration JSON.
    pub fn load_from_str(text: &str) -> serde_json::Result<Self> {
        let serialized: SerializedCalibration = serde_json::from_str(text)?;
        Ok(serialized.into())
    }

    /// Resolves every `Named` waveform/weights reference reachable from
    /// `root` against this store, returning a fully-resolved copy of the
    /// tree. Precompiled-block references are inserted by the builder at
    /// construction time (spec §4.1) and are not revisited here.
    ///
    /// # Errors
    /// Returns [`CalibrationMiss`] naming the first unresolved `bus`/`name`
    /// pair encountered, in program order.
    pub fn finalize(&self, root: &[Node]) -> Result<Vec<Node>, CalibrationMiss> {
        root.iter().map(|n| self.finalize_node(n)).collect()
    }

    fn finalize_node(&self, node: &Node) -> Result<Node, CalibrationMiss> {
        Ok(match node {
            Node::Block(children) => Node::Block(self.finalize(children)?),
            Node::InfiniteLoop(children) => Node::InfiniteLoop(self.finalize(children)?),
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
                body: self.finalize(body)?,
            },
            Node::Loop { var, values, body } => Node::Loop {
                var: var.clone(),
                values: values.clone(),
                body: self.finalize(body)?,
            },
            Node::Parallel { branches } => Node::Parallel {
                branches: branches
                    .iter()
                    .map(|b| {
                        Ok(qp_ir::ParallelBranch {
                            kind: b.kind.clone(),
                            body: self.finalize(&b.body)?,
                        })
                    })
                    .collect::<Result<_, CalibrationMiss>>()?,
            },
            Node::Average { shots, body } => Node::Average {
                shots: *shots,
                body: self.finalize(body)?,
            },
            Node::Op(op) => Node::Op(self.finalize_operation(op)?),
        })
    }

    fn resolve_waveform(&self, bus: &str, waveform: &WaveformRef) -> Result<WaveformRef, CalibrationMiss> {
        match waveform {
            WaveformRef::Named(name) => self
                .waveforms
                .get(&(bus.to_string(), name.clone()))
                .cloned()
                .map(CalibratedWaveform::into_waveform_ref)
                .ok_or_else(|| CalibrationMiss::Waveform {
                    bus: bus.to_string(),
                    name: name.clone(),
                }),
            other => Ok(other.clone()),
        }
    }

    fn resolve_weights(&self, bus: &str, weights: &WeightsRef) -> Result<WeightsRef, CalibrationMiss> {
        match weights {
            WeightsRef::Named(name) => self
                .weights
                .get(&(bus.to_string(), name.clone()))
                .cloned()
                .map(WeightsRef::Weights)
                .ok_or_else(|| CalibrationMiss::Weights {
                    bus: bus.to_string(),
                    name: name.clone(),
                }),
            other => Ok(other.clone()),
        }
    }

    fn finalize_operation(&self, op: &Operation) -> Result<Operation, CalibrationMiss> {
        Ok(match op {
            Operation::Play {
                bus,
                waveform,
                wait_time_ns,
            } => Operation::Play {
                bus: bus.clone(),
                waveform: self.resolve_waveform(bus, waveform)?,
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
                bus: bus.clone(),
                readout_waveform: self.resolve_waveform(bus, readout_waveform)?,
                weights: self.resolve_weights(bus, weights)?,
                save_adc: *save_adc,
                rotation: rotation.clone(),
                threshold: *threshold,
            },
            Operation::Acquire {
                bus,
                weights,
                save_adc,
            } => Operation::Acquire {
                bus: bus.clone(),
                weights: self.resolve_weights(bus, weights)?,
                save_adc: *save_adc,
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
                readout_waveform: self.resolve_waveform(bus, readout_waveform)?,
                weights: self.resolve_weights(bus, weights)?,
                control_bus: control_bus.clone(),
                reset_pulse: self.resolve_waveform(control_bus, reset_pulse)?,
                trigger_address: *trigger_address,
            },
            other => other.clone(),
        })
    }
}

/// On-disk shape. `FxHashMap` keys are tuples, which `serde_json` cannot
/// represent as object keys directly, so the wire format flattens each map
/// into a `Vec` of entries.
#[derive(Serialize, Deserialize)]
struct SerializedCalibration {
    version: u32,
    waveforms: Vec<WaveformEntry>,
    weights: Vec<WeightsEntry>,
    blocks: Vec<BlockEntry>,
}

#[derive(Serialize, Deserialize)]
struct WaveformEntry {
    bus: String,
    name: String,
    value: CalibratedWaveform,
}

#[derive(Serialize, Deserialize)]
struct WeightsEntry {
    bus: String,
    name: String,
    value: Weights,
}

#[derive(Serialize, Deserialize)]
struct BlockEntry {
    name: String,
    nodes: Vec<Node>,
}

impl From<&Calibration> for SerializedCalibration {
    fn from(cal: &Calibration) -> Self {
        SerializedCalibration {
            version: cal.version,
            waveforms: cal
                .waveforms
                .iter()
                .map(|((bus, name), value)| WaveformEntry {
                    bus: bus.clone(),
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            weights: cal
                .weights
                .iter()
                .map(|((bus, name), value)| WeightsEntry {
                    bus: bus.clone(),
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            blocks: cal
                .blocks
                .iter()
                .map(|(name, nodes)| BlockEntry {
                    name: name.clone(),
                    nodes: nodes.clone(),
                })
                .collect(),
        }
    }
}

impl From<SerializedCalibration> for Calibration {
    fn from(serialized: SerializedCalibration) -> Self {
        Calibration {
            version: serialized.version,
            waveforms: serialized
                .waveforms
                .into_iter()
                .map(|e| ((e.bus, e.name), e.value))
                .collect(),
            weights: serialized
                .weights
                .into_iter()
                .map(|e| ((e.bus, e.name), e.value))
                .collect(),
            blocks: serialized
                .blocks
                .into_iter()
                .map(|e| (e.name, e.nodes))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qp_ir::Builder;

    #[test]
    fn named_waveform_resolves_against_store() {
        let mut cal = Calibration::new();
        cal.add_waveform(
            "q0",
            "pi_pulse",
            CalibratedWaveform::Single(Waveform::Square {
                amplitude: 0.5,
                duration_ns: 40,
            }),
        );

        let mut b = Builder::new();
        b.play("q0", WaveformRef::Named("pi_pulse".to_string()), None)
            .unwrap();
        let root = b.finish();

        let resolved = cal.finalize(&root).unwrap();
        let Node::Op(Operation::Play { waveform, .. }) = &resolved[0] else {
            panic!("expected a play op");
        };
        assert_eq!(
            *waveform,
            WaveformRef::Waveform(Waveform::Square {
                amplitude: 0.5,
                duration_ns: 40
            })
        );
    }

    #[test]
    fn missing_waveform_name_is_reported() {
        let cal = Calibration::new();
        let mut b = Builder::new();
        b.play("q0", WaveformRef::Named("missing".to_string()), None)
            .unwrap();
        let root = b.finish();

        let err = cal.finalize(&root).unwrap_err();
        assert_eq!(
            err,
            CalibrationMiss::Waveform {
                bus: "q0".to_string(),
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn save_and_load_round_trips() {
        let mut cal = Calibration::new();
        cal.add_waveform(
            "q0",
            "pi_pulse",
            CalibratedWaveform::Single(Waveform::Square {
                amplitude: 1.0,
                duration_ns: 40,
            }),
        );
        cal.add_weights("readout", "ro_weights", Weights::new(vec![1.0; 10], vec![0.0; 10]));

        let text = cal.save_to_string().unwrap();
        let reloaded = Calibration::load_from_str(&text).unwrap();

        assert_eq!(reloaded.waveforms.len(), 1);
        assert_eq!(reloaded.weights.len(), 1);
    }

    #[test]
    fn precompiled_block_is_retrievable_by_name() {
        let mut inner = Builder::new();
        inner
            .play(
                "q0",
                WaveformRef::Waveform(Waveform::Square {
                    amplitude: 1.0,
                    duration_ns: 20,
                }),
                None,
            )
            .unwrap();
        let block = inner.finish();

        let mut cal = Calibration::new();
        cal.add_block("reset_sequence", block);

        let fetched = cal.block("reset_sequence").unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(matches!(
            cal.block("does_not_exist"),
            Err(CalibrationMiss::Block(_))
        ));
    }
}
