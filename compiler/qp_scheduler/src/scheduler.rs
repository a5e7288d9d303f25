// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::config::SchedulerConfig;
use crate::errors::{SchedulerDiagnostic, SchedulerError};
use qp_ir::{LoopKind, Node, Operand, Operation, WaveformRef, WeightsRef};
use rustc_hash::FxHashMap;

/// Result of projecting a `QProgram` onto per-bus timelines (spec §4.3).
/// The tree shape is preserved; `Sync` nodes are replaced by the explicit
/// `Wait` operations that realize them, and loop tails gain an implicit
/// resync when autosync is enabled.
pub struct Scheduled {
    pub root: Vec<Node>,
    pub final_now_ns: FxHashMap<String, u64>,
    pub diagnostics: Vec<SchedulerDiagnostic>,
}

/// Projects `root` onto per-bus timelines honouring `sync`, per-bus delays,
/// and `MIN_CLOCK` padding.
///
/// # Errors
/// Returns [`SchedulerError`] if a `Parallel` node's branches disagree on
/// iteration count, or if a waveform/weights reference was never resolved
/// by calibration.
pub fn project(root: &[Node], config: &SchedulerConfig) -> Result<Scheduled, SchedulerError> {
    let mut now = initial_clocks(root, config);
    let mut diagnostics = Vec::new();
    let scheduled = schedule_nodes(root, &mut now, config, &mut diagnostics)?;
    Ok(Scheduled {
        root: scheduled,
        final_now_ns: now,
        diagnostics,
    })
}

/// Seeds every bus's clock with its normalized delay (spec §4.3): each
/// bus starts at `delay_ns - min(delay_ns)` so relative shifts are
/// preserved while every clock starts non-negative.
fn initial_clocks(root: &[Node], config: &SchedulerConfig) -> FxHashMap<String, u64> {
    let mut buses = Vec::new();
    collect_buses(root, &mut buses);
    buses.sort();
    buses.dedup();

    let min_delay = buses
        .iter()
        .map(|b| config.delay_for(b))
        .min()
        .unwrap_or(0)
        .min(0);

    buses
        .into_iter()
        .map(|b| {
            let shifted = config.delay_for(&b) - min_delay;
            (b, shifted as u64)
        })
        .collect()
}

fn collect_buses(nodes: &[Node], out: &mut Vec<String>) {
    for node in nodes {
        node.for_each_operation(&mut |op| out.extend(op.buses().into_iter().map(str::to_string)));
    }
}

fn schedule_nodes(
    nodes: &[Node],
    now: &mut FxHashMap<String, u64>,
    config: &SchedulerConfig,
    diagnostics: &mut Vec<SchedulerDiagnostic>,
) -> Result<Vec<Node>, SchedulerError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        schedule_node(node, now, config, diagnostics, &mut out)?;
    }
    Ok(out)
}

fn schedule_node(
    node: &Node,
    now: &mut FxHashMap<String, u64>,
    config: &SchedulerConfig,
    diagnostics: &mut Vec<SchedulerDiagnostic>,
    out: &mut Vec<Node>,
) -> Result<(), SchedulerError> {
    match node {
        Node::Block(children) => {
            out.push(Node::Block(schedule_nodes(children, now, config, diagnostics)?));
        }
        Node::InfiniteLoop(children) => {
            out.push(Node::InfiniteLoop(schedule_nodes(
                children,
                now,
                config,
                diagnostics,
            )?));
        }
        Node::ForLoop {
            var,
            start,
            stop,
            step,
            body,
        } => {
            let mut body = schedule_nodes(body, now, config, diagnostics)?;
            autosync_tail(&mut body, now, config, diagnostics);
            out.push(Node::ForLoop {
                var: var.clone(),
                start: *start,
                stop: *stop,
                step: *step,
                body,
            });
        }
        Node::Loop { var, values, body } => {
            let mut body = schedule_nodes(body, now, config, diagnostics)?;
            autosync_tail(&mut body, now, config, diagnostics);
            out.push(Node::Loop {
                var: var.clone(),
                values: values.clone(),
                body,
            });
        }
        Node::Average { shots, body } => {
            let mut body = schedule_nodes(body, now, config, diagnostics)?;
            autosync_tail(&mut body, now, config, diagnostics);
            out.push(Node::Average { shots: *shots, body });
        }
        Node::Parallel { branches } => {
            let counts: Vec<usize> = branches.iter().map(|b| b.kind.iteration_count()).collect();
            if counts.iter().any(|c| *c != counts[0]) {
                return Err(SchedulerError::ParallelLengthMismatch { counts });
            }

            let base = now.clone();
            let mut scheduled_branches = Vec::with_capacity(branches.len());
            let mut touched = Vec::new();
            for branch in branches {
                let mut branch_now = base.clone();
                let body = schedule_nodes(&branch.body, &mut branch_now, config, diagnostics)?;
                for (bus, value) in &branch_now {
                    let merged = now.entry(bus.clone()).or_insert(*value);
                    *merged = (*merged).max(*value);
                }
                collect_buses(&body, &mut touched);
                scheduled_branches.push(qp_ir::ParallelBranch {
                    kind: branch.kind.clone(),
                    body,
                });
            }
            out.push(Node::Parallel {
                branches: scheduled_branches,
            });

            touched.sort();
            touched.dedup();
            let waits = sync_buses(&touched, now);
            out.extend(waits);
        }
        Node::Op(op) => schedule_operation(op, now, config, diagnostics, out)?,
    }
    Ok(())
}

fn autosync_tail(
    body: &mut Vec<Node>,
    now: &mut FxHashMap<String, u64>,
    config: &SchedulerConfig,
    diagnostics: &mut Vec<SchedulerDiagnostic>,
) {
    if !config.autosync {
        return;
    }
    let mut touched = Vec::new();
    collect_buses(body, &mut touched);
    touched.sort();
    touched.dedup();
    if touched.len() < 2 {
        return;
    }
    let _ = diagnostics;
    body.extend(sync_buses(&touched, now));
}

/// Advances every listed bus to the maximum clock among them, returning the
/// `Wait` ops needed to realize it (spec §3.6.3, §4.3).
fn sync_buses(buses: &[String], now: &mut FxHashMap<String, u64>) -> Vec<Node> {
    let target = buses
        .iter()
        .map(|b| *now.get(b).unwrap_or(&0))
        .max()
        .unwrap_or(0);

    let mut waits = Vec::new();
    for bus in buses {
        let current = now.entry(bus.clone()).or_insert(0);
        if *current < target {
            let diff = target - *current;
            waits.push(Node::Op(Operation::Wait {
                bus: bus.clone(),
                duration_ns: Operand::Literal(diff as u32),
            }));
            *current = target;
        }
    }
    waits
}

fn waveform_duration(bus: &str, wf: &WaveformRef) -> Result<u32, SchedulerError> {
    match wf {
        WaveformRef::Waveform(w) => Ok(w.duration_ns()),
        WaveformRef::IQPair(iq) => Ok(iq.duration_ns()),
        WaveformRef::Named(_) => Err(SchedulerError::UnresolvedWaveform {
            bus: bus.to_string(),
        }),
    }
}

fn weights_duration(bus: &str, w: &WeightsRef) -> Result<u32, SchedulerError> {
    match w {
        WeightsRef::Weights(weights) => Ok(weights.duration_ns()),
        WeightsRef::Duration(ns) => Ok(*ns),
        WeightsRef::Named(_) => Err(SchedulerError::UnresolvedWeights {
            bus: bus.to_string(),
        }),
    }
}

fn advance(
    bus: &str,
    duration_ns: u32,
    now: &mut FxHashMap<String, u64>,
    config: &SchedulerConfig,
    diagnostics: &mut Vec<SchedulerDiagnostic>,
) {
    let padded = if duration_ns < config.min_clock_ns {
        diagnostics.push(SchedulerDiagnostic::ClockPadding {
            bus: bus.to_string(),
            inserted_ns: config.min_clock_ns - duration_ns,
        });
        config.min_clock_ns
    } else {
        duration_ns
    };
    *now.entry(bus.to_string()).or_insert(0) += u64::from(padded);
}

fn schedule_operation(
    op: &Operation,
    now: &mut FxHashMap<String, u64>,
    config: &SchedulerConfig,
    diagnostics: &mut Vec<SchedulerDiagnostic>,
    out: &mut Vec<Node>,
) -> Result<(), SchedulerError> {
    match op {
        Operation::Play {
            bus,
            waveform,
            wait_time_ns,
        } => {
            let mut duration = waveform_duration(bus, waveform)?;
            if let Some(Operand::Literal(extra)) = wait_time_ns {
                duration += *extra;
            }
            advance(bus, duration, now, config, diagnostics);
        }
        Operation::Measure {
            bus,
            readout_waveform,
            ..
        } => {
            let duration = waveform_duration(bus, readout_waveform)?;
            advance(bus, duration, now, config, diagnostics);
        }
        Operation::Acquire { bus, weights, .. } => {
            let duration = weights_duration(bus, weights)?;
            advance(bus, duration, now, config, diagnostics);
        }
        Operation::Wait { bus, duration_ns } => {
            if let Operand::Literal(d) = duration_ns {
                advance(bus, *d, now, config, diagnostics);
            } else {
                log::debug!("bus `{bus}` has a variable wait duration; scheduler treats it as zero-width for static timing");
            }
        }
        Operation::WaitTrigger {
            bus, duration_ns, ..
        } => {
            if let Operand::Literal(d) = duration_ns {
                advance(bus, *d, now, config, diagnostics);
            }
        }
        Operation::Sync { buses } => {
            out.extend(sync_buses(buses, now));
            return Ok(());
        }
        Operation::SetFrequency { .. }
        | Operation::SetPhase { .. }
        | Operation::ResetPhase { .. }
        | Operation::SetGain { .. }
        | Operation::SetOffset { .. }
        | Operation::SetMarkers { .. } => {}
        Operation::MeasureReset {
            bus,
            readout_waveform,
            weights,
            control_bus,
            reset_pulse,
            ..
        } => {
            let readout_dur =
                waveform_duration(bus, readout_waveform)? + weights_duration(bus, weights)?
                    + qp_data_structures::constants::DEFAULT_RESET_PROPAGATION_NS;
            advance(bus, readout_dur, now, config, diagnostics);
            let reset_dur = waveform_duration(control_bus, reset_pulse)?;
            advance(control_bus, reset_dur, now, config, diagnostics);
        }
    }
    out.push(Node::Op(op.clone()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qp_ir::Domain;
    use qp_waveforms::Waveform;

    fn square(duration_ns: u32) -> WaveformRef {
        WaveformRef::Waveform(Waveform::Square {
            amplitude: 1.0,
            duration_ns,
        })
    }

    #[test]
    fn cross_bus_sync_pads_the_shorter_bus() {
        let mut b = qp_ir::Builder::new();
        b.play("b0", square(200), None).unwrap();
        b.play("b1", square(40), None).unwrap();
        b.sync(vec!["b0".to_string(), "b1".to_string()]);
        let root = b.finish();

        let scheduled = project(&root, &SchedulerConfig::default()).unwrap();
        assert_eq!(*scheduled.final_now_ns.get("b0").unwrap(), 200);
        assert_eq!(*scheduled.final_now_ns.get("b1").unwrap(), 200);

        let mut waits = Vec::new();
        for node in &scheduled.root {
            node.for_each_operation(&mut |op| {
                if let Operation::Wait { bus, duration_ns } = op {
                    if bus == "b1" {
                        if let Operand::Literal(d) = duration_ns {
                            waits.push(*d);
                        }
                    }
                }
            });
        }
        assert_eq!(waits, vec![160]);
    }

    #[test]
    fn parallel_branches_must_share_iteration_count() {
        let mut b = qp_ir::Builder::new();
        let v0 = b.variable("a", Domain::Frequency).unwrap();
        let v1 = b.variable("b", Domain::Frequency).unwrap();
        b.parallel(vec![
            (
                LoopKind::For {
                    var: v0,
                    start: 0.0,
                    stop: 10.0,
                    step: 1.0,
                },
                Box::new(|_: &mut qp_ir::Builder| {}),
            ),
            (
                LoopKind::For {
                    var: v1,
                    start: 0.0,
                    stop: 1.0,
                    step: 1.0,
                },
                Box::new(|_: &mut qp_ir::Builder| {}),
            ),
        ]);
        let root = b.finish();

        let err = project(&root, &SchedulerConfig::default()).unwrap_err();
        assert!(matches!(err, SchedulerError::ParallelLengthMismatch { .. }));
    }

    #[test]
    fn sub_min_clock_play_is_padded_and_diagnosed() {
        let mut b = qp_ir::Builder::new();
        b.play("b0", square(2), None).unwrap();
        let root = b.finish();

        let scheduled = project(&root, &SchedulerConfig::default()).unwrap();
        assert_eq!(*scheduled.final_now_ns.get("b0").unwrap(), 4);
        assert_eq!(
            scheduled.diagnostics,
            vec![SchedulerDiagnostic::ClockPadding {
                bus: "b0".to_string(),
                inserted_ns: 2
            }]
        );
    }
}
