// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The recursive tree walker: turns a bus's view of the `Node` forest into
//! Q1ASM instructions, and the top-level `lower_bus` entrypoint that
//! assembles a complete [`BusProgram`] (spec §4.4, §4.5, §4.4.7).

use crate::context::{CodegenContext, VarBinding};
use crate::errors::CodegenError;
use qp_data_structures::constants::{DEFAULT_MARKERS, DEFAULT_RESET_PROPAGATION_NS};
use qp_data_structures::constants::TargetLimits;
use qp_ir::{Domain, LoopKind, Node, Operation, ParallelBranch};
use qp_rir::{BusProgram, Instr, Value};
use qp_waveforms::distortion::Distortion;

/// Lowers every top-level node for `bus` and assembles the finished
/// `setup`/`main`/`stop` program along with its waveform, weight, and
/// acquisition tables. `distortions` is this bus's predistortion chain,
/// applied to every sampled envelope before it enters the waveform table.
pub fn lower_bus(root: &[Node], bus: &str, limits: TargetLimits, distortions: Vec<Distortion>) -> Result<BusProgram, CodegenError> {
    let mut ctx = CodegenContext::new(bus, limits, distortions);

    let mut main = Vec::new();
    for node in root {
        main.extend(ctx.lower_node(node)?);
    }

    let mut program = BusProgram::new();
    program.setup.push(Instr::WaitSync(Value::Imm(i64::from(limits.min_clock_ns))));
    program.setup.push(Instr::SetMrk(Value::Imm(i64::from(DEFAULT_MARKERS))));
    program.setup.push(Instr::UpdParam(Value::Imm(i64::from(limits.min_wait_ns))));
    program.main = main;
    program.stop.push(Instr::Stop);

    program.waveforms = ctx.waveforms;
    program.weights = ctx.weights;
    program.acquisitions = ctx.acquisitions;
    Ok(program)
}

/// Whether any leaf `Operation` reachable from `node` touches `bus` — used
/// to skip lowering a subtree (and burning registers) that has no effect on
/// the bus currently being compiled.
fn node_touches_bus(node: &Node, bus: &str) -> bool {
    let mut touches = false;
    node.for_each_operation(&mut |op| {
        if op.buses().contains(&bus) {
            touches = true;
        }
    });
    touches
}

impl CodegenContext {
    pub(crate) fn lower_node(&mut self, node: &Node) -> Result<Vec<Instr>, CodegenError> {
        if !node_touches_bus(node, &self.bus) {
            return Ok(Vec::new());
        }
        match node {
            Node::Block(children) => {
                let mut out = Vec::new();
                for child in children {
                    out.extend(self.lower_node(child)?);
                }
                Ok(out)
            }
            Node::InfiniteLoop(body) => self.lower_infinite_loop(body),
            Node::ForLoop {
                var,
                start,
                stop,
                step,
                body,
            } => self.lower_for_loop(var.id(), var.domain, *start, *stop, *step, body),
            Node::Loop { var, values, body } => self.lower_value_loop(var.id(), values, body),
            Node::Parallel { branches } => self.lower_parallel(branches),
            Node::Average { shots, body } => self.lower_average(*shots, body),
            Node::Op(op) => self.lower_op(op),
        }
    }

    fn lower_infinite_loop(&mut self, body: &[Node]) -> Result<Vec<Instr>, CodegenError> {
        self.registers.push_scope();
        // An unbounded loop contributes one structural level to acquisition
        // depth; its bin count per pass is 1 since the repeat count itself
        // is not known at compile time.
        self.push_loop_shape(1);
        let label = self.fresh_label("inf_loop");
        let mut out = vec![Instr::Label(label.clone())];
        for node in body {
            out.extend(self.lower_node(node)?);
        }
        out.push(Instr::Jmp(label));
        self.pop_loop_shape();
        self.registers.pop_scope();
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_for_loop(
        &mut self,
        var: qp_ir::VariableId,
        domain: Domain,
        start: f64,
        stop: f64,
        step: f64,
        body: &[Node],
    ) -> Result<Vec<Instr>, CodegenError> {
        let count = qp_ir::for_loop_iteration_count(start, stop, step);
        self.registers.push_scope();
        self.push_loop_shape(count as u32);

        let var_reg = self.alloc()?;
        let counter = self.alloc()?;
        let mut out = vec![
            Instr::Move {
                src: Value::Imm(self.quantize_domain(domain, start)),
                dst: var_reg,
            },
            Instr::Move {
                src: Value::Imm(count as i64),
                dst: counter,
            },
        ];

        self.bind_var(var, VarBinding::Register(var_reg));
        let label = self.fresh_label("for_loop");
        out.push(Instr::Label(label.clone()));
        for node in body {
            out.extend(self.lower_node(node)?);
        }
        out.push(Instr::Add {
            a: Value::Reg(var_reg),
            b: Value::Imm(self.quantize_domain(domain, step)),
            dst: var_reg,
        });
        out.push(Instr::Loop { counter, label });
        self.unbind_var(var);

        self.pop_loop_shape();
        self.registers.pop_scope();
        Ok(out)
    }

    /// Unrolls a value-list loop at compile time: there is no Q1ASM
    /// mnemonic to index a small table by register, so each iteration's
    /// value is baked in as a literal (spec §6.2 mnemonic list). The whole
    /// unrolled sequence counts as a single structural depth, so an acquire
    /// inside it shares one acquisition index and bin register across every
    /// unrolled value, the same as it would under a real runtime loop.
    fn lower_value_loop(&mut self, var: qp_ir::VariableId, values: &[f64], body: &[Node]) -> Result<Vec<Instr>, CodegenError> {
        self.push_loop_shape(values.len() as u32);
        let mut out = Vec::new();
        for value in values {
            self.bind_var(var, VarBinding::Literal(*value));
            self.registers.push_scope();
            for node in body {
                out.extend(self.lower_node(node)?);
            }
            self.registers.pop_scope();
        }
        self.unbind_var(var);
        self.pop_loop_shape();
        Ok(out)
    }

    /// `Parallel` lowers to a genuine shared-counter register loop only when
    /// every branch is a `For` header; a `Values` branch forces a full
    /// compile-time unroll of all branches in lockstep (spec §4.3, §6.2).
    fn lower_parallel(&mut self, branches: &[ParallelBranch]) -> Result<Vec<Instr>, CodegenError> {
        let count = branches.first().map_or(0, |b| b.kind.iteration_count());
        let all_for = branches.iter().all(|b| matches!(b.kind, LoopKind::For { .. }));

        if all_for {
            self.lower_parallel_for(branches, count)
        } else {
            self.lower_parallel_unrolled(branches, count)
        }
    }

    fn lower_parallel_for(&mut self, branches: &[ParallelBranch], count: usize) -> Result<Vec<Instr>, CodegenError> {
        self.registers.push_scope();
        self.push_loop_shape(count as u32);
        let counter = self.alloc()?;
        let mut out = vec![Instr::Move {
            src: Value::Imm(count as i64),
            dst: counter,
        }];

        let mut lanes = Vec::with_capacity(branches.len());
        for branch in branches {
            let LoopKind::For { var, start, step, .. } = &branch.kind else {
                unreachable!("lower_parallel_for only called when every branch is For");
            };
            let reg = self.alloc()?;
            out.push(Instr::Move {
                src: Value::Imm(self.quantize_domain(var.domain, *start)),
                dst: reg,
            });
            self.bind_var(var.id(), VarBinding::Register(reg));
            lanes.push((var.id(), var.domain, *step, reg));
        }

        let label = self.fresh_label("parallel_loop");
        out.push(Instr::Label(label.clone()));
        for branch in branches {
            for node in &branch.body {
                out.extend(self.lower_node(node)?);
            }
        }
        for (_, domain, step, reg) in &lanes {
            out.push(Instr::Add {
                a: Value::Reg(*reg),
                b: Value::Imm(self.quantize_domain(*domain, *step)),
                dst: *reg,
            });
        }
        out.push(Instr::Loop { counter, label });

        for (var, ..) in &lanes {
            self.unbind_var(*var);
        }
        self.pop_loop_shape();
        self.registers.pop_scope();
        Ok(out)
    }

    fn lower_parallel_unrolled(&mut self, branches: &[ParallelBranch], count: usize) -> Result<Vec<Instr>, CodegenError> {
        self.push_loop_shape(count as u32);
        let mut out = Vec::new();
        for i in 0..count {
            self.registers.push_scope();
            for branch in branches {
                let (var_id, value) = match &branch.kind {
                    LoopKind::For { var, start, step, .. } => (var.id(), start + step * i as f64),
                    LoopKind::Values { var, values } => (var.id(), values[i]),
                };
                self.bind_var(var_id, VarBinding::Literal(value));
            }
            for branch in branches {
                for node in &branch.body {
                    out.extend(self.lower_node(node)?);
                }
            }
            for branch in branches {
                self.unbind_var(branch.kind.var().id());
            }
            self.registers.pop_scope();
        }
        self.pop_loop_shape();
        Ok(out)
    }

    fn lower_average(&mut self, shots: u32, body: &[Node]) -> Result<Vec<Instr>, CodegenError> {
        self.registers.push_scope();
        self.push_loop_shape(shots);
        let counter = self.alloc()?;
        let label = self.fresh_label("average_loop");
        let mut out = vec![
            Instr::Move {
                src: Value::Imm(i64::from(shots)),
                dst: counter,
            },
            Instr::Label(label.clone()),
        ];
        for node in body {
            out.extend(self.lower_node(node)?);
        }
        out.push(Instr::Loop { counter, label });
        self.pop_loop_shape();
        self.registers.pop_scope();
        Ok(out)
    }

    fn lower_op(&mut self, op: &Operation) -> Result<Vec<Instr>, CodegenError> {
        match op {
            Operation::Play {
                bus,
                waveform,
                wait_time_ns,
            } if bus == &self.bus => {
                let mut out = self.lower_play(waveform)?;
                if let Some(wait) = wait_time_ns {
                    out.extend(self.lower_wait_operand(wait)?);
                }
                Ok(out)
            }
            Operation::Measure {
                bus,
                readout_waveform,
                weights,
                save_adc,
                rotation,
                threshold,
            } if bus == &self.bus => {
                if rotation.is_some() || threshold.is_some() {
                    log::debug!(
                        "bus `{}`: rotation/threshold on Measure are backend-side classification metadata, not lowered to Q1ASM",
                        self.bus
                    );
                }
                let mut out = self.lower_play(readout_waveform)?;
                out.extend(self.lower_acquire(weights, *save_adc)?);
                Ok(out)
            }
            Operation::Acquire { bus, weights, save_adc } if bus == &self.bus => self.lower_acquire(weights, *save_adc),
            Operation::Wait { bus, duration_ns } if bus == &self.bus => self.lower_wait_operand(duration_ns),
            Operation::WaitTrigger {
                bus,
                duration_ns,
                trigger_address,
            } if bus == &self.bus => {
                log::debug!(
                    "bus `{}`: WaitTrigger has no dedicated Q1ASM mnemonic; lowering to wait_sync, trigger_address {trigger_address} unused",
                    self.bus
                );
                let value = self.resolve(duration_ns, Domain::Time);
                Ok(vec![Instr::WaitSync(value)])
            }
            Operation::SetFrequency { bus, freq_hz } if bus == &self.bus => {
                let value = self.resolve(freq_hz, Domain::Frequency);
                self.latch_pending = true;
                Ok(vec![Instr::SetFreq(value)])
            }
            Operation::SetPhase { bus, phase_rad } if bus == &self.bus => {
                let value = self.resolve(phase_rad, Domain::Phase);
                self.latch_pending = true;
                Ok(vec![Instr::SetPh(value)])
            }
            Operation::ResetPhase { bus } if bus == &self.bus => {
                self.latch_pending = true;
                Ok(vec![Instr::ResetPh])
            }
            Operation::SetGain { bus, gain_i, gain_q } if bus == &self.bus => {
                let i = self.resolve(gain_i, Domain::Voltage);
                let q = self.resolve_or_zero(gain_q.as_ref(), Domain::Voltage, "gain_q");
                self.latch_pending = true;
                Ok(vec![Instr::SetAwgGain { i, q }])
            }
            Operation::SetOffset { bus, offset_i, offset_q } if bus == &self.bus => {
                let i = self.resolve(offset_i, Domain::Voltage);
                let q = self.resolve_or_zero(offset_q.as_ref(), Domain::Voltage, "offset_q");
                self.latch_pending = true;
                Ok(vec![Instr::SetAwgOffs { i, q }])
            }
            Operation::SetMarkers { bus, mask } if bus == &self.bus => Ok(vec![Instr::SetMrk(Value::Imm(i64::from(*mask)))]),
            Operation::MeasureReset {
                bus,
                readout_waveform,
                weights,
                control_bus,
                reset_pulse,
                trigger_address,
            } => self.lower_measure_reset(bus, readout_waveform, weights, control_bus, reset_pulse, *trigger_address),
            // `Sync` nodes are replaced by the scheduler with concrete `Wait`
            // operations before codegen runs; one reaching here is a no-op.
            Operation::Sync { .. } => Ok(Vec::new()),
            _ => Ok(Vec::new()),
        }
    }

    fn lower_wait_operand(&mut self, duration_ns: &qp_ir::TimeOperand) -> Result<Vec<Instr>, CodegenError> {
        match duration_ns.as_literal() {
            Some(ns) => self.emit_wait(ns),
            None => {
                log::warn!(
                    "bus `{}`: dynamic (variable) wait duration cannot be chunked at compile time, emitting a single raw wait",
                    self.bus
                );
                Ok(vec![Instr::Wait(self.resolve(duration_ns, Domain::Time))])
            }
        }
    }

    fn resolve_or_zero(&self, operand: Option<&qp_ir::GainOperand>, domain: Domain, name: &str) -> Value {
        match operand {
            Some(op) => self.resolve(op, domain),
            None => {
                log::warn!("bus `{}`: {name} not provided, padding with 0", self.bus);
                Value::Imm(0)
            }
        }
    }

    /// The active-reset sequence (spec §4.4.7): the readout bus acquires
    /// through a fresh bin slot then waits out the propagation delay; the
    /// control bus arms a conditional play gated on that acquisition's
    /// result and fires the reset pulse.
    fn lower_measure_reset(
        &mut self,
        readout_bus: &str,
        readout_waveform: &qp_ir::WaveformRef,
        weights: &qp_ir::WeightsRef,
        control_bus: &str,
        reset_pulse: &qp_ir::WaveformRef,
        trigger_address: u8,
    ) -> Result<Vec<Instr>, CodegenError> {
        if self.bus == readout_bus {
            let mut out = vec![Instr::LatchRst(Value::Imm(0))];
            out.extend(self.lower_play(readout_waveform)?);
            out.extend(self.lower_acquire(weights, true)?);
            out.extend(self.emit_wait(DEFAULT_RESET_PROPAGATION_NS)?);
            Ok(out)
        } else if self.bus == control_bus {
            let mask = Value::Imm(i64::from(trigger_address));
            let mut out = vec![Instr::LatchEn {
                enable: Value::Imm(1),
                duration: Value::Imm(i64::from(DEFAULT_RESET_PROPAGATION_NS)),
            }];
            out.push(Instr::SetConditional {
                enable: Value::Imm(1),
                mask,
                duration: Value::Imm(i64::from(self.limits.min_wait_ns)),
            });
            out.extend(self.lower_play(reset_pulse)?);
            out.push(Instr::SetConditional {
                enable: Value::Imm(0),
                mask,
                duration: Value::Imm(i64::from(self.limits.min_wait_ns)),
            });
            Ok(out)
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qp_data_structures::constants::TargetLimits;
    use qp_ir::{Builder, WeightsRef};

    #[test]
    fn nested_loops_give_acquires_at_each_depth_their_own_index() {
        let mut b = Builder::new();
        b.acquire("r0", WeightsRef::Duration(100), false);
        b.infinite_loop(|l1| {
            l1.acquire("r0", WeightsRef::Duration(100), false);
            l1.block(|l2| {
                l2.acquire("r0", WeightsRef::Duration(100), false);
            });
        });
        let root = b.finish();

        let program = lower_bus(&root, "r0", TargetLimits::default(), Vec::new()).unwrap();
        assert_eq!(program.acquisitions.len(), 2);
    }

    #[test]
    fn acquires_at_the_same_depth_share_an_index_across_separate_calls() {
        let mut b = Builder::new();
        b.acquire("r0", WeightsRef::Duration(100), false);
        b.acquire("r0", WeightsRef::Duration(100), false);
        let root = b.finish();

        let program = lower_bus(&root, "r0", TargetLimits::default(), Vec::new()).unwrap();
        assert_eq!(program.acquisitions.len(), 1);
        assert_eq!(program.acquisitions[0].num_bins, 1);
    }
}
