// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::CodegenError;
use crate::quantize;
use qp_data_structures::constants::TargetLimits;
use qp_data_structures::fingerprint::{quantize_sample, Fingerprint};
use qp_ir::{Domain, Operand, VariableId};
use qp_rir::{AcquisitionIndex, AcquisitionSpec, DedupTable, Register, RegisterAllocator, WaveformId, WeightId};
use qp_waveforms::distortion::{self, Distortion, FilterState};
use qp_waveforms::Waveform;
use rustc_hash::FxHashMap;

/// Where a bound loop variable currently lives during lowering: a live
/// register for a `ForLoop`/`Parallel(For)` header, or a compile-time
/// literal for an unrolled `Loop(values)` iteration (spec §4.4.3).
#[derive(Clone, Copy, Debug)]
pub(crate) enum VarBinding {
    Register(Register),
    Literal(f64),
}

/// Per-bus lowering state threaded through every lowering function: the
/// register allocator, waveform/weight dedup tables, the weight-register
/// reuse cache (spec §4.4.1), and acquisition-index bookkeeping (spec
/// §4.4.6).
pub(crate) struct CodegenContext {
    pub(crate) bus: String,
    pub(crate) limits: TargetLimits,
    pub(crate) registers: RegisterAllocator,
    distortions: Vec<Distortion>,
    pub(crate) waveforms: DedupTable<WaveformId, Vec<f64>>,
    pub(crate) weights: DedupTable<WeightId, Vec<f64>>,
    pub(crate) acquisitions: Vec<AcquisitionSpec>,
    weight_register_cache: FxHashMap<Fingerprint, (Register, Register)>,
    depth_to_index: FxHashMap<usize, AcquisitionIndex>,
    bin_registers: FxHashMap<AcquisitionIndex, Register>,
    loop_shape: Vec<u32>,
    var_bindings: FxHashMap<VariableId, VarBinding>,
    label_counter: u32,
    /// Set after lowering a `Set*` op whose effect is latched until the next
    /// `upd_param`/wait (spec §4.4.4 final bullet).
    pub(crate) latch_pending: bool,
}

impl CodegenContext {
    pub(crate) fn new(bus: impl Into<String>, limits: TargetLimits, distortions: Vec<Distortion>) -> Self {
        let bus = bus.into();
        let distortions = coerce_delay_comp(&bus, distortions);
        Self {
            bus,
            registers: RegisterAllocator::with_capacity(limits.num_registers),
            limits,
            distortions,
            waveforms: DedupTable::new(),
            weights: DedupTable::new(),
            acquisitions: Vec::new(),
            weight_register_cache: FxHashMap::default(),
            depth_to_index: FxHashMap::default(),
            bin_registers: FxHashMap::default(),
            loop_shape: Vec::new(),
            var_bindings: FxHashMap::default(),
            label_counter: 0,
            latch_pending: false,
        }
    }

    pub(crate) fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!("{prefix}_{}_{}", self.bus, self.label_counter);
        self.label_counter += 1;
        label
    }

    pub(crate) fn alloc(&mut self) -> Result<Register, CodegenError> {
        self.registers.alloc().map_err(|source| CodegenError::Registers {
            bus: self.bus.clone(),
            source,
        })
    }

    pub(crate) fn alloc_pinned(&mut self) -> Result<Register, CodegenError> {
        self.registers.alloc_pinned().map_err(|source| CodegenError::Registers {
            bus: self.bus.clone(),
            source,
        })
    }

    pub(crate) fn bind_var(&mut self, id: VariableId, binding: VarBinding) {
        self.var_bindings.insert(id, binding);
    }

    pub(crate) fn unbind_var(&mut self, id: VariableId) {
        self.var_bindings.remove(&id);
    }

    pub(crate) fn quantize_domain(&self, domain: Domain, value: f64) -> i64 {
        match domain {
            Domain::Time => quantize::time_ns(value),
            Domain::Frequency => quantize::freq_hz(value),
            Domain::Phase => quantize::phase_rad(value),
            Domain::Voltage => quantize::gain(value),
            Domain::Scalar(_) => value.round() as i64,
        }
    }

    /// Resolves an `Operand<T>` to a Q1ASM `Value`, quantizing a literal by
    /// `domain` or looking up a bound variable's current register/literal
    /// (spec §4.4.2).
    pub(crate) fn resolve<T: Copy + Into<f64>>(
        &self,
        operand: &Operand<T>,
        domain: Domain,
    ) -> qp_rir::Value {
        match operand {
            Operand::Literal(v) => qp_rir::Value::Imm(self.quantize_domain(domain, (*v).into())),
            Operand::Variable(var) => match self.var_bindings.get(&var.id()) {
                Some(VarBinding::Register(reg)) => qp_rir::Value::Reg(*reg),
                Some(VarBinding::Literal(lit)) => {
                    qp_rir::Value::Imm(self.quantize_domain(domain, *lit))
                }
                None => {
                    // The scheduler/builder already validated scoping; a
                    // miss here means the variable's loop header was never
                    // lowered for this bus, which can only happen if the
                    // variable is unused on this bus's path.
                    log::warn!(
                        "variable `{}` has no binding while lowering bus `{}`; treating as 0",
                        var.label,
                        self.bus
                    );
                    qp_rir::Value::Imm(0)
                }
            },
        }
    }

    /// Inserts one real-valued channel into the waveform table, returning
    /// its dedup id (spec §3.6 invariant 4, §6.2). The bus's predistortion
    /// chain is applied, in list order, after envelope generation and
    /// before the sample is quantized and fingerprinted (spec §3.5, §4.2).
    pub(crate) fn insert_waveform_channel(&mut self, samples: Vec<f64>) -> WaveformId {
        let distorted = distortion::apply_chain(&samples, &self.distortions);
        let quantized: Vec<i32> = distorted.iter().copied().map(quantize_sample).collect();
        let fp = Fingerprint::of(&quantized);
        self.waveforms.insert_or_reuse(fp, distorted)
    }

    pub(crate) fn insert_waveform(&mut self, wf: &Waveform) -> WaveformId {
        self.insert_waveform_channel(wf.envelope(1))
    }

    pub(crate) fn insert_weight_channel(&mut self, samples: Vec<f64>) -> WeightId {
        let quantized: Vec<i32> = samples.iter().copied().map(quantize_sample).collect();
        let fp = Fingerprint::of(&quantized);
        self.weights.insert_or_reuse(fp, samples)
    }

    /// Returns the shared (weight_i, weight_q) register pair for a weight
    /// fingerprint, allocating a fresh pair the first time it's seen (spec
    /// §4.4.1, §4.4.6, testable property 7). The pair lives for the whole
    /// bus program regardless of which loop scope first requested it.
    pub(crate) fn weight_registers(&mut self, fingerprint: Fingerprint) -> Result<(Register, Register), CodegenError> {
        if let Some(pair) = self.weight_register_cache.get(&fingerprint) {
            return Ok(*pair);
        }
        let i = self.alloc_pinned()?;
        let q = self.alloc_pinned()?;
        self.weight_register_cache.insert(fingerprint, (i, q));
        Ok((i, q))
    }

    /// Enters one level of loop nesting, recording its iteration count for
    /// acquisition `loop_shape` bookkeeping (spec §4.4.6, §4.5).
    pub(crate) fn push_loop_shape(&mut self, iterations: u32) {
        self.loop_shape.push(iterations);
    }

    pub(crate) fn pop_loop_shape(&mut self) {
        self.loop_shape.pop();
    }

    /// Assigns (or reuses) the acquisition index for the current nesting
    /// depth and its persistent bin register (spec §4.4.6).
    pub(crate) fn acquisition_slot(&mut self) -> Result<(AcquisitionIndex, Register), CodegenError> {
        let depth = self.loop_shape.len();
        let index = if let Some(index) = self.depth_to_index.get(&depth) {
            *index
        } else {
            let count = self.depth_to_index.len();
            if count >= self.limits.max_acquisition_indices {
                return Err(CodegenError::AcquisitionOverflow {
                    bus: self.bus.clone(),
                    count: count + 1,
                    max: self.limits.max_acquisition_indices,
                });
            }
            let index = AcquisitionIndex(count as u16);
            self.depth_to_index.insert(depth, index);
            self.acquisitions.push(AcquisitionSpec {
                index,
                num_bins: self.loop_shape.iter().product::<u32>().max(1),
                loop_shape: self.loop_shape.clone(),
            });
            index
        };
        let bin = if let Some(reg) = self.bin_registers.get(&index) {
            *reg
        } else {
            let reg = self.alloc_pinned()?;
            self.bin_registers.insert(index, reg);
            reg
        };
        Ok((index, bin))
    }
}

/// Coerces every `Enabled` filter whose group delay would desynchronize
/// this bus's outputs against the rest of the program to `DelayComp`
/// (spec §4.4.9), warning once per coerced filter.
fn coerce_delay_comp(bus: &str, mut chain: Vec<Distortion>) -> Vec<Distortion> {
    for (i, dist) in chain.iter_mut().enumerate() {
        if dist.state == FilterState::Enabled && dist.filter.introduces_delay() {
            dist.state = FilterState::DelayComp;
            log::warn!("bus `{bus}`: predistortion filter {i} coerced to delay_comp (its group delay would desynchronize outputs)");
        }
    }
    chain
}
