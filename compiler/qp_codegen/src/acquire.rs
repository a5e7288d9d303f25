// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Acquire lowering: unweighted and weighted acquisition, bin-register
//! advancement, and the acquisition-index/weight-register reuse caches
//! (spec §4.4.6).

use crate::context::CodegenContext;
use crate::errors::CodegenError;
use qp_data_structures::fingerprint::Fingerprint;
use qp_ir::WeightsRef;
use qp_rir::{Instr, Value};

impl CodegenContext {
    pub(crate) fn lower_acquire(&mut self, weights: &WeightsRef, _save_adc: bool) -> Result<Vec<Instr>, CodegenError> {
        let duration = weights_duration(weights);
        let (index, bin) = self.acquisition_slot()?;
        let index_val = Value::Imm(i64::from(index.0));
        let bin_val = Value::Reg(bin);

        let mut out = Vec::new();
        match weights {
            WeightsRef::Duration(ns) => {
                out.push(Instr::Acquire {
                    index: index_val,
                    bin: bin_val,
                    duration: Value::Imm(i64::from(*ns)),
                });
            }
            WeightsRef::Weights(w) => {
                let fingerprint = w.fingerprint();
                let (weight_i_reg, weight_q_reg) = self.weight_registers(fingerprint)?;
                self.ensure_weight_tables_populated(fingerprint, &w.i, &w.q);
                out.push(Instr::AcquireWeighed {
                    index: index_val,
                    bin: bin_val,
                    weight_i: Value::Reg(weight_i_reg),
                    weight_q: Value::Reg(weight_q_reg),
                    duration: Value::Imm(i64::from(duration)),
                });
            }
            WeightsRef::Named(_) => {
                // Calibration::finalize resolves every `Named` reference
                // before scheduling; reaching codegen with one left means
                // the caller skipped that pass.
                log::warn!("bus `{}`: unresolved named weights reached codegen", self.bus);
                out.push(Instr::Acquire {
                    index: index_val,
                    bin: bin_val,
                    duration: Value::Imm(i64::from(duration)),
                });
            }
        }
        out.push(Instr::Add {
            a: bin_val,
            b: Value::Imm(1),
            dst: bin,
        });
        Ok(out)
    }

    /// Inserts a weight's I/Q sample channels into the weight table the
    /// first time its fingerprint is seen; cheap to call redundantly since
    /// `DedupTable::insert_or_reuse` is itself idempotent per fingerprint.
    fn ensure_weight_tables_populated(&mut self, _fingerprint: Fingerprint, i: &[f64], q: &[f64]) {
        let _ = self.insert_weight_channel(i.to_vec());
        let _ = self.insert_weight_channel(q.to_vec());
    }
}

fn weights_duration(weights: &WeightsRef) -> u32 {
    match weights {
        WeightsRef::Weights(w) => w.duration_ns(),
        WeightsRef::Duration(ns) => *ns,
        WeightsRef::Named(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qp_data_structures::constants::TargetLimits;
    use qp_waveforms::Weights;

    #[test]
    fn identical_weight_fingerprints_share_registers() {
        let mut ctx = CodegenContext::new("r0", TargetLimits::default(), Vec::new());
        let w = Weights::new(vec![1.0, 0.5], vec![0.0, 0.0]);
        let a = ctx.lower_acquire(&WeightsRef::Weights(w.clone()), false).unwrap();
        let b = ctx.lower_acquire(&WeightsRef::Weights(w), false).unwrap();

        let extract = |instrs: &[Instr]| match &instrs[0] {
            Instr::AcquireWeighed { weight_i, weight_q, .. } => (*weight_i, *weight_q),
            other => panic!("expected AcquireWeighed, got {other:?}"),
        };
        assert_eq!(extract(&a), extract(&b));
    }

    #[test]
    fn acquisitions_beyond_limit_overflow() {
        let limits = TargetLimits {
            max_acquisition_indices: 2,
            ..TargetLimits::default()
        };
        let mut ctx = CodegenContext::new("r0", limits, Vec::new());
        // Each nesting depth (not each call) consumes a distinct index, so
        // three distinct depths overflow a limit of two.
        ctx.push_loop_shape(1);
        ctx.lower_acquire(&WeightsRef::Duration(100), false).unwrap();
        ctx.push_loop_shape(2);
        ctx.lower_acquire(&WeightsRef::Duration(100), false).unwrap();
        ctx.push_loop_shape(3);
        let err = ctx.lower_acquire(&WeightsRef::Duration(100), false).unwrap_err();
        assert!(matches!(err, CodegenError::AcquisitionOverflow { .. }));
    }
}
