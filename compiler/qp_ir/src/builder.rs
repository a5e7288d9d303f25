// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::block::{LoopKind, Node, ParallelBranch};
use crate::domain::Domain;
use crate::errors::BuildError;
use crate::operand::Operand;
use crate::ops::{Bus, Operation};
use crate::variable::{Variable, VariableId};
use crate::waveform_ref::{WaveformRef, WeightsRef};
use rustc_hash::FxHashSet;
use std::rc::Rc;

/// Fluent construction API for a `QProgram` tree (spec §4.1). Scoping is
/// lexical: block-opening methods take a closure, push a fresh scope before
/// running it, and pop the scope back into the enclosing one when the
/// closure returns — there is no separate "close" call to forget, unlike a
/// manual open/close API.
pub struct Builder {
    next_var_id: u32,
    labels: FxHashSet<Rc<str>>,
    scopes: Vec<Vec<Node>>,
    /// Parallel stack of variable ids visible in each active scope, used to
    /// resolve `UnknownVariable` (spec §4.1).
    scope_vars: Vec<FxHashSet<VariableId>>,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_var_id: 0,
            labels: FxHashSet::default(),
            scopes: vec![Vec::new()],
            scope_vars: vec![FxHashSet::default()],
        }
    }

    /// Declares a fresh variable with a unique label (spec §4.1).
    pub fn variable(
        &mut self,
        label: impl Into<Rc<str>>,
        domain: Domain,
    ) -> Result<Variable, BuildError> {
        let label = label.into();
        if !self.labels.insert(label.clone()) {
            return Err(BuildError::DuplicateLabel(label.to_string()));
        }
        let id = VariableId(self.next_var_id);
        self.next_var_id += 1;
        // A variable only enters scope once a loop header binds it; declaring
        // it here just allocates the identity token (spec §3.2).
        Ok(Variable { id, label, domain })
    }

    /// Finishes construction, returning the root block's children.
    #[must_use]
    pub fn finish(mut self) -> Vec<Node> {
        self.scopes.pop().expect("builder has a root scope")
    }

    fn push(&mut self, node: Node) {
        self.scopes
            .last_mut()
            .expect("builder scope stack is never empty")
            .push(node);
    }

    fn is_var_in_scope(&self, id: VariableId) -> bool {
        self.scope_vars.iter().any(|frame| frame.contains(&id))
    }

    fn check_var<T>(&self, operand: &Operand<T>, expected: Domain) -> Result<(), BuildError> {
        if let Operand::Variable(var) = operand {
            self.check_variable(var, expected)?;
        }
        Ok(())
    }

    fn check_variable(&self, var: &Variable, expected: Domain) -> Result<(), BuildError> {
        if !self.is_var_in_scope(var.id()) {
            return Err(BuildError::UnknownVariable(var.label.to_string()));
        }
        if var.domain != expected {
            return Err(BuildError::DomainMismatch {
                label: var.label.to_string(),
                expected,
                found: var.domain,
            });
        }
        Ok(())
    }

    fn with_scope(
        &mut self,
        scope_vars: FxHashSet<VariableId>,
        body: impl FnOnce(&mut Builder),
    ) -> Vec<Node> {
        self.scopes.push(Vec::new());
        self.scope_vars.push(scope_vars);
        body(self);
        self.scope_vars.pop();
        self.scopes.pop().expect("scope pushed above")
    }

    // --- Block-opening operations -------------------------------------------------

    pub fn block(&mut self, body: impl FnOnce(&mut Builder)) {
        let children = self.with_scope(FxHashSet::default(), body);
        self.push(Node::Block(children));
    }

    pub fn infinite_loop(&mut self, body: impl FnOnce(&mut Builder)) {
        let children = self.with_scope(FxHashSet::default(), body);
        self.push(Node::InfiniteLoop(children));
    }

    pub fn average(&mut self, shots: u32, body: impl FnOnce(&mut Builder)) {
        let children = self.with_scope(FxHashSet::default(), body);
        self.push(Node::Average {
            shots,
            body: children,
        });
    }

    pub fn for_loop(
        &mut self,
        var: &Variable,
        start: f64,
        stop: f64,
        step: f64,
        body: impl FnOnce(&mut Builder),
    ) {
        let mut scope_vars = FxHashSet::default();
        scope_vars.insert(var.id());
        let children = self.with_scope(scope_vars, body);
        self.push(Node::ForLoop {
            var: var.clone(),
            start,
            stop,
            step,
            body: children,
        });
    }

    pub fn loop_values(
        &mut self,
        var: &Variable,
        values: Vec<f64>,
        body: impl FnOnce(&mut Builder),
    ) {
        let mut scope_vars = FxHashSet::default();
        scope_vars.insert(var.id());
        let children = self.with_scope(scope_vars, body);
        self.push(Node::Loop {
            var: var.clone(),
            values,
            body: children,
        });
    }

    /// Builds a `Parallel` node from a list of `(loop header, body closure)`
    /// branches, all sharing the base clock and executed in lockstep (spec
    /// §3.3, §4.3). Returns `DomainMismatch`-shaped errors eagerly via the
    /// closures, which should call back into the mismatched-length invariant
    /// check performed by the scheduler, not here: this builder only checks
    /// variable scoping, not iteration-count equality (that is a scheduling
    /// invariant, not a lexical one).
    pub fn parallel(&mut self, branches: Vec<(LoopKind, Box<dyn FnOnce(&mut Builder)>)>) {
        let mut built = Vec::with_capacity(branches.len());
        for (kind, body) in branches {
            let mut scope_vars = FxHashSet::default();
            scope_vars.insert(kind.var().id());
            let children = self.with_scope(scope_vars, body);
            built.push(ParallelBranch {
                kind,
                body: children,
            });
        }
        self.push(Node::Parallel { branches: built });
    }

    // --- Leaf operations ------------------------------------------------------

    pub fn play(
        &mut self,
        bus: impl Into<Bus>,
        waveform: WaveformRef,
        wait_time_ns: Option<Operand<u32>>,
    ) -> Result<(), BuildError> {
        if let Some(wait) = &wait_time_ns {
            self.check_var(wait, Domain::Time)?;
        }
        self.push(Node::Op(Operation::Play {
            bus: bus.into(),
            waveform,
            wait_time_ns,
        }));
        Ok(())
    }

    pub fn measure(
        &mut self,
        bus: impl Into<Bus>,
        readout_waveform: WaveformRef,
        weights: WeightsRef,
        save_adc: bool,
        rotation: Option<Operand<f64>>,
        threshold: Option<f64>,
    ) -> Result<(), BuildError> {
        if let Some(rotation) = &rotation {
            self.check_var(rotation, Domain::Phase)?;
        }
        self.push(Node::Op(Operation::Measure {
            bus: bus.into(),
            readout_waveform,
            weights,
            save_adc,
            rotation,
            threshold,
        }));
        Ok(())
    }

    pub fn acquire(&mut self, bus: impl Into<Bus>, weights: WeightsRef, save_adc: bool) {
        self.push(Node::Op(Operation::Acquire {
            bus: bus.into(),
            weights,
            save_adc,
        }));
    }

    pub fn wait(&mut self, bus: impl Into<Bus>, duration_ns: Operand<u32>) -> Result<(), BuildError> {
        self.check_var(&duration_ns, Domain::Time)?;
        self.push(Node::Op(Operation::Wait {
            bus: bus.into(),
            duration_ns,
        }));
        Ok(())
    }

    pub fn sync(&mut self, buses: Vec<Bus>) {
        self.push(Node::Op(Operation::Sync { buses }));
    }

    pub fn wait_trigger(
        &mut self,
        bus: impl Into<Bus>,
        duration_ns: Operand<u32>,
        trigger_address: u8,
    ) -> Result<(), BuildError> {
        self.check_var(&duration_ns, Domain::Time)?;
        self.push(Node::Op(Operation::WaitTrigger {
            bus: bus.into(),
            duration_ns,
            trigger_address,
        }));
        Ok(())
    }

    pub fn set_frequency(
        &mut self,
        bus: impl Into<Bus>,
        freq_hz: Operand<f64>,
    ) -> Result<(), BuildError> {
        self.check_var(&freq_hz, Domain::Frequency)?;
        self.push(Node::Op(Operation::SetFrequency {
            bus: bus.into(),
            freq_hz,
        }));
        Ok(())
    }

    pub fn set_phase(
        &mut self,
        bus: impl Into<Bus>,
        phase_rad: Operand<f64>,
    ) -> Result<(), BuildError> {
        self.check_var(&phase_rad, Domain::Phase)?;
        self.push(Node::Op(Operation::SetPhase {
            bus: bus.into(),
            phase_rad,
        }));
        Ok(())
    }

    pub fn reset_phase(&mut self, bus: impl Into<Bus>) {
        self.push(Node::Op(Operation::ResetPhase { bus: bus.into() }));
    }

    pub fn set_gain(
        &mut self,
        bus: impl Into<Bus>,
        gain_i: Operand<f64>,
        gain_q: Option<Operand<f64>>,
    ) -> Result<(), BuildError> {
        self.check_var(&gain_i, Domain::Voltage)?;
        if let Some(gain_q) = &gain_q {
            self.check_var(gain_q, Domain::Voltage)?;
        }
        self.push(Node::Op(Operation::SetGain {
            bus: bus.into(),
            gain_i,
            gain_q,
        }));
        Ok(())
    }

    pub fn set_offset(
        &mut self,
        bus: impl Into<Bus>,
        offset_i: Operand<f64>,
        offset_q: Option<Operand<f64>>,
    ) -> Result<(), BuildError> {
        self.check_var(&offset_i, Domain::Voltage)?;
        if let Some(offset_q) = &offset_q {
            self.check_var(offset_q, Domain::Voltage)?;
        }
        self.push(Node::Op(Operation::SetOffset {
            bus: bus.into(),
            offset_i,
            offset_q,
        }));
        Ok(())
    }

    pub fn set_markers(&mut self, bus: impl Into<Bus>, mask: u8) {
        self.push(Node::Op(Operation::SetMarkers {
            bus: bus.into(),
            mask: mask & 0xF,
        }));
    }

    pub fn measure_reset(
        &mut self,
        bus: impl Into<Bus>,
        readout_waveform: WaveformRef,
        weights: WeightsRef,
        control_bus: impl Into<Bus>,
        reset_pulse: WaveformRef,
        trigger_address: u8,
    ) {
        self.push(Node::Op(Operation::MeasureReset {
            bus: bus.into(),
            readout_waveform,
            weights,
            control_bus: control_bus.into(),
            reset_pulse,
            trigger_address,
        }));
    }

    /// Inserts a precompiled `Block` from a `Calibration` registry. The
    /// block's children are flattened into the current scope rather than
    /// nesting the `Block` node itself: inserting the node object directly
    /// would let the same sub-tree be shared across two call sites, which
    /// would give two structurally-identical nestings the same node
    /// identity — forbidden by spec §4.1.
    pub fn insert_precompiled(&mut self, block: &[Node]) {
        for node in block {
            self.push(node.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform_ref::WaveformRef;
    use qp_waveforms::Waveform;

    fn square(duration_ns: u32) -> WaveformRef {
        WaveformRef::Waveform(Waveform::Square {
            amplitude: 1.0,
            duration_ns,
        })
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut b = Builder::new();
        b.variable("f", Domain::Frequency).unwrap();
        let err = b.variable("f", Domain::Time).unwrap_err();
        assert_eq!(err, BuildError::DuplicateLabel("f".to_string()));
    }

    #[test]
    fn variable_out_of_scope_is_rejected() {
        let mut b = Builder::new();
        let var = b.variable("f", Domain::Frequency).unwrap();
        b.for_loop(&var, 0.0, 1.0, 1.0, |_| {});
        // `var` is only in scope inside the loop body that declared it.
        let err = b
            .set_frequency("b0", Operand::Variable(var))
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownVariable(_)));
    }

    #[test]
    fn domain_mismatch_is_rejected() {
        let mut b = Builder::new();
        let var = b.variable("t", Domain::Time).unwrap();
        let mut err = None;
        b.for_loop(&var, 0.0, 1.0, 1.0, |inner| {
            err = inner
                .set_frequency("b0", Operand::Variable(var.clone()))
                .err();
        });
        assert!(matches!(err, Some(BuildError::DomainMismatch { .. })));
    }

    #[test]
    fn for_loop_variable_is_visible_inside_its_own_body() {
        let mut b = Builder::new();
        let var = b.variable("f", Domain::Frequency).unwrap();
        let mut inner_ok = false;
        b.for_loop(&var, 100e6, 200e6, 10e6, |inner| {
            inner_ok = inner.set_frequency("b0", Operand::Variable(var.clone())).is_ok();
            inner
                .play("b0", square(100), None)
                .expect("play should succeed");
        });
        assert!(inner_ok);
        let program = b.finish();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn precompiled_block_flattens_into_current_scope() {
        let mut inner_builder = Builder::new();
        inner_builder.play("b0", square(40), None).unwrap();
        inner_builder.play("b0", square(20), None).unwrap();
        let precompiled = inner_builder.finish();

        let mut b = Builder::new();
        b.insert_precompiled(&precompiled);
        let program = b.finish();
        assert_eq!(program.len(), 2);
    }
}
