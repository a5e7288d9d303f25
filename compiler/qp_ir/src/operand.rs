// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::variable::Variable;
use serde::{Deserialize, Serialize};

/// Either a compile-time constant or a reference to a [`Variable`] resolved
/// at code-generation time. Named and shaped after `rir::Operand` in the
/// Q1ASM-adjacent teacher pipeline: the IR never hard-codes whether an
/// argument is static or dynamic, the generator decides at lowering time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operand<T> {
    Literal(T),
    Variable(Variable),
}

impl<T: Copy> Operand<T> {
    #[must_use]
    pub fn as_literal(&self) -> Option<T> {
        match self {
            Operand::Literal(value) => Some(*value),
            Operand::Variable(_) => None,
        }
    }
}

pub type TimeOperand = Operand<u32>;
pub type FreqOperand = Operand<f64>;
pub type PhaseOperand = Operand<f64>;
pub type GainOperand = Operand<f64>;
