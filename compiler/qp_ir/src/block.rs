// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ops::Operation;
use crate::variable::Variable;
use serde::{Deserialize, Serialize};

/// A node in the QProgram tree (spec §3.3). `Block` carries no semantics of
/// its own; `ForLoop`/`Loop`/`Parallel`/`InfiniteLoop`/`Average` establish a
/// lexical scope and a loop variable (or variables, for `Parallel`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Block(Vec<Node>),
    InfiniteLoop(Vec<Node>),
    ForLoop {
        var: Variable,
        start: f64,
        stop: f64,
        step: f64,
        body: Vec<Node>,
    },
    Loop {
        var: Variable,
        values: Vec<f64>,
        body: Vec<Node>,
    },
    Parallel {
        branches: Vec<ParallelBranch>,
    },
    Average {
        shots: u32,
        body: Vec<Node>,
    },
    Op(Operation),
}

/// One lane of a `Parallel` node: its own loop header, executed in lockstep
/// with every other branch (spec §3.3 invariant: equal iteration count).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParallelBranch {
    pub kind: LoopKind,
    pub body: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LoopKind {
    For {
        var: Variable,
        start: f64,
        stop: f64,
        step: f64,
    },
    Values {
        var: Variable,
        values: Vec<f64>,
    },
}

impl LoopKind {
    /// Number of iterations this loop header runs for (spec §4.3: `Parallel`
    /// requires every branch to agree on this).
    #[must_use]
    pub fn iteration_count(&self) -> usize {
        match self {
            LoopKind::For {
                start, stop, step, ..
            } => for_loop_iteration_count(*start, *stop, *step),
            LoopKind::Values { values, .. } => values.len(),
        }
    }

    #[must_use]
    pub fn var(&self) -> &Variable {
        match self {
            LoopKind::For { var, .. } | LoopKind::Values { var, .. } => var,
        }
    }
}

/// `ForLoop` is inclusive on both ends; `stop` is reached by repeatedly
/// adding `step` (spec §3.3, §4.4.3).
#[must_use]
pub fn for_loop_iteration_count(start: f64, stop: f64, step: f64) -> usize {
    if step == 0.0 {
        return 1;
    }
    let span = (stop - start) / step;
    if span < 0.0 {
        return 0;
    }
    span.floor() as usize + 1
}

impl Node {
    /// Visits every `Operation` leaf reachable from this node, in program order.
    pub fn for_each_operation<'a>(&'a self, visit: &mut impl FnMut(&'a Operation)) {
        match self {
            Node::Block(children) | Node::InfiniteLoop(children) => {
                for child in children {
                    child.for_each_operation(visit);
                }
            }
            Node::ForLoop { body, .. } | Node::Loop { body, .. } | Node::Average { body, .. } => {
                for child in body {
                    child.for_each_operation(visit);
                }
            }
            Node::Parallel { branches } => {
                for branch in branches {
                    for child in &branch.body {
                        child.for_each_operation(visit);
                    }
                }
            }
            Node::Op(op) => visit(op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_for_loop_counts_both_ends() {
        assert_eq!(for_loop_iteration_count(100e6, 200e6, 10e6), 11);
        assert_eq!(for_loop_iteration_count(0.0, 0.0, 1.0), 1);
        assert_eq!(for_loop_iteration_count(0.0, 10.0, 3.0), 4);
    }
}
