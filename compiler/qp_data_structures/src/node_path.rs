// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Addressing for nodes within a `QProgram` tree, used to point compile
//! errors and diagnostics back at an offending node without borrowing the
//! tree itself (mirrors how `qsc_rir::debug` addresses instructions by
//! `(BlockId, usize)` rather than holding a reference).

use std::fmt::{self, Display, Formatter};

/// A child-index path from the program root down to a specific node.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for index in &self.0 {
            write!(f, ".{index}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let root = NodePath::root();
        let child = root.child(2).child(0);
        assert_eq!(child.to_string(), "$.2.0");
        assert_eq!(root.to_string(), "$");
    }
}
