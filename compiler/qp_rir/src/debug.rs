// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A verbose dump of a [`BusProgram`], including its waveform/weight
//! tables and acquisition descriptors, for use in test `expect![]` blocks
//! and compiler diagnostics.

use crate::program::BusProgram;
use indenter::{indented, Indented};
use std::fmt::{self, Display, Formatter, Write};

pub struct BusProgramDump<'a>(pub &'a BusProgram);

impl Display for BusProgramDump<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.0)?;

        let mut indent = set_indentation(indented(f), 0);
        write!(indent, "waveforms:")?;
        indent = set_indentation(indent, 1);
        for (id, samples) in self.0.waveforms.iter() {
            write!(indent, "\n[{}]: len={}", id.0, samples.len())?;
        }

        indent = set_indentation(indent, 0);
        write!(indent, "\nweights:")?;
        indent = set_indentation(indent, 1);
        for (id, samples) in self.0.weights.iter() {
            write!(indent, "\n[{}]: len={}", id.0, samples.len())?;
        }

        indent = set_indentation(indent, 0);
        write!(indent, "\nacquisitions:")?;
        indent = set_indentation(indent, 1);
        for spec in &self.0.acquisitions {
            write!(
                indent,
                "\n[{}]: num_bins={} loop_shape={:?}",
                spec.index.0, spec.num_bins, spec.loop_shape
            )?;
        }
        Ok(())
    }
}

fn set_indentation<'a, 'b>(indent: Indented<'a, Formatter<'b>>, level: usize) -> Indented<'a, Formatter<'b>> {
    match level {
        0 => indent.with_str(""),
        1 => indent.with_str("    "),
        _ => unimplemented!("indentation level not supported"),
    }
}
