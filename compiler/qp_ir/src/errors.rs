// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::domain::Domain;
use thiserror::Error;

/// Errors raised while constructing a `QProgram` (spec §4.1).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BuildError {
    #[error("variable label `{0}` is already in use in this program")]
    DuplicateLabel(String),

    #[error("variable `{0}` is not in lexical scope at this point in the program")]
    UnknownVariable(String),

    #[error("variable `{label}` has domain {found}, but this operation requires {expected}")]
    DomainMismatch {
        label: String,
        expected: Domain,
        found: Domain,
    },
}
