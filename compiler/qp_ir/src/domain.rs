// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// The physical quantity a [`crate::variable::Variable`] carries (spec §3.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Domain {
    Time,
    Frequency,
    Phase,
    Voltage,
    Scalar(ScalarType),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ScalarType {
    Int,
    Float,
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Time => write!(f, "Time"),
            Domain::Frequency => write!(f, "Frequency"),
            Domain::Phase => write!(f, "Phase"),
            Domain::Voltage => write!(f, "Voltage"),
            Domain::Scalar(ScalarType::Int) => write!(f, "Scalar(Int)"),
            Domain::Scalar(ScalarType::Float) => write!(f, "Scalar(Float)"),
        }
    }
}
