// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::domain::Domain;
use serde::{Deserialize, Serialize};
use std::{
    hash::{Hash, Hasher},
    rc::Rc,
};

qp_data_structures::index_type! {
    /// Identity token for a [`Variable`]. Structural equality on label alone
    /// is not sufficient (spec §3.2): two variables with the same label in
    /// different programs, or re-declared after deletion, are distinct. Only
    /// the id is compared.
    #[derive(Serialize, Deserialize)]
    pub struct VariableId(u32);
}

/// A named, typed slot bound by a loop header (spec §3.2). Only writable via
/// the loop that declares it; read-only everywhere it's used as an operand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variable {
    pub(crate) id: VariableId,
    pub label: Rc<str>,
    pub domain: Domain,
}

impl Variable {
    #[must_use]
    pub fn id(&self) -> VariableId {
        self.id
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
