use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which result table a response is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseKind {
    /// Grid point displacements (T1, T2, T3).
    Displacement,
    /// CBUSH element forces (FX, FY, FZ).
    #[serde(rename = "cbush-force")]
    CBushForce,
}

impl ResponseKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Displacement => "Displacement",
            Self::CBushForce => "CBUSH Force",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-load-case result tables, keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTables {
    pub displacements: BTreeMap<u32, [f64; 3]>,
    pub cbush_forces: BTreeMap<u32, [f64; 3]>,
}

impl ResultTables {
    pub fn table(&self, kind: ResponseKind) -> &BTreeMap<u32, [f64; 3]> {
        match kind {
            ResponseKind::Displacement => &self.displacements,
            ResponseKind::CBushForce => &self.cbush_forces,
        }
    }

    fn table_mut(&mut self, kind: ResponseKind) -> &mut BTreeMap<u32, [f64; 3]> {
        match kind {
            ResponseKind::Displacement => &mut self.displacements,
            ResponseKind::CBushForce => &mut self.cbush_forces,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    load_cases: BTreeMap<u32, ResultTables>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, load_case: u32, kind: ResponseKind, id: u32, values: [f64; 3]) {
        self.load_cases
            .entry(load_case)
            .or_default()
            .table_mut(kind)
            .insert(id, values);
    }

    /// The lowest load case id present, if any.
    pub fn first_load_case(&self) -> Option<u32> {
        self.load_cases.keys().next().copied()
    }

    pub fn load_case(&self, id: u32) -> Option<&ResultTables> {
        self.load_cases.get(&id)
    }

    pub fn load_case_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.load_cases.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.load_cases.is_empty()
    }
}
