//! Resource taxonomy shared by the ledger, item definitions, and events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A kind of quantity tracked by the [`ResourceLedger`](crate::ledger::ResourceLedger).
///
/// `Money` is the spendable currency. Data files may also spell it `coin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[serde(alias = "coin")]
    Money,
    Egg,
    Corn,
    Grape,
    Tomato,
}

/// Total number of resource kinds.
pub const RESOURCE_KIND_COUNT: usize = 5;

impl ResourceKind {
    /// All resource kinds in declaration order.
    pub const ALL: [ResourceKind; RESOURCE_KIND_COUNT] = [
        ResourceKind::Money,
        ResourceKind::Egg,
        ResourceKind::Corn,
        ResourceKind::Grape,
        ResourceKind::Tomato,
    ];

    /// Convert to usize index for array lookups.
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Money => "money",
            ResourceKind::Egg => "egg",
            ResourceKind::Corn => "corn",
            ResourceKind::Grape => "grape",
            ResourceKind::Tomato => "tomato",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A quantity of one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub resource: ResourceKind,
    pub amount: u32,
}

impl ResourceAmount {
    pub fn new(resource: ResourceKind, amount: u32) -> Self {
        Self { resource, amount }
    }
}

/// A full snapshot of ledger balances, one slot per [`ResourceKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Balances([u32; RESOURCE_KIND_COUNT]);

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build balances from `(kind, amount)` pairs. Later pairs overwrite earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ResourceKind, u32)>) -> Self {
        let mut balances = Self::default();
        for (kind, amount) in pairs {
            balances.set(kind, amount);
        }
        balances
    }

    pub fn get(&self, kind: ResourceKind) -> u32 {
        self.0[kind.index()]
    }

    pub fn set(&mut self, kind: ResourceKind, amount: u32) {
        self.0[kind.index()] = amount;
    }

    /// Iterate `(kind, amount)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u32)> + '_ {
        ResourceKind::ALL.iter().map(|&kind| (kind, self.get(kind)))
    }
}
