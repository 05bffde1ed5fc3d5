//! Serde data file structs for farm content definitions.
//!
//! These structs define the on-disk format of the item catalog. They are
//! deserialized from RON, JSON, or TOML data files and then turned into
//! [`ItemDefinition`]s by the loader. The farm configuration needs no
//! mirror type: [`FarmConfig`](homestead_core::config::FarmConfig) is read
//! directly.

use homestead_core::registry::{Category, ItemDefinition};
use homestead_core::resource::{ResourceAmount, ResourceKind};
use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// One placeable item kind in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Model shown before the first stage swap. Defaults to the first
    /// stage's model, then to the item name.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cost: u32,
    pub category: Category,
    #[serde(default)]
    pub stages: Vec<StageData>,
    #[serde(default)]
    pub yields: Vec<PeriodicData>,
    #[serde(default)]
    pub needs: Vec<PeriodicData>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub disappear_on_collect: bool,
    #[serde(default)]
    pub fence_required: bool,
    #[serde(default)]
    pub max_count_per: Option<u32>,
    #[serde(default)]
    pub animated: bool,
}

fn default_true() -> bool {
    true
}

/// A growth stage entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StageData {
    pub model: String,
    /// Cycles spent in the stage.
    #[serde(default = "default_stage_duration")]
    pub duration: f64,
    /// Posted as pending yield when the stage is entered.
    #[serde(default)]
    pub harvest: Option<AmountData>,
}

fn default_stage_duration() -> f64 {
    1.0
}

/// A resource quantity.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AmountData {
    pub resource: ResourceKind,
    pub amount: u32,
}

impl From<AmountData> for ResourceAmount {
    fn from(data: AmountData) -> Self {
        ResourceAmount::new(data.resource, data.amount)
    }
}

/// A recurring yield or need. `every` is in cycles.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PeriodicData {
    pub resource: ResourceKind,
    pub amount: u32,
    pub every: f64,
}

/// Top-level wrapper for TOML item files (`[[items]]` arrays).
#[derive(Debug, Clone, Deserialize)]
pub struct TomlItems {
    pub items: Vec<ItemData>,
}

impl ItemData {
    /// Build the runtime definition. Value checks happen when the registry
    /// is built.
    pub fn into_definition(self) -> ItemDefinition {
        let model = self
            .model
            .or_else(|| self.stages.first().map(|s| s.model.clone()))
            .unwrap_or_else(|| self.name.clone());

        let mut def = ItemDefinition::new(self.name, self.cost, self.category)
            .with_model(model)
            .with_enabled(self.enabled)
            .with_disappear_on_collect(self.disappear_on_collect)
            .with_fence_required(self.fence_required)
            .with_animated(self.animated);

        if let Some(label) = self.label {
            def = def.with_label(label);
        }
        if let Some(count) = self.max_count_per {
            def = def.with_max_count_per(count);
        }
        for stage in &self.stages {
            def = def.with_stage(&stage.model, stage.duration, stage.harvest.map(Into::into));
        }
        for y in self.yields {
            def = def.with_yield(y.resource, y.amount, y.every);
        }
        for n in self.needs {
            def = def.with_need(n.resource, n.amount, n.every);
        }
        def
    }
}

// ===========================================================================
// Tests
// ===========================================================================
