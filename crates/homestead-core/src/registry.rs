use crate::id::ItemKindId;
use crate::resource::{ResourceAmount, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Broad family of a placeable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Plant,
    Animal,
    Building,
}

/// Opaque reference to a visual asset, resolved by the presentation shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRef(pub String);

impl ModelRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One step of an item's growth timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthStage {
    pub model: ModelRef,
    /// Time spent in this stage, in cycles.
    pub duration: f64,
    /// Posted as pending yield when the stage is entered.
    pub yield_on_enter: Option<ResourceAmount>,
}

/// A resource produced or consumed on a fixed period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicResource {
    pub resource: ResourceKind,
    pub amount: u32,
    /// Period in cycles.
    pub interval: f64,
}

pub type YieldSource = PeriodicResource;
pub type NeedSource = PeriodicResource;

/// Static configuration of one placeable item kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefinition {
    pub name: String,
    /// Human-readable name for menus.
    pub label: String,
    /// Model shown when the item has no growth stages.
    pub model: ModelRef,
    /// Price in money.
    pub cost: u32,
    pub category: Category,
    /// Empty means the item does not grow.
    pub growth_stages: Vec<GrowthStage>,
    pub yields: Vec<YieldSource>,
    pub needs: Vec<NeedSource>,
    pub enabled: bool,
    pub disappear_on_collect: bool,
    pub fence_required: bool,
    /// Enclosure capacity this item provides.
    pub max_count_per: Option<u32>,
    pub animated: bool,
}

impl ItemDefinition {
    /// An enabled, static item with no timeline. Refine with the `with_*`
    /// methods.
    pub fn new(name: impl Into<String>, cost: u32, category: Category) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            model: ModelRef::new(name.clone()),
            name,
            cost,
            category,
            growth_stages: Vec::new(),
            yields: Vec::new(),
            needs: Vec::new(),
            enabled: true,
            disappear_on_collect: false,
            fence_required: false,
            max_count_per: None,
            animated: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = ModelRef::new(model);
        self
    }

    pub fn with_animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    pub fn with_stage(mut self, model: &str, duration: f64, yield_on_enter: Option<ResourceAmount>) -> Self {
        self.growth_stages.push(GrowthStage {
            model: ModelRef::new(model),
            duration,
            yield_on_enter,
        });
        self
    }

    pub fn with_yield(mut self, resource: ResourceKind, amount: u32, interval: f64) -> Self {
        self.yields.push(PeriodicResource {
            resource,
            amount,
            interval,
        });
        self
    }

    pub fn with_need(mut self, resource: ResourceKind, amount: u32, interval: f64) -> Self {
        self.needs.push(PeriodicResource {
            resource,
            amount,
            interval,
        });
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_disappear_on_collect(mut self, disappear: bool) -> Self {
        self.disappear_on_collect = disappear;
        self
    }

    pub fn with_fence_required(mut self, required: bool) -> Self {
        self.fence_required = required;
        self
    }

    pub fn with_max_count_per(mut self, count: u32) -> Self {
        self.max_count_per = Some(count);
        self
    }

    /// True if any yield source or stage yield produces money.
    pub fn yields_money(&self) -> bool {
        let produces = |r: ResourceKind, amount: u32| r == ResourceKind::Money && amount > 0;
        self.yields.iter().any(|y| produces(y.resource, y.amount))
            || self
                .growth_stages
                .iter()
                .filter_map(|s| s.yield_on_enter)
                .any(|y| produces(y.resource, y.amount))
    }

    /// Index of the terminal growth stage, if the item grows.
    pub fn last_stage_index(&self) -> Option<usize> {
        self.growth_stages.len().checked_sub(1)
    }

    /// Model to show while in `stage`.
    pub fn model_for_stage(&self, stage: usize) -> &ModelRef {
        self.growth_stages
            .get(stage)
            .map_or(&self.model, |s| &s.model)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidDefinition {
            name: self.name.clone(),
            reason,
        };
        if self.name.is_empty() {
            return Err(invalid("name is empty".into()));
        }
        for (i, stage) in self.growth_stages.iter().enumerate() {
            if !stage.duration.is_finite() || stage.duration < 0.0 {
                return Err(invalid(format!(
                    "growth stage {i} has invalid duration {}",
                    stage.duration
                )));
            }
        }
        for source in self.yields.iter().chain(&self.needs) {
            if !source.interval.is_finite() || source.interval <= 0.0 {
                return Err(invalid(format!(
                    "{} schedule has non-positive interval {}",
                    source.resource, source.interval
                )));
            }
        }
        Ok(())
    }
}

/// Builder for constructing an immutable [`Registry`].
/// Two-phase lifecycle: registration and mutation, then finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    items: Vec<ItemDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item definition. Returns the id it will have in the
    /// built registry.
    pub fn register(&mut self, definition: ItemDefinition) -> ItemKindId {
        let id = ItemKindId(self.items.len() as u32);
        self.items.push(definition);
        id
    }

    /// Mutate an already registered definition by name.
    pub fn mutate<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ItemDefinition),
    {
        let def = self
            .items
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| RegistryError::UnknownItemDefinition(name.to_string()))?;
        f(def);
        Ok(())
    }

    pub fn kind_id(&self, name: &str) -> Option<ItemKindId> {
        self.items
            .iter()
            .position(|d| d.name == name)
            .map(|i| ItemKindId(i as u32))
    }

    /// Validate every definition and freeze the registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut name_to_id = HashMap::with_capacity(self.items.len());
        for (i, def) in self.items.iter().enumerate() {
            def.validate()?;
            if name_to_id.insert(def.name.clone(), ItemKindId(i as u32)).is_some() {
                return Err(RegistryError::DuplicateName(def.name.clone()));
            }
        }

        Ok(Registry {
            items: self.items.into_iter().map(Arc::new).collect(),
            name_to_id,
        })
    }
}

/// Immutable item definition table. Frozen after [`RegistryBuilder::build`].
#[derive(Debug, Clone)]
pub struct Registry {
    items: Vec<Arc<ItemDefinition>>,
    name_to_id: HashMap<String, ItemKindId>,
}

impl Registry {
    pub fn get(&self, id: ItemKindId) -> Option<&Arc<ItemDefinition>> {
        self.items.get(id.0 as usize)
    }

    pub fn kind_id(&self, name: &str) -> Option<ItemKindId> {
        self.name_to_id.get(name).copied()
    }

    /// Look up a definition by name.
    pub fn lookup(&self, name: &str) -> Result<(ItemKindId, &Arc<ItemDefinition>), RegistryError> {
        let id = self
            .kind_id(name)
            .ok_or_else(|| RegistryError::UnknownItemDefinition(name.to_string()))?;
        Ok((id, &self.items[id.0 as usize]))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemKindId, &Arc<ItemDefinition>)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(i, def)| (ItemKindId(i as u32), def))
    }

    /// Names of the definitions a player may place, in registration order.
    pub fn enabled_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.items
            .iter()
            .filter(|d| d.enabled)
            .map(|d| d.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown item definition: {0}")]
    UnknownItemDefinition(String),
    #[error("duplicate item definition: {0}")]
    DuplicateName(String),
    #[error("invalid item definition {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },
}
