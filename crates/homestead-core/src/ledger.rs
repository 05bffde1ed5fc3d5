//! The shared resource store.
//!
//! All balances live here and are only mutated through [`ResourceLedger::spend`],
//! [`ResourceLedger::earn`] and [`ResourceLedger::consume`]. Each mutation
//! emits [`Event::ResourcesChanged`] and evaluates the two edge-triggered
//! signals in the same call:
//!
//! - [`Event::GoalReached`] fires once, the first time the goal resource
//!   reaches its threshold. The latch never resets.
//! - [`Event::MoneyDepleted`] fires on entering the state "no money and no
//!   live item that can produce money". The episode ends as soon as money is
//!   positive again or a producer is registered.

use crate::event::{Event, EventBus};
use crate::registry::ItemDefinition;
use crate::resource::{Balances, ResourceAmount, ResourceKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Opening balances. Kinds not listed start at zero.
    pub starting: Vec<ResourceAmount>,
    pub goal_resource: ResourceKind,
    pub goal_threshold: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting: vec![ResourceAmount::new(ResourceKind::Money, 3)],
            goal_resource: ResourceKind::Egg,
            goal_threshold: 25,
        }
    }
}

impl LedgerConfig {
    pub fn starting_balances(&self) -> Balances {
        Balances::from_pairs(self.starting.iter().map(|r| (r.resource, r.amount)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient {resource}: required {required}, available {available}")]
    InsufficientResources {
        resource: ResourceKind,
        required: u32,
        available: u32,
    },
}

// ---------------------------------------------------------------------------
// ResourceLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResourceLedger {
    balances: Balances,
    goal_resource: ResourceKind,
    goal_threshold: u32,
    goal_reached: bool,
    depleted: bool,
    money_producers: u32,
}

impl ResourceLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        let balances = config.starting_balances();
        let goal_threshold = config.goal_threshold.max(1);
        Self {
            goal_reached: balances.get(config.goal_resource) >= goal_threshold,
            balances,
            goal_resource: config.goal_resource,
            goal_threshold,
            depleted: false,
            money_producers: 0,
        }
    }

    pub fn balance(&self, kind: ResourceKind) -> u32 {
        self.balances.get(kind)
    }

    pub fn balances(&self) -> Balances {
        self.balances
    }

    /// Everything placing `def` debits: its cost in money plus one round of
    /// each declared need.
    fn requirements(def: &ItemDefinition) -> Balances {
        let mut required = Balances::new();
        required.set(ResourceKind::Money, def.cost);
        for need in &def.needs {
            let so_far = required.get(need.resource);
            required.set(need.resource, so_far.saturating_add(need.amount));
        }
        required
    }

    fn first_shortfall(&self, required: &Balances) -> Option<LedgerError> {
        required
            .iter()
            .find(|&(kind, amount)| self.balances.get(kind) < amount)
            .map(|(resource, required)| LedgerError::InsufficientResources {
                resource,
                required,
                available: self.balances.get(resource),
            })
    }

    pub fn can_afford(&self, def: &ItemDefinition) -> bool {
        self.check_afford(def).is_ok()
    }

    /// Like [`can_afford`](Self::can_afford), naming the first short resource.
    pub fn check_afford(&self, def: &ItemDefinition) -> Result<(), LedgerError> {
        match self.first_shortfall(&Self::requirements(def)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Debit the cost and needs of `def` as one mutation.
    ///
    /// Nothing changes if any balance falls short.
    pub fn spend(&mut self, def: &ItemDefinition, bus: &mut EventBus) -> Result<(), LedgerError> {
        let required = Self::requirements(def);
        if let Some(err) = self.first_shortfall(&required) {
            return Err(err);
        }
        for (kind, amount) in required.iter() {
            self.balances.set(kind, self.balances.get(kind) - amount);
        }
        debug!(item = %def.name, cost = def.cost, "spent");
        self.changed(bus);
        Ok(())
    }

    pub fn earn(&mut self, kind: ResourceKind, amount: u32, bus: &mut EventBus) {
        let balance = self.balances.get(kind).saturating_add(amount);
        self.balances.set(kind, balance);
        self.changed(bus);

        if kind == self.goal_resource && !self.goal_reached && balance >= self.goal_threshold {
            self.goal_reached = true;
            info!(resource = %kind, balance, "goal reached");
            bus.emit(Event::GoalReached {
                resource: kind,
                balance,
            });
        }
    }

    /// Debit a single resource, e.g. one feeding of an animal.
    pub fn consume(
        &mut self,
        kind: ResourceKind,
        amount: u32,
        bus: &mut EventBus,
    ) -> Result<(), LedgerError> {
        let available = self.balances.get(kind);
        if available < amount {
            return Err(LedgerError::InsufficientResources {
                resource: kind,
                required: amount,
                available,
            });
        }
        self.balances.set(kind, available - amount);
        self.changed(bus);
        Ok(())
    }

    /// Fraction of the goal reached, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let balance = f64::from(self.balances.get(self.goal_resource));
        (balance / f64::from(self.goal_threshold)).min(1.0)
    }

    pub fn goal_resource(&self) -> ResourceKind {
        self.goal_resource
    }

    pub fn goal_threshold(&self) -> u32 {
        self.goal_threshold
    }

    pub fn goal_reached(&self) -> bool {
        self.goal_reached
    }

    /// True while inside a depletion episode.
    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    pub fn money_producers(&self) -> u32 {
        self.money_producers
    }

    /// Record a live item that can yield money.
    pub fn register_producer(&mut self) {
        self.money_producers += 1;
        self.depleted = false;
    }

    /// Forget a money producer that left the farm.
    pub fn release_producer(&mut self, bus: &mut EventBus) {
        self.money_producers = self.money_producers.saturating_sub(1);
        self.check_depletion(bus);
    }

    fn changed(&mut self, bus: &mut EventBus) {
        bus.emit(Event::ResourcesChanged {
            balances: self.balances,
        });
        self.check_depletion(bus);
    }

    fn check_depletion(&mut self, bus: &mut EventBus) {
        let depleted = self.balances.get(ResourceKind::Money) == 0 && self.money_producers == 0;
        if depleted && !self.depleted {
            warn!("money depleted with no producers left");
            bus.emit(Event::MoneyDepleted);
        }
        self.depleted = depleted;
    }
}
