//! Lifecycle of a placed item.
//!
//! An [`ItemInstance`] runs up to three timelines at once, all driven by
//! one-shot timers on the farm [`Clock`]:
//!
//! - **growth**: one timer at a time, advancing `stage` until the last stage;
//! - **yields**: one self-rescheduling timer per declared yield source, each
//!   adding to the pending (uncollected) yield;
//! - **needs**: one self-rescheduling timer per declared need source, each
//!   debiting the ledger or starving the item.
//!
//! Disposal cancels every timer and is idempotent.

use crate::clock::Clock;
use crate::event::{Event, EventBus};
use crate::grid::GridPosition;
use crate::id::{ItemId, ItemKindId, TimerId};
use crate::ledger::{LedgerError, ResourceLedger};
use crate::presenter::{Presenter, VisualHandle};
use crate::registry::ItemDefinition;
use crate::resource::{ResourceAmount, ResourceKind};
use std::sync::Arc;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Timer payloads
// ---------------------------------------------------------------------------

/// Which timeline of an item a timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Growth,
    /// Index into the definition's `yields`.
    Yield(usize),
    /// Index into the definition's `needs`.
    Need(usize),
}

/// Payload of every timer the farm schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FarmTimer {
    pub item: ItemId,
    pub kind: TimerKind,
}

/// Why an item left the farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// Collected with `disappear_on_collect`.
    Harvested,
    /// A need could not be met.
    Starved,
    /// Removed by the player.
    Removed,
}

/// Coarse lifecycle state, for display and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not yet activated.
    Inactive,
    Growing(usize),
    /// On the last growth stage, or never grows.
    Mature,
    Disposed,
}

/// Services an item needs while it runs.
pub struct ItemContext<'a> {
    pub clock: &'a mut Clock<FarmTimer>,
    pub ledger: &'a mut ResourceLedger,
    pub events: &'a mut EventBus,
    pub presenter: &'a mut dyn Presenter,
}

// ---------------------------------------------------------------------------
// ItemInstance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ItemInstance {
    id: ItemId,
    kind: ItemKindId,
    def: Arc<ItemDefinition>,
    cell: GridPosition,
    stage: usize,
    /// Uncollected yield, one entry per resource kind in first-posted order.
    pending: Vec<ResourceAmount>,
    growth_timer: Option<TimerId>,
    yield_timers: Vec<Option<TimerId>>,
    need_timers: Vec<Option<TimerId>>,
    activated: bool,
    alive: bool,
    /// Counted as a money producer by the ledger.
    producer: bool,
    visual: Option<VisualHandle>,
}

impl ItemInstance {
    pub fn new(id: ItemId, kind: ItemKindId, def: Arc<ItemDefinition>, cell: GridPosition) -> Self {
        Self {
            yield_timers: vec![None; def.yields.len()],
            need_timers: vec![None; def.needs.len()],
            id,
            kind,
            def,
            cell,
            stage: 0,
            pending: Vec::new(),
            growth_timer: None,
            activated: false,
            alive: false,
            producer: false,
            visual: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKindId {
        self.kind
    }

    pub fn definition(&self) -> &Arc<ItemDefinition> {
        &self.def
    }

    pub fn cell(&self) -> GridPosition {
        self.cell
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn visual(&self) -> Option<VisualHandle> {
        self.visual
    }

    pub fn state(&self) -> LifecycleState {
        if !self.activated {
            return LifecycleState::Inactive;
        }
        if !self.alive {
            return LifecycleState::Disposed;
        }
        match self.def.last_stage_index() {
            Some(last) if self.stage < last => LifecycleState::Growing(self.stage),
            _ => LifecycleState::Mature,
        }
    }

    /// Uncollected yield.
    pub fn pending_yield(&self) -> &[ResourceAmount] {
        &self.pending
    }

    pub fn pending_amount(&self, resource: ResourceKind) -> u32 {
        self.pending
            .iter()
            .find(|p| p.resource == resource)
            .map_or(0, |p| p.amount)
    }

    pub fn growth_timer(&self) -> Option<TimerId> {
        self.growth_timer
    }

    /// Ids of every outstanding timer.
    pub fn active_timers(&self) -> impl Iterator<Item = TimerId> + '_ {
        self.growth_timer
            .iter()
            .chain(self.yield_timers.iter().flatten())
            .chain(self.need_timers.iter().flatten())
            .copied()
    }

    // -- Lifecycle --

    /// Pay for the item and start its timelines.
    ///
    /// Affordability is checked before anything is mutated; on error the
    /// ledger and clock are untouched.
    pub fn activate(&mut self, ctx: &mut ItemContext<'_>) -> Result<(), LedgerError> {
        debug_assert!(!self.activated, "item activated twice");
        ctx.ledger.check_afford(&self.def)?;

        // Registered first so the purchase itself does not count as depletion.
        if self.def.yields_money() {
            ctx.ledger.register_producer();
            self.producer = true;
        }
        ctx.ledger.spend(&self.def, ctx.events)?;

        self.activated = true;
        self.alive = true;
        self.visual = ctx
            .presenter
            .spawn_model(self.id, self.def.model_for_stage(0), self.cell);

        self.schedule_growth(ctx.clock);
        self.arm_yields(ctx.clock);
        for index in 0..self.def.needs.len() {
            self.arm_need(index, ctx.clock);
        }
        Ok(())
    }

    /// Handle a fired timer. Timers for a disposed item are ignored.
    pub fn on_timer(&mut self, kind: TimerKind, ctx: &mut ItemContext<'_>) {
        if !self.alive {
            return;
        }
        match kind {
            TimerKind::Growth => self.on_growth(ctx),
            TimerKind::Yield(index) => self.on_yield(index, ctx),
            TimerKind::Need(index) => self.on_need(index, ctx),
        }
    }

    fn on_growth(&mut self, ctx: &mut ItemContext<'_>) {
        self.growth_timer = None;
        let Some(last) = self.def.last_stage_index() else {
            return;
        };
        if self.stage >= last {
            return;
        }

        self.stage += 1;
        self.visual = ctx.presenter.swap_model(
            self.id,
            self.visual.take(),
            self.def.model_for_stage(self.stage),
        );
        debug!(item = %self.def.name, stage = self.stage, "stage advanced");
        ctx.events.emit(Event::StageAdvanced {
            item: self.id,
            stage: self.stage,
        });

        if let Some(y) = self.def.growth_stages[self.stage].yield_on_enter {
            self.post_yield(y.resource, y.amount, ctx);
        }
        self.schedule_growth(ctx.clock);
    }

    fn on_yield(&mut self, index: usize, ctx: &mut ItemContext<'_>) {
        let Some(&source) = self.def.yields.get(index) else {
            return;
        };
        self.yield_timers[index] = None;
        self.post_yield(source.resource, source.amount, ctx);
        self.arm_yield(index, ctx.clock);
    }

    fn on_need(&mut self, index: usize, ctx: &mut ItemContext<'_>) {
        let Some(&need) = self.def.needs.get(index) else {
            return;
        };
        self.need_timers[index] = None;

        match ctx.ledger.consume(need.resource, need.amount, ctx.events) {
            Ok(()) => {
                ctx.events.emit(Event::NeedConsumed {
                    item: self.id,
                    resource: need.resource,
                    amount: need.amount,
                });
                self.arm_need(index, ctx.clock);
            }
            Err(err) => {
                info!(item = %self.def.name, %err, "item starved");
                // Nothing pending is lost to starvation.
                self.drain_pending(ctx);
                self.dispose(RemovalReason::Starved, ctx);
            }
        }
    }

    fn post_yield(&mut self, resource: ResourceKind, amount: u32, ctx: &mut ItemContext<'_>) {
        let total = match self.pending.iter_mut().find(|p| p.resource == resource) {
            Some(entry) => {
                entry.amount = entry.amount.saturating_add(amount);
                entry.amount
            }
            None => {
                self.pending.push(ResourceAmount::new(resource, amount));
                amount
            }
        };
        ctx.events.emit(Event::YieldPosted {
            item: self.id,
            resource,
            amount,
        });
        ctx.presenter.show_yield(self.id, resource, total);
    }

    /// Collect the pending yield into the ledger.
    ///
    /// Returns what was collected, empty if nothing was pending. Afterwards
    /// the item either disposes (`disappear_on_collect`) or restarts every
    /// yield timer.
    pub fn collect(&mut self, ctx: &mut ItemContext<'_>) -> Vec<ResourceAmount> {
        if !self.alive || self.pending.is_empty() {
            return Vec::new();
        }
        let collected = self.drain_pending(ctx);
        if self.def.disappear_on_collect {
            self.dispose(RemovalReason::Harvested, ctx);
        } else {
            self.arm_yields(ctx.clock);
        }
        collected
    }

    fn drain_pending(&mut self, ctx: &mut ItemContext<'_>) -> Vec<ResourceAmount> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let collected = std::mem::take(&mut self.pending);
        for r in &collected {
            ctx.ledger.earn(r.resource, r.amount, ctx.events);
            ctx.events.emit(Event::YieldCollected {
                item: self.id,
                resource: r.resource,
                amount: r.amount,
            });
        }
        ctx.presenter.hide_yield(self.id);
        collected
    }

    /// Cancel every timer and leave the farm. Returns false if the item was
    /// already disposed (or never activated), in which case nothing happens.
    pub fn dispose(&mut self, reason: RemovalReason, ctx: &mut ItemContext<'_>) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;

        for id in self.active_timers().collect::<Vec<_>>() {
            ctx.clock.cancel(id);
        }
        self.growth_timer = None;
        self.yield_timers.iter_mut().for_each(|t| *t = None);
        self.need_timers.iter_mut().for_each(|t| *t = None);

        if self.producer {
            self.producer = false;
            ctx.ledger.release_producer(ctx.events);
        }
        ctx.presenter.despawn(self.id, self.visual.take(), self.cell);
        info!(item = %self.def.name, cell = %self.cell, ?reason, "item removed");
        ctx.events.emit(Event::ItemRemoved {
            item: self.id,
            cell: self.cell,
            reason,
        });
        true
    }

    // -- Scheduling --

    fn timer(&self, kind: TimerKind) -> FarmTimer {
        FarmTimer {
            item: self.id,
            kind,
        }
    }

    fn schedule_growth(&mut self, clock: &mut Clock<FarmTimer>) {
        debug_assert!(self.growth_timer.is_none(), "two growth timers pending");
        let Some(last) = self.def.last_stage_index() else {
            return;
        };
        if self.stage >= last {
            return;
        }
        let delay = clock.cycles(self.def.growth_stages[self.stage].duration);
        self.growth_timer = Some(clock.schedule(self.timer(TimerKind::Growth), delay));
    }

    /// Restart every yield timer from now.
    fn arm_yields(&mut self, clock: &mut Clock<FarmTimer>) {
        for index in 0..self.def.yields.len() {
            self.arm_yield(index, clock);
        }
    }

    fn arm_yield(&mut self, index: usize, clock: &mut Clock<FarmTimer>) {
        if let Some(old) = self.yield_timers[index].take() {
            clock.cancel(old);
        }
        let delay = clock.cycles(self.def.yields[index].interval);
        self.yield_timers[index] = Some(clock.schedule(self.timer(TimerKind::Yield(index)), delay));
    }

    fn arm_need(&mut self, index: usize, clock: &mut Clock<FarmTimer>) {
        if let Some(old) = self.need_timers[index].take() {
            clock.cancel(old);
        }
        let delay = clock.cycles(self.def.needs[index].interval);
        self.need_timers[index] = Some(clock.schedule(self.timer(TimerKind::Need(index)), delay));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockConfig;
    use crate::event::EventKind;
    use crate::ledger::LedgerConfig;
    use crate::presenter::NullPresenter;
    use crate::registry::Category;
    use slotmap::SlotMap;

    struct Harness {
        clock: Clock<FarmTimer>,
        ledger: ResourceLedger,
        events: EventBus,
        presenter: NullPresenter,
        item: ItemInstance,
    }

    impl Harness {
        fn new(def: ItemDefinition, starting: &[(ResourceKind, u32)]) -> Self {
            let mut ids = SlotMap::<ItemId, ()>::with_key();
            let config = LedgerConfig {
                starting: starting
                    .iter()
                    .map(|&(k, a)| ResourceAmount::new(k, a))
                    .collect(),
                ..LedgerConfig::default()
            };
            Self {
                clock: Clock::new(ClockConfig {
                    cycle_duration: 1.0,
                    ..ClockConfig::default()
                })
                .unwrap(),
                ledger: ResourceLedger::new(&config),
                events: EventBus::default(),
                presenter: NullPresenter,
                item: ItemInstance::new(ids.insert(()), ItemKindId(0), Arc::new(def), GridPosition::new(0, 0)),
            }
        }

        /// Run `f` with the item and a context over everything else.
        fn with_ctx<R>(&mut self, f: impl FnOnce(&mut ItemInstance, &mut ItemContext<'_>) -> R) -> R {
            let mut ctx = ItemContext {
                clock: &mut self.clock,
                ledger: &mut self.ledger,
                events: &mut self.events,
                presenter: &mut self.presenter,
            };
            f(&mut self.item, &mut ctx)
        }

        fn activate(&mut self) {
            self.with_ctx(|item, ctx| item.activate(ctx)).unwrap();
        }

        fn advance(&mut self, dt: f64) {
            let Harness {
                clock,
                ledger,
                events,
                presenter,
                item,
            } = self;
            clock.advance(dt, |clock, _id, timer: FarmTimer| {
                let mut ctx = ItemContext {
                    clock,
                    ledger: &mut *ledger,
                    events: &mut *events,
                    presenter: &mut *presenter,
                };
                item.on_timer(timer.kind, &mut ctx);
                Ok::<(), String>(())
            });
        }

        fn collect(&mut self) -> Vec<ResourceAmount> {
            self.with_ctx(|item, ctx| item.collect(ctx))
        }
    }

    fn corn() -> ItemDefinition {
        ItemDefinition::new("corn", 2, Category::Plant)
            .with_stage("corn_0", 1.0, None)
            .with_stage("corn_1", 1.0, None)
            .with_stage("corn_2", 1.0, Some(ResourceAmount::new(ResourceKind::Corn, 5)))
            .with_disappear_on_collect(true)
    }

    fn chicken() -> ItemDefinition {
        ItemDefinition::new("chicken", 2, Category::Animal)
            .with_yield(ResourceKind::Egg, 1, 0.5)
            .with_need(ResourceKind::Corn, 1, 1.0)
    }

    #[test]
    fn activation_spends_and_schedules() {
        let mut h = Harness::new(corn(), &[(ResourceKind::Money, 3)]);
        h.activate();
        assert_eq!(h.ledger.balance(ResourceKind::Money), 1);
        assert_eq!(h.item.state(), LifecycleState::Growing(0));
        assert!(h.item.growth_timer().is_some());
        assert_eq!(h.clock.pending_count(), 1);
    }

    #[test]
    fn activation_fails_cleanly_when_unaffordable() {
        let mut h = Harness::new(corn(), &[(ResourceKind::Money, 1)]);
        let err = h.with_ctx(|item, ctx| item.activate(ctx)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientResources { .. }));
        assert_eq!(h.ledger.balance(ResourceKind::Money), 1);
        assert_eq!(h.clock.pending_count(), 0);
        assert_eq!(h.item.state(), LifecycleState::Inactive);
    }

    #[test]
    fn corn_grows_through_stages_and_yields_at_last() {
        let mut h = Harness::new(corn(), &[(ResourceKind::Money, 3)]);
        h.activate();

        h.advance(1.0);
        assert_eq!(h.item.stage(), 1);
        h.advance(1.0);
        assert_eq!(h.item.stage(), 2);
        assert_eq!(h.item.state(), LifecycleState::Mature);
        assert_eq!(h.item.pending_amount(ResourceKind::Corn), 5);
        assert!(h.item.growth_timer().is_none());

        // The terminal stage is static.
        h.advance(10.0);
        assert_eq!(h.item.stage(), 2);
        assert_eq!(h.clock.pending_count(), 0);
    }

    #[test]
    fn collect_with_disappear_disposes() {
        let mut h = Harness::new(corn(), &[(ResourceKind::Money, 3)]);
        h.activate();
        h.advance(1.0);
        h.advance(1.0);

        let got = h.collect();
        assert_eq!(got, vec![ResourceAmount::new(ResourceKind::Corn, 5)]);
        assert_eq!(h.ledger.balance(ResourceKind::Corn), 5);
        assert_eq!(h.item.state(), LifecycleState::Disposed);
        assert_eq!(h.events.total_emitted(EventKind::ItemRemoved), 1);
        assert!(h.collect().is_empty());
    }

    #[test]
    fn collect_with_nothing_pending_is_noop() {
        let mut h = Harness::new(corn(), &[(ResourceKind::Money, 3)]);
        h.activate();
        assert!(h.collect().is_empty());
        assert!(h.item.is_alive());
    }

    #[test]
    fn yields_accumulate_until_collected() {
        let mut h = Harness::new(
            chicken(),
            &[(ResourceKind::Money, 2), (ResourceKind::Corn, 10)],
        );
        h.activate();
        h.advance(0.5);
        h.advance(0.5);
        assert_eq!(h.item.pending_amount(ResourceKind::Egg), 2);
        assert_eq!(h.events.total_emitted(EventKind::YieldPosted), 2);

        let got = h.collect();
        assert_eq!(got, vec![ResourceAmount::new(ResourceKind::Egg, 2)]);
        assert!(h.item.is_alive());
        assert_eq!(h.ledger.balance(ResourceKind::Egg), 2);
        // Re-armed: one yield timer and one need timer.
        assert_eq!(h.item.active_timers().count(), 2);
    }

    #[test]
    fn need_consumes_each_interval() {
        let mut h = Harness::new(
            chicken(),
            &[(ResourceKind::Money, 2), (ResourceKind::Corn, 3)],
        );
        h.activate();
        // One corn was spent on placement.
        assert_eq!(h.ledger.balance(ResourceKind::Corn), 2);
        h.advance(1.0);
        assert_eq!(h.ledger.balance(ResourceKind::Corn), 1);
        assert_eq!(h.events.total_emitted(EventKind::NeedConsumed), 1);
        assert!(h.item.is_alive());
    }

    #[test]
    fn starvation_auto_collects_then_disposes() {
        let mut h = Harness::new(
            chicken(),
            &[(ResourceKind::Money, 2), (ResourceKind::Corn, 1)],
        );
        h.activate();
        assert_eq!(h.ledger.balance(ResourceKind::Corn), 0);

        h.advance(0.5);
        assert_eq!(h.item.pending_amount(ResourceKind::Egg), 1);
        h.advance(0.5);

        // The need timer was armed first, so it fires before the second egg.
        assert!(!h.item.is_alive());
        assert_eq!(h.ledger.balance(ResourceKind::Egg), 1);
        assert_eq!(h.item.active_timers().count(), 0);
        assert_eq!(h.clock.pending_count(), 0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut h = Harness::new(
            chicken(),
            &[(ResourceKind::Money, 2), (ResourceKind::Corn, 5)],
        );
        h.activate();
        assert!(h.with_ctx(|item, ctx| item.dispose(RemovalReason::Removed, ctx)));
        assert!(!h.with_ctx(|item, ctx| item.dispose(RemovalReason::Removed, ctx)));
        assert_eq!(h.events.total_emitted(EventKind::ItemRemoved), 1);
        assert_eq!(h.clock.pending_count(), 0);
    }

    #[test]
    fn money_producer_registered_and_released() {
        let strawberry = ItemDefinition::new("strawberry", 1, Category::Plant)
            .with_stage("s0", 1.0, None)
            .with_stage("s1", 1.0, Some(ResourceAmount::new(ResourceKind::Money, 3)))
            .with_disappear_on_collect(true);
        let mut h = Harness::new(strawberry, &[(ResourceKind::Money, 1)]);
        h.activate();
        assert_eq!(h.ledger.money_producers(), 1);
        assert!(!h.ledger.is_depleted());

        h.advance(1.0);
        h.collect();
        assert_eq!(h.ledger.money_producers(), 0);
        assert_eq!(h.ledger.balance(ResourceKind::Money), 3);
        assert_eq!(h.events.total_emitted(EventKind::MoneyDepleted), 0);
    }

    #[test]
    fn zero_duration_stage_fires_on_next_advancing_pass() {
        let def = ItemDefinition::new("sprout", 0, Category::Plant)
            .with_stage("a", 0.0, None)
            .with_stage("b", 0.0, None)
            .with_stage("c", 0.0, None);
        let mut h = Harness::new(def, &[]);
        h.activate();
        h.advance(0.0);
        assert_eq!(h.item.stage(), 0);
        // Stages chained during a pass wait for the next pass.
        h.advance(0.25);
        assert_eq!(h.item.stage(), 1);
        h.advance(0.25);
        assert_eq!(h.item.stage(), 2);
    }
}
