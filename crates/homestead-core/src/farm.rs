//! The farm: composition root that wires the clock, ledger, item catalog,
//! placement grid, event bus and presenter together.
//!
//! # Frame Pipeline
//!
//! Each call to [`Farm::advance`] runs:
//!
//! 1. **Pre-tick** -- apply queued commands (from the shell or from reactive
//!    event handlers).
//! 2. **Clock** -- advance virtual time and fire due item timers.
//! 3. **Reap** -- items disposed during the pass release their cells.
//! 4. **Deliver** -- buffered events go to subscribers; reactive handlers
//!    queue commands for the next frame.
//!
//! Direct operations ([`Farm::place`], [`Farm::collect`], [`Farm::remove`])
//! deliver their events before returning.

use crate::clock::{Clock, FrameObserver};
use crate::command_queue::{Command, CommandQueue};
use crate::config::{ConfigError, FarmConfig};
use crate::daylight::{self, DaylightSample};
use crate::event::{Event, EventBus, EventKind, PassiveListener, ReactiveHandler};
use crate::grid::{GridError, GridPosition, PlacementGrid};
use crate::id::{ItemId, ItemKindId, ObserverId, SubscriptionId, TimerId};
use crate::item::{FarmTimer, ItemContext, ItemInstance, LifecycleState, RemovalReason};
use crate::ledger::{LedgerError, ResourceLedger};
use crate::presenter::{NullPresenter, Presenter, SoundCue};
use crate::registry::{Registry, RegistryError};
use crate::resource::{ResourceAmount, ResourceKind};
use crate::sim::{AdvanceReport, StateHash};
use slotmap::SlotMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an item could not be placed. Nothing is mutated on any of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlacementError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("item {0} is not available")]
    Disabled(String),
    #[error("no item is selected")]
    NothingSelected,
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("all enclosures are full (capacity {capacity})")]
    EnclosureFull { capacity: u32 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FarmError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error("no live item {0:?}")]
    UnknownItem(ItemId),
    #[error("timer {timer:?} fired for missing item {item:?}")]
    StaleTimer { timer: TimerId, item: ItemId },
}

// ---------------------------------------------------------------------------
// FarmState
// ---------------------------------------------------------------------------

/// Everything except the clock, so timer handlers can borrow both.
#[derive(Debug)]
struct FarmState {
    registry: Registry,
    ledger: ResourceLedger,
    events: EventBus,
    grid: PlacementGrid,
    items: SlotMap<ItemId, ItemInstance>,
    presenter: Box<dyn Presenter>,
    selected: Option<ItemKindId>,
    enforce_enclosures: bool,
}

impl FarmState {
    /// Run `f` against a live item, then reap it if it was disposed.
    fn with_item<R>(
        &mut self,
        clock: &mut Clock<FarmTimer>,
        id: ItemId,
        f: impl FnOnce(&mut ItemInstance, &mut ItemContext<'_>) -> R,
    ) -> Option<R> {
        let item = self.items.get_mut(id)?;
        let mut ctx = ItemContext {
            clock,
            ledger: &mut self.ledger,
            events: &mut self.events,
            presenter: self.presenter.as_mut(),
        };
        let out = f(item, &mut ctx);
        if item.state() == LifecycleState::Disposed {
            self.reap(id);
        }
        Some(out)
    }

    fn fire(
        &mut self,
        clock: &mut Clock<FarmTimer>,
        timer_id: TimerId,
        timer: FarmTimer,
    ) -> Result<(), FarmError> {
        self.with_item(clock, timer.item, |item, ctx| item.on_timer(timer.kind, ctx))
            .ok_or(FarmError::StaleTimer {
                timer: timer_id,
                item: timer.item,
            })
    }

    fn reap(&mut self, id: ItemId) {
        if self.items.remove(id).is_none() {
            return;
        }
        if let Err(err) = self.grid.release(id) {
            debug!(?id, %err, "reaped item held no cell");
        }
    }

    /// Live enclosure capacity and live fence-required items.
    fn enclosure_room(&self) -> (u32, u32) {
        let live = self.items.values().filter(|i| i.is_alive());
        let (capacity, used) = live.fold((0u32, 0u32), |(cap, used), item| {
            let def = item.definition();
            (
                cap.saturating_add(def.max_count_per.unwrap_or(0)),
                used + u32::from(def.fence_required),
            )
        });
        (capacity, used)
    }
}

// ---------------------------------------------------------------------------
// Farm
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Farm {
    clock: Clock<FarmTimer>,
    state: FarmState,
    commands: CommandQueue,
}

impl Farm {
    /// Build a farm that renders nothing.
    pub fn new(config: FarmConfig, registry: Registry) -> Result<Self, FarmError> {
        Self::with_presenter(config, registry, Box::new(NullPresenter))
    }

    pub fn with_presenter(
        config: FarmConfig,
        registry: Registry,
        presenter: Box<dyn Presenter>,
    ) -> Result<Self, FarmError> {
        config.validate()?;
        let clock = Clock::new(config.clock.clone()).map_err(ConfigError::from)?;

        let mut farm = Self {
            clock,
            state: FarmState {
                registry,
                ledger: ResourceLedger::new(&config.ledger),
                events: EventBus::new(config.event_capacity),
                grid: PlacementGrid::new(config.layout.clone()),
                items: SlotMap::with_key(),
                presenter,
                selected: None,
                enforce_enclosures: config.enforce_enclosures,
            },
            commands: CommandQueue::with_max_history(config.command_history),
        };
        if let Some(name) = &config.selected_item {
            farm.select(name)?;
        }
        info!(
            items = farm.state.registry.len(),
            cycle = config.clock.cycle_duration,
            "farm created"
        );
        Ok(farm)
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Run one frame with the real time since the previous frame.
    pub fn advance(&mut self, real_delta: f64) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        self.phase_pre_tick(&mut report);

        let Farm { clock, state, .. } = self;
        let frame = clock.advance(real_delta, |clock, timer_id, timer| {
            state.fire(clock, timer_id, timer)
        });
        report.tick = frame.tick;
        report.timers_fired = frame.fired;
        report.timers_failed = frame.failed;

        self.deliver_events();
        report
    }

    fn phase_pre_tick(&mut self, report: &mut AdvanceReport) {
        for command in self.commands.drain(self.clock.frame()) {
            match self.apply(&command) {
                Ok(()) => report.commands_applied += 1,
                Err(err) => {
                    debug!(?command, %err, "command rejected");
                    report.command_errors.push((command, err));
                }
            }
        }
    }

    fn apply(&mut self, command: &Command) -> Result<(), FarmError> {
        match command {
            Command::Place { item, cell } => self.place(item, *cell).map(drop)?,
            Command::PlaceSelected { cell } => self.place_selected(*cell).map(drop)?,
            Command::Collect { item } => self.collect(*item).map(drop)?,
            Command::Remove { item } => self.remove(*item)?,
            Command::SelectItem { item } => self.set_selected_item(item)?,
            Command::SetPaused(paused) => self.set_paused(*paused),
            Command::SpeedUp => self.speed_up(),
        }
        Ok(())
    }

    /// Deliver buffered events; commands from reactive handlers wait for the
    /// next frame.
    fn deliver_events(&mut self) {
        self.state.events.deliver();
        self.commands.push_batch(self.state.events.drain_commands());
    }

    /// Queue a command for the start of the next frame.
    pub fn submit(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.pending_count()
    }

    pub fn command_history(&self) -> &[(u64, Command)] {
        self.commands.history()
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Buy and place `name` at `cell`.
    ///
    /// Every check runs before anything is mutated: definition, cell,
    /// affordability, enclosure room. The cell is marked only after the
    /// item has paid and started.
    pub fn place(&mut self, name: &str, cell: GridPosition) -> Result<ItemId, PlacementError> {
        let result = self.try_place(name, cell);
        match &result {
            Ok(id) => {
                info!(item = name, %cell, ?id, "item placed");
                self.state.presenter.play_cue(SoundCue::Place);
            }
            Err(err) => debug!(item = name, %cell, %err, "placement rejected"),
        }
        self.deliver_events();
        result
    }

    fn try_place(&mut self, name: &str, cell: GridPosition) -> Result<ItemId, PlacementError> {
        let (kind, def) = self.state.registry.lookup(name)?;
        let def = Arc::clone(def);
        if !def.enabled {
            return Err(PlacementError::Disabled(name.to_string()));
        }
        self.state.grid.check_cell(cell)?;
        self.state.ledger.check_afford(&def)?;
        if self.state.enforce_enclosures && def.fence_required {
            let (capacity, used) = self.state.enclosure_room();
            if used >= capacity {
                return Err(PlacementError::EnclosureFull { capacity });
            }
        }

        let id = self
            .state
            .items
            .insert_with_key(|id| ItemInstance::new(id, kind, def, cell));
        let activated = self
            .state
            .with_item(&mut self.clock, id, |item, ctx| item.activate(ctx));
        if let Some(Err(err)) = activated {
            self.state.items.remove(id);
            return Err(err.into());
        }

        if let Err(err) = self.state.grid.occupy(id, cell) {
            // Unreachable after `check_cell`; undo the activation.
            warn!(%err, "cell taken during placement");
            self.state.with_item(&mut self.clock, id, |item, ctx| {
                item.dispose(RemovalReason::Removed, ctx)
            });
            return Err(err.into());
        }
        self.state.events.emit(Event::ItemPlaced {
            item: id,
            kind,
            cell,
        });
        Ok(id)
    }

    /// Place the build-menu selection at `cell`.
    pub fn place_selected(&mut self, cell: GridPosition) -> Result<ItemId, PlacementError> {
        let Some(kind) = self.state.selected else {
            return Err(PlacementError::NothingSelected);
        };
        let name = match self.state.registry.get(kind) {
            Some(def) => def.name.clone(),
            None => return Err(PlacementError::NothingSelected),
        };
        self.place(&name, cell)
    }

    /// Change the build-menu selection. Only enabled items can be selected.
    pub fn set_selected_item(&mut self, name: &str) -> Result<(), PlacementError> {
        self.select(name)?;
        self.state.presenter.play_cue(SoundCue::Click);
        Ok(())
    }

    fn select(&mut self, name: &str) -> Result<(), PlacementError> {
        let (kind, def) = self.state.registry.lookup(name)?;
        if !def.enabled {
            return Err(PlacementError::Disabled(name.to_string()));
        }
        self.state.selected = Some(kind);
        Ok(())
    }

    pub fn selected_item(&self) -> Option<&str> {
        self.state
            .selected
            .and_then(|kind| self.state.registry.get(kind))
            .map(|def| def.name.as_str())
    }

    // -----------------------------------------------------------------------
    // Item actions
    // -----------------------------------------------------------------------

    /// Collect the pending yield of `item`. Returns what was collected,
    /// empty if nothing was pending.
    pub fn collect(&mut self, item: ItemId) -> Result<Vec<ResourceAmount>, FarmError> {
        let collected = self
            .state
            .with_item(&mut self.clock, item, |i, ctx| i.collect(ctx))
            .ok_or(FarmError::UnknownItem(item))?;
        if !collected.is_empty() {
            self.state.presenter.play_cue(SoundCue::Collect);
        }
        self.deliver_events();
        Ok(collected)
    }

    /// Remove `item` from the farm without refund.
    pub fn remove(&mut self, item: ItemId) -> Result<(), FarmError> {
        self.state
            .with_item(&mut self.clock, item, |i, ctx| {
                i.dispose(RemovalReason::Removed, ctx)
            })
            .ok_or(FarmError::UnknownItem(item))?;
        self.deliver_events();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Time control
    // -----------------------------------------------------------------------

    pub fn set_paused(&mut self, paused: bool) {
        self.clock.set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Fast-forward through one cycle.
    pub fn speed_up(&mut self) {
        self.clock.speed_up();
    }

    pub fn phase(&self) -> f64 {
        self.clock.phase()
    }

    pub fn daylight(&self) -> DaylightSample {
        daylight::sample(self.clock.phase())
    }

    pub fn subscribe_frame(&mut self, observer: FrameObserver) -> ObserverId {
        self.clock.subscribe(observer)
    }

    pub fn unsubscribe_frame(&mut self, id: ObserverId) -> bool {
        self.clock.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) -> SubscriptionId {
        self.state.events.on_passive(kind, listener)
    }

    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) -> SubscriptionId {
        self.state.events.on_reactive(kind, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.state.events.unsubscribe(id)
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.state.events.suppress(kind);
    }

    pub fn events(&self) -> &EventBus {
        &self.state.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.state.events
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn clock(&self) -> &Clock<FarmTimer> {
        &self.clock
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.state.ledger
    }

    pub fn balance(&self, kind: ResourceKind) -> u32 {
        self.state.ledger.balance(kind)
    }

    pub fn progress(&self) -> f64 {
        self.state.ledger.progress()
    }

    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    pub fn grid(&self) -> &PlacementGrid {
        &self.state.grid
    }

    pub fn is_cell_free(&self, cell: GridPosition) -> bool {
        self.state.grid.is_cell_free(cell)
    }

    pub fn free_cells(&self) -> Vec<GridPosition> {
        self.state.grid.free_cells()
    }

    /// A live item. Disposed items are gone.
    pub fn item(&self, id: ItemId) -> Option<&ItemInstance> {
        self.state.items.get(id)
    }

    pub fn item_at(&self, cell: GridPosition) -> Option<&ItemInstance> {
        self.state.grid.item_at(cell).and_then(|id| self.item(id))
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemInstance> + '_ {
        self.state.items.values()
    }

    pub fn item_count(&self) -> usize {
        self.state.items.len()
    }

    /// Hash of time, balances and every item in cell order.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_fixed64(self.clock.elapsed());
        h.write_u64(self.clock.frame());
        for (_, amount) in self.state.ledger.balances().iter() {
            h.write_u32(amount);
        }
        for (cell, id) in self.state.grid.iter() {
            let Some(item) = self.state.items.get(id) else {
                continue;
            };
            h.write_i32(cell.x);
            h.write_i32(cell.y);
            h.write_u32(item.kind().0);
            h.write_u64(item.stage() as u64);
            h.write_bool(item.is_alive());
            for pending in item.pending_yield() {
                h.write_u32(pending.resource as u32);
                h.write_u32(pending.amount);
            }
        }
        h.finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
