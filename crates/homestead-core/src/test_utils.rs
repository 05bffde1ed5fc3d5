//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::FarmConfig;
use crate::event::{Event, EventKind};
use crate::farm::Farm;
use crate::grid::GridPosition;
use crate::id::ItemId;
use crate::presenter::{Presenter, SoundCue, VisualHandle};
use crate::registry::{Category, ItemDefinition, ModelRef, Registry, RegistryBuilder};
use crate::resource::{ResourceAmount, ResourceKind};
use std::cell::RefCell;
use std::rc::Rc;

// ===========================================================================
// Timing
// ===========================================================================

/// A 1/64 s frame. Binary fractions keep virtual time sums exact.
pub const FRAME: f64 = 1.0 / 64.0;

/// Advance in whole frames until `secs` of real time have passed.
pub fn advance_secs(farm: &mut Farm, secs: f64) {
    let frames = (secs / FRAME).round() as u64;
    for _ in 0..frames {
        farm.advance(FRAME);
    }
}

/// Advance by `cycles` day/night cycles at normal speed.
pub fn advance_cycles(farm: &mut Farm, cycles: f64) {
    let secs = cycles * farm.clock().config().cycle_duration;
    advance_secs(farm, secs);
}

// ===========================================================================
// Catalog
// ===========================================================================

fn plant(name: &str, label: &str, cost: u32, harvest: ResourceAmount) -> ItemDefinition {
    ItemDefinition::new(name, cost, Category::Plant)
        .with_label(label)
        .with_model(format!("{name}_1"))
        .with_stage(&format!("{name}_1"), 1.0, None)
        .with_stage(&format!("{name}_2"), 1.0, None)
        .with_stage(&format!("{name}_3"), 1.0, Some(harvest))
}

fn animal(name: &str, label: &str, cost: u32) -> ItemDefinition {
    ItemDefinition::new(name, cost, Category::Animal)
        .with_label(label)
        .with_model(format!("{name}_1"))
        .with_animated(true)
}

/// The standard catalog, in build-menu order.
pub fn standard_definitions() -> Vec<ItemDefinition> {
    use ResourceKind::*;
    vec![
        plant("strawberry", "Strawberry", 1, ResourceAmount::new(Money, 3))
            .with_disappear_on_collect(true),
        plant("corn", "Corn", 2, ResourceAmount::new(Corn, 5)).with_disappear_on_collect(true),
        plant("grape", "Grape", 2, ResourceAmount::new(Grape, 5)).with_enabled(false),
        plant("tomato", "Tomato", 2, ResourceAmount::new(Tomato, 5)).with_enabled(false),
        animal("chicken", "Chicken", 2)
            .with_yield(Egg, 1, 0.5)
            .with_need(Corn, 1, 1.0)
            .with_fence_required(true),
        animal("cow", "Cow", 5).with_enabled(false),
        animal("sheep", "Sheep", 5).with_enabled(false),
        ItemDefinition::new("fence", 5, Category::Building)
            .with_label("Fence")
            .with_max_count_per(5),
        ItemDefinition::new("barn", 10, Category::Building)
            .with_label("Barn")
            .with_enabled(false),
    ]
}

pub fn standard_registry() -> Registry {
    let mut builder = RegistryBuilder::new();
    for def in standard_definitions() {
        builder.register(def);
    }
    builder.build().expect("standard catalog is valid")
}

/// A farm with default config and the standard catalog.
pub fn standard_farm() -> Farm {
    Farm::new(FarmConfig::default(), standard_registry()).expect("default config is valid")
}

/// A farm with the standard catalog and custom opening balances.
pub fn farm_with_balances(pairs: &[(ResourceKind, u32)]) -> Farm {
    let mut config = FarmConfig::default();
    config.ledger.starting = pairs
        .iter()
        .map(|&(kind, amount)| ResourceAmount::new(kind, amount))
        .collect();
    Farm::new(config, standard_registry()).expect("config is valid")
}

pub fn cell(x: i32, y: i32) -> GridPosition {
    GridPosition::new(x, y)
}

// ===========================================================================
// Recording
// ===========================================================================

/// Record every event of the given kinds, in delivery order.
pub fn record_events(farm: &mut Farm, kinds: &[EventKind]) -> Rc<RefCell<Vec<Event>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for &kind in kinds {
        let log = Rc::clone(&log);
        farm.on_passive(kind, Box::new(move |e| log.borrow_mut().push(e.clone())));
    }
    log
}

/// One call made to a [`RecordingPresenter`].
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterCall {
    Spawn { item: ItemId, model: ModelRef, cell: GridPosition },
    Swap { item: ItemId, model: ModelRef },
    Despawn { item: ItemId, cell: GridPosition },
    ShowYield { item: ItemId, resource: ResourceKind, total: u32 },
    HideYield { item: ItemId },
    Cue(SoundCue),
}

/// Presenter that logs every call into a shared vector.
#[derive(Debug, Default, Clone)]
pub struct RecordingPresenter {
    pub calls: Rc<RefCell<Vec<PresenterCall>>>,
    next_handle: u64,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> VisualHandle {
        self.next_handle += 1;
        VisualHandle(self.next_handle)
    }

    fn log(&self, call: PresenterCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl Presenter for RecordingPresenter {
    fn spawn_model(
        &mut self,
        item: ItemId,
        model: &ModelRef,
        cell: GridPosition,
    ) -> Option<VisualHandle> {
        self.log(PresenterCall::Spawn {
            item,
            model: model.clone(),
            cell,
        });
        Some(self.handle())
    }

    fn swap_model(
        &mut self,
        item: ItemId,
        _previous: Option<VisualHandle>,
        model: &ModelRef,
    ) -> Option<VisualHandle> {
        self.log(PresenterCall::Swap {
            item,
            model: model.clone(),
        });
        Some(self.handle())
    }

    fn despawn(&mut self, item: ItemId, _visual: Option<VisualHandle>, cell: GridPosition) {
        self.log(PresenterCall::Despawn { item, cell });
    }

    fn show_yield(&mut self, item: ItemId, resource: ResourceKind, total: u32) {
        self.log(PresenterCall::ShowYield {
            item,
            resource,
            total,
        });
    }

    fn hide_yield(&mut self, item: ItemId) {
        self.log(PresenterCall::HideYield { item });
    }

    fn play_cue(&mut self, cue: SoundCue) {
        self.log(PresenterCall::Cue(cue));
    }
}

/// A standard farm rendering into a [`RecordingPresenter`]; returns the
/// shared call log.
pub fn recording_farm() -> (Farm, Rc<RefCell<Vec<PresenterCall>>>) {
    let presenter = RecordingPresenter::new();
    let calls = Rc::clone(&presenter.calls);
    let farm = Farm::with_presenter(
        FarmConfig::default(),
        standard_registry(),
        Box::new(presenter),
    )
    .expect("default config is valid");
    (farm, calls)
}
