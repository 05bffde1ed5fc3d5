//! Ledger-level scenarios across the whole farm: placement rejections that
//! leave no trace, the egg goal, running out of money and enclosure capacity.

use homestead_core::command_queue::Command;
use homestead_core::config::FarmConfig;
use homestead_core::event::{Event, EventKind};
use homestead_core::farm::{Farm, PlacementError};
use homestead_core::grid::GridError;
use homestead_core::ledger::LedgerError;
use homestead_core::registry::RegistryError;
use homestead_core::resource::{ResourceAmount, ResourceKind};
use homestead_core::test_utils::*;

fn enclosure_farm(money: u32, corn: u32) -> Farm {
    let mut config = FarmConfig::default();
    config.enforce_enclosures = true;
    config.ledger.starting = vec![
        ResourceAmount::new(ResourceKind::Money, money),
        ResourceAmount::new(ResourceKind::Corn, corn),
    ];
    Farm::new(config, standard_registry()).unwrap()
}

// ===========================================================================
// Placement rejections
// ===========================================================================

#[test]
fn rejected_placements_change_nothing() {
    let mut farm = standard_farm();
    let log = record_events(&mut farm, &[EventKind::ResourcesChanged, EventKind::ItemPlaced]);
    let before = farm.state_hash();

    assert_eq!(
        farm.place("pumpkin", cell(0, 0)),
        Err(PlacementError::Registry(RegistryError::UnknownItemDefinition(
            "pumpkin".into()
        )))
    );
    assert_eq!(
        farm.place("grape", cell(0, 0)),
        Err(PlacementError::Disabled("grape".into()))
    );
    assert_eq!(
        farm.place("strawberry", cell(-1, 0)),
        Err(PlacementError::Grid(GridError::InvalidCell(cell(-1, 0))))
    );
    assert_eq!(
        farm.place("fence", cell(0, 0)),
        Err(PlacementError::Ledger(LedgerError::InsufficientResources {
            resource: ResourceKind::Money,
            required: 5,
            available: 3,
        }))
    );
    // Money suffices, but the first feeding does not.
    assert_eq!(
        farm.place("chicken", cell(0, 0)),
        Err(PlacementError::Ledger(LedgerError::InsufficientResources {
            resource: ResourceKind::Corn,
            required: 1,
            available: 0,
        }))
    );

    assert_eq!(farm.state_hash(), before);
    assert_eq!(farm.item_count(), 0);
    assert_eq!(farm.clock().pending_count(), 0);
    assert!(log.borrow().is_empty());
}

#[test]
fn occupied_cell_is_rejected() {
    let mut farm = standard_farm();
    farm.place("strawberry", cell(0, 0)).unwrap();
    assert_eq!(
        farm.place("strawberry", cell(0, 0)),
        Err(PlacementError::Grid(GridError::Occupied(cell(0, 0))))
    );
    assert_eq!(farm.balance(ResourceKind::Money), 2);
}

#[test]
fn free_cells_shrink_and_grow_back() {
    let mut farm = standard_farm();
    let total = farm.free_cells().len();
    assert_eq!(total, 46);

    let id = farm.place("strawberry", cell(1, 2)).unwrap();
    assert_eq!(farm.free_cells().len(), total - 1);
    assert!(!farm.free_cells().contains(&cell(1, 2)));

    farm.remove(id).unwrap();
    assert_eq!(farm.free_cells().len(), total);
}

#[test]
fn selected_item_places_where_clicked() {
    let mut farm = standard_farm();
    assert_eq!(
        farm.place_selected(cell(0, 0)),
        Err(PlacementError::NothingSelected)
    );
    assert_eq!(
        farm.set_selected_item("barn"),
        Err(PlacementError::Disabled("barn".into()))
    );
    assert_eq!(farm.selected_item(), None);

    farm.set_selected_item("strawberry").unwrap();
    let id = farm.place_selected(cell(0, 0)).unwrap();
    assert_eq!(farm.item(id).unwrap().definition().name, "strawberry");
    assert_eq!(farm.selected_item(), Some("strawberry"));
}

// ===========================================================================
// Goal
// ===========================================================================

#[test]
fn egg_goal_is_signalled_once() {
    let mut farm = farm_with_balances(&[(ResourceKind::Money, 8), (ResourceKind::Corn, 100)]);
    let goals = record_events(&mut farm, &[EventKind::GoalReached]);
    let chickens: Vec<_> = (0..4)
        .map(|x| farm.place("chicken", cell(x, 0)).unwrap())
        .collect();

    for _ in 0..20 {
        advance_cycles(&mut farm, 0.5);
        for &id in &chickens {
            farm.collect(id).unwrap();
        }
    }

    assert!(farm.balance(ResourceKind::Egg) >= 25);
    assert!(farm.ledger().goal_reached());
    assert_eq!(farm.progress(), 1.0);

    let goals = goals.borrow();
    assert_eq!(goals.len(), 1);
    assert!(matches!(
        goals[0],
        Event::GoalReached { resource: ResourceKind::Egg, balance } if balance >= 25
    ));
}

#[test]
fn progress_tracks_egg_balance() {
    let mut farm = farm_with_balances(&[(ResourceKind::Money, 2), (ResourceKind::Corn, 10)]);
    assert_eq!(farm.progress(), 0.0);
    let chicken = farm.place("chicken", cell(0, 0)).unwrap();
    advance_cycles(&mut farm, 2.5);
    farm.collect(chicken).unwrap();
    assert_eq!(farm.balance(ResourceKind::Egg), 5);
    assert!((farm.progress() - 0.2).abs() < 1e-12);
}

// ===========================================================================
// Depletion
// ===========================================================================

#[test]
fn spending_the_last_coin_on_a_producer_is_not_depletion() {
    let mut farm = farm_with_balances(&[(ResourceKind::Money, 1)]);
    let depleted = record_events(&mut farm, &[EventKind::MoneyDepleted]);

    let id = farm.place("strawberry", cell(0, 0)).unwrap();
    assert_eq!(farm.balance(ResourceKind::Money), 0);
    assert!(depleted.borrow().is_empty());

    // The only producer leaves before paying out.
    farm.remove(id).unwrap();
    assert_eq!(depleted.borrow().len(), 1);
    assert!(farm.ledger().is_depleted());

    advance_cycles(&mut farm, 3.0);
    assert_eq!(depleted.borrow().len(), 1);
}

#[test]
fn buying_a_non_producer_with_the_last_coins_depletes() {
    let mut farm = farm_with_balances(&[(ResourceKind::Money, 2)]);
    let depleted = record_events(&mut farm, &[EventKind::MoneyDepleted]);

    farm.place("corn", cell(0, 0)).unwrap();
    assert_eq!(depleted.borrow().len(), 1);
    assert_eq!(depleted.borrow()[0], Event::MoneyDepleted);

    // Harvesting corn brings no money, so the episode continues silently.
    advance_cycles(&mut farm, 2.0);
    let id = farm.item_at(cell(0, 0)).unwrap().id();
    farm.collect(id).unwrap();
    assert_eq!(depleted.borrow().len(), 1);
    assert!(farm.ledger().is_depleted());
}

#[test]
fn harvest_that_refills_the_wallet_is_not_depletion() {
    let mut farm = farm_with_balances(&[(ResourceKind::Money, 1)]);
    let depleted = record_events(&mut farm, &[EventKind::MoneyDepleted]);
    let id = farm.place("strawberry", cell(0, 0)).unwrap();
    advance_cycles(&mut farm, 2.0);

    // Earned before the producer is released.
    farm.collect(id).unwrap();
    assert_eq!(farm.balance(ResourceKind::Money), 3);
    assert_eq!(farm.ledger().money_producers(), 0);
    assert!(depleted.borrow().is_empty());
}

// ===========================================================================
// Enclosures
// ===========================================================================

#[test]
fn chickens_need_fence_capacity_when_enforced() {
    let mut farm = enclosure_farm(20, 10);
    assert_eq!(
        farm.place("chicken", cell(0, 0)),
        Err(PlacementError::EnclosureFull { capacity: 0 })
    );

    let fence = farm.place("fence", cell(-5, 0)).unwrap();
    for (x, y) in [(0, -1), (1, -1), (2, -1), (3, -1), (3, 0)] {
        farm.place("chicken", cell(x, y)).unwrap();
    }
    assert_eq!(
        farm.place("chicken", cell(0, 2)),
        Err(PlacementError::EnclosureFull { capacity: 5 })
    );
    assert_eq!(farm.balance(ResourceKind::Money), 5);

    // Existing animals stay when the fence goes; new ones cannot come.
    farm.remove(fence).unwrap();
    assert_eq!(farm.item_count(), 5);
    assert_eq!(
        farm.place("chicken", cell(0, 2)),
        Err(PlacementError::EnclosureFull { capacity: 0 })
    );
}

#[test]
fn enclosures_are_ignored_by_default() {
    let mut farm = farm_with_balances(&[(ResourceKind::Money, 4), (ResourceKind::Corn, 4)]);
    farm.place("chicken", cell(0, 0)).unwrap();
    farm.place("chicken", cell(1, 0)).unwrap();
    assert_eq!(farm.item_count(), 2);
}

// ===========================================================================
// Commands
// ===========================================================================

#[test]
fn queued_placements_apply_on_next_frame() {
    let mut farm = standard_farm();
    farm.submit(Command::Place {
        item: "strawberry".into(),
        cell: cell(0, 0),
    });
    farm.submit(Command::Place {
        item: "strawberry".into(),
        cell: cell(0, 0),
    });
    assert_eq!(farm.item_count(), 0);

    let report = farm.advance(FRAME);
    assert_eq!(report.commands_applied, 1);
    assert_eq!(report.command_errors.len(), 1);
    assert!(matches!(
        &report.command_errors[0].0,
        Command::Place { item, .. } if item == "strawberry"
    ));
    assert_eq!(farm.item_count(), 1);
    assert_eq!(farm.balance(ResourceKind::Money), 2);
}
