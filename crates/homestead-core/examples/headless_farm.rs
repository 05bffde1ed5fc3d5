//! Headless farm example: a strawberry patch and a chicken coop, run for ten
//! day/night cycles with no renderer.
//!
//! A reactive handler collects every yield the frame after it appears. Eggs
//! are counted toward the goal; corn bought up front keeps the chickens fed
//! for a while, then they starve.
//!
//! Run with: `cargo run -p homestead-core --example headless_farm`

use homestead_core::command_queue::Command;
use homestead_core::config::FarmConfig;
use homestead_core::event::{Event, EventKind};
use homestead_core::farm::Farm;
use homestead_core::grid::GridPosition;
use homestead_core::resource::{ResourceAmount, ResourceKind};
use homestead_core::test_utils::standard_registry;

fn main() {
    // --- Step 1: Configure the farm ---

    let mut config = FarmConfig::default();
    config.ledger.starting = vec![
        ResourceAmount::new(ResourceKind::Money, 10),
        ResourceAmount::new(ResourceKind::Corn, 12),
    ];
    let mut farm = Farm::new(config, standard_registry()).expect("default config is valid");

    // --- Step 2: Wire up signals ---

    farm.on_reactive(
        EventKind::YieldPosted,
        Box::new(|event| match event {
            Event::YieldPosted { item, .. } => vec![Command::Collect { item: *item }],
            _ => Vec::new(),
        }),
    );
    farm.on_passive(
        EventKind::ItemRemoved,
        Box::new(|event| {
            if let Event::ItemRemoved { cell, reason, .. } = event {
                println!("  item at {cell} left the farm: {reason:?}");
            }
        }),
    );
    farm.on_passive(
        EventKind::GoalReached,
        Box::new(|event| println!("  goal reached: {event:?}")),
    );

    // --- Step 3: Plant and buy animals ---

    for x in 0..4 {
        farm.place("strawberry", GridPosition::new(x, 2))
            .expect("strawberry fits");
    }
    for x in 0..3 {
        farm.place("chicken", GridPosition::new(x, -1))
            .expect("chicken fits");
    }

    // --- Step 4: Run ten cycles in 1/64 s frames ---

    let frame = 1.0 / 64.0;
    let frames_per_cycle = (farm.clock().config().cycle_duration / frame) as u32;
    for cycle in 1..=10 {
        for _ in 0..frames_per_cycle {
            farm.advance(frame);
        }
        println!(
            "cycle {cycle:2}: money {:3} corn {:3} eggs {:3} items {} progress {:.0}%",
            farm.balance(ResourceKind::Money),
            farm.balance(ResourceKind::Corn),
            farm.balance(ResourceKind::Egg),
            farm.item_count(),
            farm.progress() * 100.0,
        );
    }
}
