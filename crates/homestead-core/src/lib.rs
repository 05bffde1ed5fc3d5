//! Homestead Core -- the simulation layer of a small real-time farm.
//!
//! A virtual clock drives a day/night cycle. Placed items grow through
//! stages, periodically produce yields that wait to be collected, and
//! periodically consume resources from a shared ledger; an item whose need
//! cannot be met starves and leaves the farm.
//!
//! # Frame Pipeline
//!
//! The presentation shell calls [`farm::Farm::advance`] once per rendered
//! frame with the real delta time:
//!
//! 1. **Pre-tick** -- apply queued [`command_queue::Command`]s.
//! 2. **Clock** -- convert the delta to virtual time and fire due timers in
//!    registration order. Timers scheduled during the pass wait for the next.
//! 3. **Reap** -- disposed items release their grid cells.
//! 4. **Deliver** -- buffered events reach subscribers.
//!
//! Per-frame observers run at the end of the clock step.
//!
//! # Key Types
//!
//! - [`farm::Farm`] -- Composition root and the shell's entry point.
//! - [`clock::Clock`] -- Virtual time, phase, pause, fast-forward, one-shot
//!   timers and frame observers.
//! - [`ledger::ResourceLedger`] -- Balances with edge-triggered goal and
//!   depletion signals.
//! - [`registry::Registry`] -- Immutable item definition table.
//! - [`item::ItemInstance`] -- Growth, yield and need state machine of one
//!   placed item.
//! - [`grid::PlacementGrid`] -- Cell occupancy.
//! - [`event::EventBus`] -- Buffered, typed signals with passive and
//!   reactive subscribers.
//! - [`presenter::Presenter`] -- Outbound seam to rendering and audio.
//! - [`fixed::SimTime`] -- Q32.32 fixed-point virtual time.

pub mod clock;
pub mod command_queue;
pub mod config;
pub mod daylight;
pub mod event;
pub mod farm;
pub mod fixed;
pub mod grid;
pub mod id;
pub mod item;
pub mod ledger;
pub mod presenter;
pub mod registry;
pub mod resource;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
