//! Outbound seam to the presentation shell.
//!
//! The farm tells a [`Presenter`] when something should appear, change or go
//! away. All methods default to no-ops, so a shell only overrides what it
//! renders.

use crate::grid::GridPosition;
use crate::id::ItemId;
use crate::registry::ModelRef;
use crate::resource::ResourceKind;

/// Opaque handle to a visual created by the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

/// Short fire-and-forget sound effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCue {
    Place,
    Collect,
    Click,
}

pub trait Presenter: std::fmt::Debug {
    /// Instantiate the model for a newly placed item.
    fn spawn_model(
        &mut self,
        item: ItemId,
        model: &ModelRef,
        cell: GridPosition,
    ) -> Option<VisualHandle> {
        let _ = (item, model, cell);
        None
    }

    /// Replace an item's model after a growth stage change.
    fn swap_model(
        &mut self,
        item: ItemId,
        previous: Option<VisualHandle>,
        model: &ModelRef,
    ) -> Option<VisualHandle> {
        let _ = (item, model);
        previous
    }

    /// Remove an item's model and play the disposal effect at its cell.
    fn despawn(&mut self, item: ItemId, visual: Option<VisualHandle>, cell: GridPosition) {
        let _ = (item, visual, cell);
    }

    /// Show or update the pending-yield indicator. `total` is the amount now
    /// waiting for collection.
    fn show_yield(&mut self, item: ItemId, resource: ResourceKind, total: u32) {
        let _ = (item, resource, total);
    }

    /// Hide the pending-yield indicator after collection.
    fn hide_yield(&mut self, item: ItemId) {
        let _ = item;
    }

    fn play_cue(&mut self, cue: SoundCue) {
        let _ = cue;
    }
}

/// A presenter that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}
