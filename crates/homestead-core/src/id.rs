use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a pending one-shot event on the [`Clock`](crate::clock::Clock).
    pub struct TimerId;

    /// Identifies a per-frame observer registered on the clock.
    pub struct ObserverId;

    /// Identifies a placed item instance on the farm.
    pub struct ItemId;

    /// Identifies an event bus subscription.
    pub struct SubscriptionId;
}

/// Identifies an item definition in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKindId(pub u32);
