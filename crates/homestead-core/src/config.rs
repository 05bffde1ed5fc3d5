use crate::clock::{ClockConfig, ClockError};
use crate::grid::LayoutConfig;
use crate::ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

/// Everything needed to start a farm, apart from the item catalog.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    pub clock: ClockConfig,
    pub ledger: LedgerConfig,
    pub layout: LayoutConfig,
    /// Limit fence-required items to the capacity of placed enclosures.
    pub enforce_enclosures: bool,
    /// Ring buffer capacity per event kind.
    pub event_capacity: usize,
    /// Applied commands kept for debugging. 0 disables history.
    pub command_history: usize,
    /// Build-menu selection at start.
    pub selected_item: Option<String>,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            ledger: LedgerConfig::default(),
            layout: LayoutConfig::default(),
            enforce_enclosures: false,
            event_capacity: 1024,
            command_history: 0,
            selected_item: None,
        }
    }
}

impl FarmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.validate()?;
        if self.ledger.goal_threshold == 0 {
            return Err(ConfigError::ZeroGoalThreshold);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error("goal threshold must be at least 1")]
    ZeroGoalThreshold,
    #[error("event capacity must be at least 1")]
    ZeroEventCapacity,
}
