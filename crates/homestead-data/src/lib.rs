//! Data-driven loading for Homestead.
//!
//! Reads the item catalog (`items.{ron,toml,json}`) and the optional farm
//! configuration (`farm.{ron,toml,json}`) from a directory and turns them
//! into a [`Registry`](homestead_core::registry::Registry) and
//! [`FarmConfig`](homestead_core::config::FarmConfig). The shipped data set
//! lives in this crate's `data/` directory.

pub mod loader;
pub mod schema;

pub use loader::{load_default, load_farm_data, load_registry, DataLoadError, FarmData};
