//! Loading pipeline: reads data files, checks names, builds the registry and
//! farm configuration.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus the high-level [`load_farm_data`] entry
//! point used by the presentation shell.

use crate::schema::ItemData;
use homestead_core::config::{ConfigError, FarmConfig};
use homestead_core::farm::{Farm, FarmError};
use homestead_core::id::ItemKindId;
use homestead_core::presenter::Presenter;
use homestead_core::registry::{Registry, RegistryBuilder, RegistryError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Base name of the item catalog file.
pub const ITEMS_FILE: &str = "items";
/// Base name of the optional farm configuration file.
pub const FARM_FILE: &str = "farm";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A definition parsed but holds values the registry rejects.
    #[error("invalid catalog {file}: {source}")]
    Registry {
        file: PathBuf,
        #[source]
        source: RegistryError,
    },

    /// The farm configuration parsed but failed validation.
    #[error("invalid farm config {file}: {source}")]
    Config {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, err: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: err.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// A loaded catalog and configuration, ready to start a farm.
#[derive(Debug, Clone)]
pub struct FarmData {
    pub config: FarmConfig,
    pub registry: Registry,
}

impl FarmData {
    pub fn into_farm(self) -> Result<Farm, FarmError> {
        Farm::new(self.config, self.registry)
    }

    pub fn into_farm_with_presenter(self, presenter: Box<dyn Presenter>) -> Result<Farm, FarmError> {
        Farm::with_presenter(self.config, self.registry, presenter)
    }
}

/// Build a registry from an item catalog file.
pub fn load_registry(path: &Path) -> Result<Registry, DataLoadError> {
    let items: Vec<ItemData> = deserialize_list(path, "items")?;

    let mut seen: HashMap<String, ItemKindId> = HashMap::with_capacity(items.len());
    let mut builder = RegistryBuilder::new();
    for item in items {
        check_duplicate(&seen, &item.name, path)?;
        let name = item.name.clone();
        let id = builder.register(item.into_definition());
        seen.insert(name, id);
    }

    let registry = builder.build().map_err(|source| DataLoadError::Registry {
        file: path.to_path_buf(),
        source,
    })?;
    debug!(file = %path.display(), items = registry.len(), "item catalog loaded");
    Ok(registry)
}

/// Read and validate a farm configuration file.
pub fn load_config(path: &Path) -> Result<FarmConfig, DataLoadError> {
    let config: FarmConfig = deserialize_file(path)?;
    config.validate().map_err(|source| DataLoadError::Config {
        file: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

/// Load `items.*` (required) and `farm.*` (optional) from `dir`.
///
/// A missing farm file yields the default configuration. A selected item in
/// the configuration must name a catalog entry.
pub fn load_farm_data(dir: &Path) -> Result<FarmData, DataLoadError> {
    let items_path = require_data_file(dir, ITEMS_FILE)?;
    let registry = load_registry(&items_path)?;

    let config = match find_data_file(dir, FARM_FILE)? {
        Some(path) => {
            let config = load_config(&path)?;
            if let Some(selected) = &config.selected_item {
                let names: HashMap<String, ItemKindId> = registry
                    .iter()
                    .map(|(id, def)| (def.name.clone(), id))
                    .collect();
                resolve_name(&names, selected, &path, "item")?;
            }
            config
        }
        None => FarmConfig::default(),
    };

    info!(dir = %dir.display(), items = registry.len(), "farm data loaded");
    Ok(FarmData { config, registry })
}

/// Directory holding the shipped data set.
pub fn default_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

/// Load the shipped data set.
pub fn load_default() -> Result<FarmData, DataLoadError> {
    load_farm_data(&default_data_dir())
}

// ===========================================================================
// Tests
// ===========================================================================
