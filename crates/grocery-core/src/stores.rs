use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::products::StoreId;
use crate::search::PaginationTarget;
use crate::ConfigError;

/// Per-source settings from `config/stores.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub id: StoreId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Site or API origin. Unused by the local catalog source.
    #[serde(default)]
    pub base_url: String,
    /// Pagination applied when a request does not specify its own.
    #[serde(default)]
    pub pagination: Option<PaginationTarget>,
    /// Items requested per API call (REST sources only).
    #[serde(default)]
    pub page_size: Option<u32>,
    /// ALDI store the price list is taken from.
    #[serde(default)]
    pub service_point: Option<String>,
    /// Merged catalog file for the local catalog source.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

impl StoreSettings {
    /// Built-in settings for a source, used when the stores file omits it.
    #[must_use]
    pub fn builtin(id: StoreId) -> Self {
        let base = Self {
            id,
            enabled: true,
            base_url: String::new(),
            pagination: None,
            page_size: None,
            service_point: None,
            catalog_path: None,
        };
        match id {
            StoreId::Woolworths => Self {
                base_url: "https://www.woolworths.com.au".to_string(),
                pagination: Some(PaginationTarget::Results(30)),
                ..base
            },
            StoreId::Coles => Self {
                pagination: Some(PaginationTarget::Results(30)),
                catalog_path: Some(PathBuf::from("./generated/coles_merged_products.json")),
                ..base
            },
            StoreId::Iga => Self {
                base_url: "https://www.igashop.com.au".to_string(),
                pagination: Some(PaginationTarget::Pages(3)),
                ..base
            },
            StoreId::Harris => Self {
                base_url: "https://www.harrisfarm.com.au".to_string(),
                pagination: Some(PaginationTarget::Pages(2)),
                ..base
            },
            StoreId::Aldi => Self {
                base_url: "https://api.aldi.com.au".to_string(),
                pagination: Some(PaginationTarget::Results(30)),
                page_size: Some(30),
                service_point: Some("G452".to_string()),
                ..base
            },
        }
    }

    #[must_use]
    pub fn default_pagination(&self) -> PaginationTarget {
        self.pagination.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoresFile {
    pub stores: Vec<StoreSettings>,
}

impl Default for StoresFile {
    fn default() -> Self {
        Self {
            stores: StoreId::ALL.into_iter().map(StoreSettings::builtin).collect(),
        }
    }
}

impl StoresFile {
    /// Settings for `id`, falling back to the built-in entry when absent.
    #[must_use]
    pub fn settings(&self, id: StoreId) -> StoreSettings {
        self.stores
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .unwrap_or_else(|| StoreSettings::builtin(id))
    }

    /// Sources that are not switched off, in canonical order.
    #[must_use]
    pub fn enabled(&self) -> Vec<StoreSettings> {
        StoreId::ALL
            .into_iter()
            .map(|id| self.settings(id))
            .filter(|s| s.enabled)
            .collect()
    }
}

/// Load and validate the stores configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_stores(path: &Path) -> Result<StoresFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::StoresFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let stores_file: StoresFile =
        serde_yaml::from_str(&content).map_err(ConfigError::StoresFileParse)?;

    validate_stores(&stores_file)?;

    Ok(stores_file)
}

/// Like [`load_stores`], but a missing file yields the built-in defaults.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but is unreadable or invalid.
pub fn load_stores_or_default(path: &Path) -> Result<StoresFile, ConfigError> {
    if path.exists() {
        load_stores(path)
    } else {
        Ok(StoresFile::default())
    }
}

fn validate_stores(stores_file: &StoresFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for store in &stores_file.stores {
        if !seen.insert(store.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate store entry: '{}'",
                store.id
            )));
        }

        if store.id == StoreId::Coles {
            if store.catalog_path.is_none() {
                return Err(ConfigError::Validation(
                    "store 'coles' requires a catalog_path".to_string(),
                ));
            }
        } else if !(store.base_url.starts_with("http://") || store.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "store '{}' has invalid base_url '{}'",
                store.id, store.base_url
            )));
        }

        if store.page_size == Some(0) {
            return Err(ConfigError::Validation(format!(
                "store '{}' has page_size 0",
                store.id
            )));
        }

        match store.pagination {
            Some(PaginationTarget::Pages(0) | PaginationTarget::Results(0)) => {
                return Err(ConfigError::Validation(format!(
                    "store '{}' has a zero pagination limit",
                    store.id
                )));
            }
            _ => {}
        }
    }

    Ok(())
}
