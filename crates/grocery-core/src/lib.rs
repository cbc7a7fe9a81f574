pub mod app_config;
pub mod config;
pub mod products;
pub mod search;
pub mod stores;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{Product, StoreId, UnknownStore, PRICE_SENTINEL};
pub use search::{
    AggregateResult, PaginationTarget, SearchRequest, SourceResult, StoreBreakdown,
    StoreSelection,
};
pub use stores::{load_stores, load_stores_or_default, StoreSettings, StoresFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),

    #[error("failed to read stores file {path}: {source}")]
    StoresFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse stores file: {0}")]
    StoresFileParse(#[from] serde_yaml::Error),
}
