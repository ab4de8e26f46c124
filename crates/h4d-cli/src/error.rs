use h4d::core::catalog::CatalogError;
use h4d::engine::config::{ConfigError, SnapshotError};
use h4d::engine::error::CampaignError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Campaign(#[from] CampaignError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parameter snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
