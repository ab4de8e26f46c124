use thiserror::Error;

use crate::core::catalog::CatalogError;
use crate::engine::analysis::AnalysisError;
use crate::engine::config::{ConfigError, SnapshotError};
use crate::engine::protocol::ProtocolError;
use crate::engine::scheduler::SchedulerError;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Parameter snapshot error: {source}")]
    Snapshot {
        #[from]
        source: SnapshotError,
    },

    #[error("Catalog error: {source}")]
    Catalog {
        #[from]
        source: CatalogError,
    },

    #[error("Protocol encoding failed: {source}")]
    Protocol {
        #[from]
        source: ProtocolError,
    },

    #[error("Scheduler error: {source}")]
    Scheduler {
        #[from]
        source: SchedulerError,
    },

    #[error("Analysis error: {source}")]
    Analysis {
        #[from]
        source: AnalysisError,
    },

    #[error(
        "No simulation index for solute '{solute}': pass one explicitly or enable auto-detection"
    )]
    UndeterminedIndex { solute: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
