//! Refresh error types.

use std::fmt;

use crate::staging::StagingError;
use crate::store::StoreError;

/// Steps of a refresh cycle, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStage {
    Idle,
    CleaningOldFiles,
    Scraping,
    Staging,
    WipingDestination,
    Loading,
}

impl fmt::Display for RefreshStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshStage::Idle => "idle",
            RefreshStage::CleaningOldFiles => "cleaning old files",
            RefreshStage::Scraping => "scraping",
            RefreshStage::Staging => "staging",
            RefreshStage::WipingDestination => "wiping destination",
            RefreshStage::Loading => "loading",
        };
        f.write_str(name)
    }
}

/// The underlying failure of a stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that abandon a refresh cycle.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("a refresh cycle is already running")]
    AlreadyRunning,

    #[error("refresh failed while {stage}: {source}")]
    Failed {
        stage: RefreshStage,
        #[source]
        source: StageError,
    },
}

impl RefreshError {
    /// Attach a stage to a staging or store error.
    pub(crate) fn at<E: Into<StageError>>(stage: RefreshStage) -> impl FnOnce(E) -> Self {
        move |e| RefreshError::Failed {
            stage,
            source: e.into(),
        }
    }

    pub fn stage(&self) -> Option<RefreshStage> {
        match self {
            RefreshError::AlreadyRunning => None,
            RefreshError::Failed { stage, .. } => Some(*stage),
        }
    }
}
