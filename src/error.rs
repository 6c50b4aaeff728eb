//! Error types shared by the study models.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = StudyError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("not enough content to generate flashcards ({len} characters, need at least {min})")]
    InsufficientContent { len: usize, min: usize },

    #[error("could not generate flashcards from this content")]
    NoCardsGenerated,

    #[error("failed to extract text from {path:?}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid timer duration {minutes}m {seconds}s")]
    InvalidDuration { minutes: u32, seconds: u32 },

    #[error("chunk count must be at least 1 (got {0})")]
    InvalidChunkCount(usize),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StudyError {
    pub(crate) fn extraction(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Validation errors are reported to the user; everything else is logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InsufficientContent { .. }
                | Self::NoCardsGenerated
                | Self::InvalidDuration { .. }
                | Self::InvalidChunkCount(_)
                | Self::UnsupportedFormat(_)
                | Self::Extraction { .. }
        )
    }
}
