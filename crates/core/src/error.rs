use std::path::Path;

use thiserror::Error;

use crate::process::ToolError;

const REDACTED_PATH: &str = "<workspace>";

#[derive(Error, Debug)]
pub enum ClipsightError {
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Source unavailable for {source_label}: {reason}")]
    SourceUnavailable { source_label: String, reason: String },

    #[error("Frame extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClipsightError>;

impl ClipsightError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn source_unavailable(source_label: impl Into<String>, cause: &ToolError) -> Self {
        Self::SourceUnavailable {
            source_label: source_label.into(),
            reason: cause.to_string(),
        }
    }

    pub fn extraction_failed(cause: &ToolError) -> Self {
        Self::ExtractionFailed {
            reason: cause.to_string(),
        }
    }

    /// `true` when the caller sent something unusable; everything else is on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. })
    }

    /// Strips every mention of `workspace` from the message so scratch paths
    /// never reach the caller.
    pub fn redact_path(self, workspace: &Path) -> Self {
        let needle = workspace.to_string_lossy().into_owned();
        if needle.is_empty() {
            return self;
        }
        let scrub = |text: String| text.replace(&needle, REDACTED_PATH);

        match self {
            Self::InvalidRequest { reason } => Self::InvalidRequest {
                reason: scrub(reason),
            },
            Self::SourceUnavailable {
                source_label,
                reason,
            } => Self::SourceUnavailable {
                source_label,
                reason: scrub(reason),
            },
            Self::ExtractionFailed { reason } => Self::ExtractionFailed {
                reason: scrub(reason),
            },
            Self::IoError(e) => {
                Self::IoError(std::io::Error::new(e.kind(), scrub(e.to_string())))
            }
            other => other,
        }
    }
}
