//! Domain error types.

use super::signal::SignalType;

/// Top-level error type for swingtrader.
#[derive(Debug, thiserror::Error)]
pub enum SwingtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("strategy error for {code}: {reason}")]
    Strategy { code: String, reason: String },

    /// Strategy contract violation: reported distinctly from recoverable
    /// runtime errors so a broken strategy is visible, not swallowed.
    #[error("position conflict for {code} {signal}: {reason}")]
    PositionConflict {
        code: String,
        signal: SignalType,
        reason: String,
    },

    #[error("snapshot error: {reason}")]
    Snapshot { reason: String },

    #[error("unsupported snapshot schema version {found} (supported: {supported})")]
    SnapshotVersion { found: u32, supported: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<&SwingtraderError> for std::process::ExitCode {
    fn from(err: &SwingtraderError) -> Self {
        let code: u8 = match err {
            SwingtraderError::Io(_) | SwingtraderError::Json(_) => 1,
            SwingtraderError::ConfigParse { .. }
            | SwingtraderError::ConfigMissing { .. }
            | SwingtraderError::ConfigInvalid { .. } => 2,
            SwingtraderError::Data { .. } => 3,
            SwingtraderError::Snapshot { .. } | SwingtraderError::SnapshotVersion { .. } => 4,
            SwingtraderError::Strategy { .. } | SwingtraderError::PositionConflict { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
