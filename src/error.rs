use thiserror::Error;

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("invalid viewport size: width={width}, height={height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A mandatory option field is missing or malformed.
    #[error("invalid option `{path}`: {reason}")]
    InvalidOption { path: String, reason: String },

    #[error("view type `{main_type}.{sub_type}` is not registered")]
    ViewNotRegistered { main_type: String, sub_type: String },

    #[error("coordinate system `{0}` is not registered")]
    CoordinateSystemNotRegistered(String),

    #[error("invalid action registration: {0}")]
    InvalidAction(String),

    /// Raised by a stage handler; aborts the running update cycle.
    #[error("stage handler `{handler}` failed: {reason}")]
    StageHandler { handler: String, reason: String },
}

impl ChartError {
    #[must_use]
    pub fn invalid_option(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn stage_handler(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StageHandler {
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}
