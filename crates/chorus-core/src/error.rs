use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChorusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identity '{id}': {reason}")]
    InvalidIdentity { id: String, reason: String },
}

impl ChorusError {
    /// Short error code string used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            ChorusError::Config(_) => "CONFIG_ERROR",
            ChorusError::InvalidIdentity { .. } => "INVALID_IDENTITY",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChorusError>;
