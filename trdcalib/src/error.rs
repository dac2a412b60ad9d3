//! Error types for the calibration engine.

use thiserror::Error;

/// Errors that stop a calibration cycle before any accumulation happens.
///
/// Per-track propagation problems are not errors at this level: they only
/// end the pass of the affected track.
#[derive(Debug, Error)]
pub enum CalibError {
    /// A configuration value makes propagation impossible.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A correction table required by the configuration was not supplied.
    #[error("missing correction table: {0}")]
    MissingCorrection(&'static str),

    /// The input bundle violates an indexing invariant.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The worker pool could not be created.
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl CalibError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}

/// Result type for calibration operations.
pub type Result<T> = std::result::Result<T, CalibError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert!(CalibError::invalid_config("max_step must be positive")
            .to_string()
            .contains("invalid configuration"));
        assert!(CalibError::MissingCorrection("noise map")
            .to_string()
            .contains("noise map"));
    }
}
