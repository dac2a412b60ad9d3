//! Error types for track propagation and update.

use thiserror::Error;

/// Reasons why a track could not be brought to a target or updated.
///
/// All of them are local to one track: the caller stops processing that
/// track and continues with the next one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationError {
    /// The helix does not reach the requested x.
    #[error("track does not reach x = {x:.3}")]
    NotReachable {
        /// Target x in cm.
        x: f64,
    },

    /// |snp| reached the configured limit during propagation.
    #[error("|snp| = {snp:.4} exceeds the limit {max_snp:.4}")]
    SnpLimit {
        /// Current sine of the local crossing angle.
        snp: f64,
        /// Configured limit.
        max_snp: f64,
    },

    /// Rotation into another local frame is not possible for this direction.
    #[error("cannot rotate track to alpha = {alpha:.4}")]
    Rotation {
        /// Requested frame angle.
        alpha: f64,
    },

    /// The particle lost too much energy in the material.
    #[error("material correction failed: {0}")]
    Material(String),

    /// The measurement update produced a singular or unphysical state.
    #[error("measurement update failed: {0}")]
    Update(String),

    /// A track refers to a tracklet that is not part of the current input.
    #[error("tracklet {index} is not part of the input")]
    UnknownTracklet { index: usize },

    /// The requested layer does not exist.
    #[error("layer {layer} is out of range")]
    InvalidLayer { layer: usize },
}

impl PropagationError {
    pub fn material(reason: impl Into<String>) -> Self {
        Self::Material(reason.into())
    }

    pub fn update(reason: impl Into<String>) -> Self {
        Self::Update(reason.into())
    }
}

/// Result type for propagation operations.
pub type Result<T> = std::result::Result<T, PropagationError>;
