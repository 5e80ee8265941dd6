use thiserror::Error;

use larder_products::BomError;

/// Failure of a planning engine.
///
/// Insufficient data is not an error: engines degrade to empty or zero
/// results instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanningError {
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error("recipe expansion failed: {0}")]
    Bom(#[from] BomError),
}

impl PlanningError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
