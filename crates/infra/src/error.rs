//! Infrastructure and service error model.

use thiserror::Error;

use larder_core::DomainError;
use larder_inventory::UnitError;
use larder_planning::PlanningError;
use larder_products::BomError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failure.
///
/// ## Error Mapping
///
/// | Backend failure | StoreError |
/// |---|---|
/// | row missing where one is required | `NotFound` |
/// | unique violation (`23505`), state transition refused | `Conflict` |
/// | in-memory lock poisoned | `Poisoned` |
/// | any other sqlx error | `Backend` |
/// | no tokio runtime available | `Runtime` |
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

/// Error surfaced to callers of the core operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A recipe line cannot be expressed in its ingredient's inventory unit.
    #[error("incompatible unit: {0}")]
    IncompatibleUnit(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("planning failed: {0}")]
    Planning(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Store(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<UnitError> for ServiceError {
    fn from(err: UnitError) -> Self {
        match err {
            UnitError::Incompatible { .. } => ServiceError::IncompatibleUnit(err.to_string()),
            UnitError::Unknown(_) => ServiceError::Validation(err.to_string()),
        }
    }
}

impl From<BomError> for ServiceError {
    fn from(err: BomError) -> Self {
        match err {
            BomError::Unit(unit) => unit.into(),
            BomError::UnknownIngredient(_) => ServiceError::Validation(err.to_string()),
        }
    }
}

impl From<PlanningError> for ServiceError {
    fn from(err: PlanningError) -> Self {
        match err {
            PlanningError::InvalidInput(msg) => ServiceError::Validation(msg),
            PlanningError::Bom(bom) => bom.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_inventory::Unit;

    #[test]
    fn incompatible_units_keep_their_own_kind() {
        let err: ServiceError = BomError::Unit(UnitError::Incompatible {
            from: Unit::Gram,
            to: Unit::Liter,
        })
        .into();
        assert!(matches!(err, ServiceError::IncompatibleUnit(_)));
    }

    #[test]
    fn store_conflicts_surface_as_conflicts() {
        let err: ServiceError = StoreError::Conflict("already accepted".into()).into();
        assert_eq!(err, ServiceError::Conflict("already accepted".into()));
        let err: ServiceError = StoreError::Poisoned.into();
        assert!(matches!(err, ServiceError::Store(StoreError::Poisoned)));
    }
}
