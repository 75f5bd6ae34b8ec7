//! Error types for delta operations.

use thiserror::Error;

/// Structured error types for delta composition and application.
///
/// Deltas in Fabler always span the whole document they address, so every
/// operation that combines a delta with something else (another delta, a
/// content snapshot) carries a length precondition. These variants report
/// which precondition failed.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    /// A delta was composed with or applied to a document of the wrong length.
    ///
    /// `expected` is the length the delta was built for (its base length),
    /// `found` is the length actually presented.
    #[error("delta length mismatch: delta expects base length {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },
}

impl DeltaError {
    /// Check if this error is a length precondition failure.
    pub fn is_length_mismatch(&self) -> bool {
        matches!(self, DeltaError::LengthMismatch { .. })
    }
}

impl From<DeltaError> for crate::Error {
    fn from(err: DeltaError) -> Self {
        crate::Error::Delta(err)
    }
}
