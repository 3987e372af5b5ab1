//! Convenience result type alias for pullsub.

use crate::error::AppError;

/// A specialized `Result` type for pullsub operations.
pub type AppResult<T> = Result<T, AppError>;
