use thiserror::Error;

/// Errors returned by checked `RobinHoodMap` lookups.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum MapError {
    /// `at`/`at_mut` was asked for a key the map does not hold.
    #[error("key not found")]
    KeyNotFound,
}
