//! DOM Errors
//!
//! Exception taxonomy shared by every fallible tree and range operation.

use std::collections::TryReserveError;

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Structural rule violated (cycle, wrong parent kind, second root element, ...)
    #[error("Hierarchy request error")]
    HierarchyRequest,
    /// Reference node is not where the caller claimed
    #[error("Node not found")]
    NotFound,
    /// Points live under different roots
    #[error("Wrong document")]
    WrongDocument,
    /// Node kind cannot take part in the operation
    #[error("Invalid node type")]
    InvalidNodeType,
    /// Offset beyond the node's length
    #[error("Index or size is out of range")]
    IndexSize,
    /// Range is unpositioned or its handle is stale
    #[error("Invalid state")]
    InvalidState,
    /// Operation is not supported on this node
    #[error("Operation not supported")]
    NotSupported,
    /// Child list could not grow
    #[error("Out of memory")]
    OutOfMemory,
}

impl DomError {
    /// Legacy `DOMException` code
    pub fn code(self) -> u16 {
        match self {
            Self::IndexSize => 1,
            Self::HierarchyRequest => 3,
            Self::WrongDocument => 4,
            Self::NotFound => 8,
            Self::NotSupported => 9,
            Self::InvalidState => 11,
            Self::InvalidNodeType => 24,
            Self::OutOfMemory => 0,
        }
    }
}

impl From<TryReserveError> for DomError {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}
