//! Error types for the entity model

/// Errors raised when parsing model values from strings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Kind tag outside the closed set
    #[error("unknown entity kind: '{0}'")]
    UnknownKind(String),

    /// Status value outside the closed set
    #[error("unknown status: '{0}'")]
    UnknownStatus(String),

    /// Sort direction other than asc/desc
    #[error("unknown sort direction: '{0}'")]
    UnknownDirection(String),

    /// Relation role other than of/source/target
    #[error("unknown relation role: '{0}'")]
    UnknownRole(String),
}
