//! Error types for the query layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - Programmer mistakes in a query configuration
//! - [`ValidationError`] - A rejected query, carrying its violations
//! - [`QueryError`] - Top-level errors of the `*_or_fail` entry points
//! - [`EngineError`] - Execution pipeline errors
//!
//! Per-request validation failures are *not* errors here: they travel as a
//! [`ViolationList`] on the error side of an [`Outcome`](crate::schema::Outcome).
//! Only the explicit `*_or_fail` conversions turn them into a [`ValidationError`].
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::schema::ViolationList;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid query configuration.
///
/// Raised when a descriptor is sealed, before any query is processed.
/// These are never expected in a correct deployment and should abort setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Cursor pagination configured without any sorting.
    #[error("Pagination by cursor cannot be used without single field sorting")]
    MissingSingleSortingForCursorPagination,

    /// Cursor pagination configured with multi-field sorting.
    #[error("Sorting by multiple fields is not allowed in pagination by cursor")]
    MultiSortingForCursorPagination,

    /// Sorting configured with no sortable fields.
    #[error("Sortable fields list cannot be empty")]
    EmptySortableFields,

    /// Multi sorting configured with an empty default.
    #[error("Default sorting list cannot be empty")]
    EmptyDefaultSorting,

    /// Limits violate `1 <= default_limit <= max_limit`.
    #[error("Invalid pagination limits: default limit {default_limit} must be between 1 and max limit {max_limit}")]
    InvalidPaginationLimits {
        default_limit: u32,
        max_limit: u32,
    },

    /// Two query sub-schemas declare the same top-level field.
    #[error("Query field '{0}' is declared more than once")]
    DuplicateQueryField(String),

    /// Default sorting names a field missing from the sortable fields.
    #[error("Default sorting field '{0}' is not one of the sortable fields")]
    UnsortableDefaultField(String),
}

impl ConfigError {
    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::MissingSingleSortingForCursorPagination => "E_QUERY_BUILDER_1",
            ConfigError::MultiSortingForCursorPagination => "E_QUERY_BUILDER_2",
            ConfigError::EmptySortableFields => "E_QUERY_BUILDER_3",
            ConfigError::EmptyDefaultSorting => "E_QUERY_BUILDER_4",
            ConfigError::InvalidPaginationLimits { .. } => "E_QUERY_BUILDER_5",
            ConfigError::DuplicateQueryField(_) => "E_QUERY_BUILDER_6",
            ConfigError::UnsortableDefaultField(_) => "E_QUERY_BUILDER_7",
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A query rejected by its compiled schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}: {violations}")]
pub struct ValidationError {
    /// Human-readable summary chosen by the caller.
    pub message: String,
    pub violations: ViolationList,
}

impl ValidationError {
    /// Message used when the caller does not provide one.
    pub const DEFAULT_MESSAGE: &'static str = "Invalid query";

    pub fn new(violations: ViolationList, message: Option<&str>) -> Self {
        Self {
            message: message.unwrap_or(Self::DEFAULT_MESSAGE).to_string(),
            violations,
        }
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors of the throwing query entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The descriptor itself is misconfigured.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A sort direction string other than `ASC` or `DESC`.
    #[error("Invalid sort direction: {0}")]
    InvalidSortDirection(String),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Config(e) => e.code(),
            QueryError::Validation(_) => "E_QUERY_VALIDATION",
            QueryError::InvalidSortDirection(_) => "E_QUERY_1",
        }
    }
}

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors raised while running an execution pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was run with no middleware and no result factory.
    #[error("Could not find any results in query engine due to lack of middlewares")]
    NoMiddlewares,

    /// A middleware called `next` past the end of the chain.
    #[error("No further middleware to call")]
    NoFurtherMiddleware,

    /// Descriptor misconfiguration surfaced during execution.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Query validation failed inside the pipeline.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// A middleware failed.
    #[error("Middleware error: {0}")]
    Handler(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NoMiddlewares => "E_QUERY_ENGINE_1",
            EngineError::NoFurtherMiddleware => "E_QUERY_ENGINE_2",
            EngineError::Config(e) => e.code(),
            EngineError::Query(e) => e.code(),
            EngineError::Handler(_) => "E_QUERY_ENGINE_HANDLER",
        }
    }

    /// Wrap any displayable failure from middleware code.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        EngineError::Handler(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for throwing query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Violation;

    // Test critique: la chaîne de conversion d'erreurs fonctionne
    #[test]
    fn test_error_conversion_chain() {
        let config_err = ConfigError::EmptySortableFields;
        let query_err: QueryError = config_err.into();
        assert_eq!(query_err.code(), "E_QUERY_BUILDER_3");

        let engine_err: EngineError = query_err.into();
        assert!(engine_err.to_string().contains("Sortable fields list cannot be empty"));
    }

    #[test]
    fn test_validation_error_summarizes_violations() {
        let violations: ViolationList = Violation::custom("limit", "Number must be less than or equal to 10").into();
        let err = ValidationError::new(violations, None);
        assert_eq!(err.message, "Invalid query");
        assert_eq!(err.to_string(), "Invalid query: limit: Number must be less than or equal to 10");

        let err = ValidationError::new(ViolationList::new(), Some("Bad books query"));
        assert_eq!(err.message, "Bad books query");
    }

    #[test]
    fn test_engine_messages() {
        assert_eq!(
            EngineError::NoMiddlewares.to_string(),
            "Could not find any results in query engine due to lack of middlewares"
        );
        assert_eq!(EngineError::NoFurtherMiddleware.code(), "E_QUERY_ENGINE_2");
    }
}
