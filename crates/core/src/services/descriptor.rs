//! Query descriptor - configuration, validation and result assembly for one query type.
//!
//! A [`QueryDescriptor`] is built once, typically at startup, and shared
//! across requests:
//!
//! ```
//! use quarry_core::models::{PaginationOptions, SortField};
//! use quarry_core::services::QueryDescriptor;
//! use serde_json::json;
//!
//! # tokio_test_block_on(async {
//! let descriptor = QueryDescriptor::new()
//!     .offset_pagination(PaginationOptions::new().default_limit(20))
//!     .single_sorting(["title", "year"], SortField::asc("title"));
//!
//! let query = descriptor.create_query_or_fail(&json!({"limit": 5}), None).await.unwrap();
//! assert_eq!(query.limit(), Some(5));
//! assert_eq!(query.offset(), Some(0));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! # Lifecycle
//!
//! 1. Configure with the fluent methods (each one clears the compiled cache)
//! 2. Seal with [`QueryDescriptor::validate`], or implicitly on first use
//! 3. Validate inputs with [`QueryDescriptor::create_query`]
//! 4. Wrap fetched entities with [`QueryDescriptor::create_result`]

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{trace, warn};

use crate::error::{ConfigError, ConfigResult, QueryResult, ValidationError};
use crate::metrics::{ValidationTimer, record_query_validated, record_query_violations, record_schema_compiled};
use crate::models::{Pagination, PaginationOptions, Query, ResultOptions, ResultSet, SortField, Sorting};
use crate::ports::FiltersValidator;
use crate::schema::{FieldPath, ObjectSchema, Outcome, Violation, ViolationCode};
use crate::services::compiler::{CompiledQuery, FILTERS_KEY};
use crate::services::result::assemble_result;

// =============================================================================
// Configuration
// =============================================================================

/// Declarative configuration of a query type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConfig {
    pub pagination: Option<Pagination>,
    pub sorting: Option<Sorting>,
    /// Structural schema of `filters`; any object when `None`.
    pub filters_schema: Option<ObjectSchema>,
}

impl QueryConfig {
    /// Check cross-field invariants.
    ///
    /// Every default sorting field must be one of the sortable fields.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(pagination) = &self.pagination {
            if pagination.is_cursor() {
                match &self.sorting {
                    None => return Err(ConfigError::MissingSingleSortingForCursorPagination),
                    Some(Sorting::Multi { .. }) => return Err(ConfigError::MultiSortingForCursorPagination),
                    Some(Sorting::Single { .. }) => {}
                }
            }

            let limits = pagination.limits();
            if limits.default_limit < 1 || limits.default_limit > limits.max_limit {
                return Err(ConfigError::InvalidPaginationLimits {
                    default_limit: limits.default_limit,
                    max_limit: limits.max_limit,
                });
            }
        }

        if let Some(sorting) = &self.sorting {
            if sorting.sortable_fields().is_empty() {
                return Err(ConfigError::EmptySortableFields);
            }
            if sorting.default_fields().is_empty() {
                return Err(ConfigError::EmptyDefaultSorting);
            }

            if let Some(default) = sorting
                .default_fields()
                .iter()
                .find(|default| !sorting.sortable_fields().contains(&default.field))
            {
                warn!(
                    field = %default.field,
                    sortable = ?sorting.sortable_fields(),
                    "Default sorting uses a field that is not sortable"
                );
                return Err(ConfigError::UnsortableDefaultField(default.field.clone()));
            }
        }

        Ok(())
    }
}

// =============================================================================
// QueryDescriptor
// =============================================================================

/// Configuration of one query type plus its lazily compiled schema.
///
/// Configuration methods consume and return the descriptor. Reading the
/// configuration back goes through [`QueryDescriptor::pagination_config`]
/// and [`QueryDescriptor::sorting_config`].
#[derive(Default)]
pub struct QueryDescriptor {
    config: QueryConfig,
    filters_validator: Option<Arc<dyn FiltersValidator>>,
    compiled: RwLock<Option<Arc<CompiledQuery>>>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Fluent configuration
    // -------------------------------------------------------------------------

    /// Paginate with opaque `after`/`before` cursors. Requires single sorting.
    pub fn cursor_pagination(mut self, options: PaginationOptions) -> Self {
        self.config.pagination = Some(Pagination::ByCursor(options.resolve()));
        self.reset()
    }

    /// Paginate with a numeric `offset`.
    pub fn offset_pagination(mut self, options: PaginationOptions) -> Self {
        self.config.pagination = Some(Pagination::ByOffset(options.resolve()));
        self.reset()
    }

    /// Sort by exactly one field per query.
    pub fn single_sorting<I, S>(mut self, sortable_fields: I, default_sorting: SortField) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sorting = Some(Sorting::Single {
            sortable_fields: sortable_fields.into_iter().map(Into::into).collect(),
            default_sorting,
        });
        self.reset()
    }

    /// Sort by an ordered, non-empty list of fields.
    pub fn multi_sorting<I, S>(mut self, sortable_fields: I, default_sorting: Vec<SortField>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sorting = Some(Sorting::Multi {
            sortable_fields: sortable_fields.into_iter().map(Into::into).collect(),
            default_sorting,
        });
        self.reset()
    }

    /// Replace the structural schema of `filters`.
    pub fn filters_schema(mut self, schema: ObjectSchema) -> Self {
        self.config.filters_schema = Some(schema);
        self.reset()
    }

    /// Run `validator` on `filters` after structural validation succeeds.
    pub fn filters_validator(mut self, validator: impl FiltersValidator + 'static) -> Self {
        self.filters_validator = Some(Arc::new(validator));
        self.reset()
    }

    fn reset(self) -> Self {
        *self.compiled.write() = None;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn pagination_config(&self) -> Option<&Pagination> {
        self.config.pagination.as_ref()
    }

    pub fn sorting_config(&self) -> Option<&Sorting> {
        self.config.sorting.as_ref()
    }

    // -------------------------------------------------------------------------
    // Sealing and compilation
    // -------------------------------------------------------------------------

    /// Check the configuration invariants.
    pub fn validate(&self) -> ConfigResult<()> {
        self.config.validate()
    }

    /// Compiled schema, built on first use and cached until reconfigured.
    pub fn compile(&self) -> ConfigResult<Arc<CompiledQuery>> {
        if let Some(compiled) = self.compiled.read().clone() {
            return Ok(compiled);
        }

        self.config.validate()?;
        let compiled = Arc::new(CompiledQuery::new(&self.config)?);
        *self.compiled.write() = Some(compiled.clone());
        record_schema_compiled();

        Ok(compiled)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Validate and default an untrusted input.
    ///
    /// The outer error is a configuration problem; the inner [`Outcome`]
    /// carries per-request violations.
    pub async fn create_query(&self, input: &Value) -> ConfigResult<Outcome<Query>> {
        let compiled = self.compile()?;
        let _timer = ValidationTimer::new();

        let outcome = match compiled.validate(input) {
            Ok(query) => self.apply_filters_validator(query).await,
            Err(violations) => Err(violations),
        };

        match &outcome {
            Ok(_) => record_query_validated("accepted"),
            Err(violations) => {
                trace!(violations = %violations, "Query input rejected");
                record_query_validated("rejected");
                record_query_violations(violations.len());
            }
        }

        Ok(outcome)
    }

    /// Like [`create_query`](Self::create_query), turning violations into a
    /// [`ValidationError`] with `message` (default `"Invalid query"`).
    pub async fn create_query_or_fail(&self, input: &Value, message: Option<&str>) -> QueryResult<Query> {
        match self.create_query(input).await? {
            Ok(query) => Ok(query),
            Err(violations) => Err(ValidationError::new(violations, message).into()),
        }
    }

    async fn apply_filters_validator(&self, mut query: Query) -> Outcome<Query> {
        let Some(validator) = &self.filters_validator else {
            return Ok(query);
        };

        let filters = std::mem::take(&mut query.filters);
        match validator.validate(Value::Object(filters)).await {
            Ok(Value::Object(filters)) => {
                query.filters = filters;
                Ok(query)
            }
            Ok(_) => Err(Violation::new(
                FieldPath::root().key(FILTERS_KEY),
                ViolationCode::InvalidType,
                "Filters validator must produce an object",
            )
            .into()),
            Err(violations) => Err(violations.prefixed(FILTERS_KEY)),
        }
    }

    // -------------------------------------------------------------------------
    // Results
    // -------------------------------------------------------------------------

    /// Wrap fetched entities into the result envelope for this query type.
    pub fn create_result<T>(&self, options: ResultOptions<T>) -> ConfigResult<ResultSet<T>> {
        self.config.validate()?;
        Ok(assemble_result(
            self.config.pagination.as_ref(),
            self.config.sorting.as_ref(),
            options,
        ))
    }
}

impl fmt::Debug for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDescriptor")
            .field("config", &self.config)
            .field("filters_validator", &self.filters_validator.is_some())
            .field("compiled", &self.compiled.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PageRequest, SortBy};
    use crate::ports::filters_validator_fn;
    use serde_json::json;

    fn books_cursor() -> QueryDescriptor {
        QueryDescriptor::new()
            .cursor_pagination(PaginationOptions::new())
            .single_sorting(["title", "year"], SortField::asc("title"))
    }

    // Test critique: pagination par curseur sans tri unique est refusée
    #[test]
    fn test_cursor_requires_single_sorting() {
        let descriptor = QueryDescriptor::new().cursor_pagination(PaginationOptions::new());
        assert_eq!(descriptor.validate(), Err(ConfigError::MissingSingleSortingForCursorPagination));

        let descriptor = descriptor.multi_sorting(["id"], vec![SortField::asc("id")]);
        assert_eq!(descriptor.validate(), Err(ConfigError::MultiSortingForCursorPagination));

        let descriptor = descriptor.single_sorting(["id"], SortField::asc("id"));
        assert_eq!(descriptor.validate(), Ok(()));
    }

    #[test]
    fn test_empty_sortable_fields_rejected() {
        let descriptor = QueryDescriptor::new().single_sorting(Vec::<String>::new(), SortField::asc("id"));
        assert_eq!(descriptor.validate(), Err(ConfigError::EmptySortableFields));

        let descriptor = QueryDescriptor::new().multi_sorting(["id"], vec![]);
        assert_eq!(descriptor.validate(), Err(ConfigError::EmptyDefaultSorting));
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let descriptor =
            QueryDescriptor::new().offset_pagination(PaginationOptions::new().default_limit(100).max_limit(10));
        assert!(matches!(
            descriptor.validate(),
            Err(ConfigError::InvalidPaginationLimits {
                default_limit: 100,
                max_limit: 10
            })
        ));

        let descriptor = QueryDescriptor::new().offset_pagination(PaginationOptions::new().default_limit(0));
        assert!(descriptor.compile().is_err());
    }

    // Test critique: un tri par défaut hors des champs triables est une erreur de configuration
    #[tokio::test]
    async fn test_default_sorting_outside_fields_rejected() {
        let descriptor = QueryDescriptor::new().single_sorting(["title"], SortField::asc("isbn"));
        assert_eq!(
            descriptor.validate(),
            Err(ConfigError::UnsortableDefaultField("isbn".to_string()))
        );

        let err = descriptor.create_query(&json!({})).await.unwrap_err();
        assert_eq!(err.code(), "E_QUERY_BUILDER_7");

        let descriptor = QueryDescriptor::new().multi_sorting(
            ["title", "year"],
            vec![SortField::asc("title"), SortField::desc("isbn")],
        );
        assert_eq!(
            descriptor.validate(),
            Err(ConfigError::UnsortableDefaultField("isbn".to_string()))
        );
    }

    #[test]
    fn test_compile_is_cached_and_reset() {
        let descriptor = books_cursor();
        let first = descriptor.compile().unwrap();
        let second = descriptor.compile().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let descriptor = descriptor.filters_schema(ObjectSchema::passthrough());
        let third = descriptor.compile().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[tokio::test]
    async fn test_cursor_defaults() {
        let query = books_cursor().create_query_or_fail(&json!({}), None).await.unwrap();
        assert_eq!(
            query.page,
            Some(PageRequest::Cursor {
                limit: 50,
                after: None,
                before: None
            })
        );
        assert_eq!(query.sort_by, Some(SortBy::Single(SortField::asc("title"))));
        assert_eq!(
            query.to_value(),
            json!({"filters": {}, "limit": 50, "sortBy": {"field": "title", "direction": "ASC"}})
        );
    }

    #[tokio::test]
    async fn test_after_and_before_together_allowed() {
        let query = books_cursor()
            .create_query_or_fail(&json!({"after": "a", "before": "b"}), None)
            .await
            .unwrap();
        assert_eq!(query.after(), Some("a"));
        assert_eq!(query.before(), Some("b"));
    }

    #[tokio::test]
    async fn test_or_fail_wraps_violations() {
        let err = books_cursor()
            .create_query_or_fail(&json!({"limit": 0}), Some("Invalid books query"))
            .await
            .unwrap_err();

        let err = match err {
            crate::error::QueryError::Validation(err) => err,
            other => panic!("expected validation error, got {:?}", other),
        };
        assert_eq!(err.message, "Invalid books query");
        assert_eq!(err.violations.for_path("limit").len(), 1);
    }

    #[tokio::test]
    async fn test_or_fail_surfaces_config_error() {
        let descriptor = QueryDescriptor::new().cursor_pagination(PaginationOptions::new());
        let err = descriptor.create_query_or_fail(&json!({}), None).await.unwrap_err();
        assert_eq!(err.code(), "E_QUERY_BUILDER_1");
    }

    #[tokio::test]
    async fn test_filters_validator_replaces_filters() {
        let descriptor = books_cursor().filters_validator(filters_validator_fn(|mut filters: Value| {
            if let Some(title) = filters.get("title").and_then(Value::as_str).map(str::to_lowercase) {
                filters["title"] = json!(title);
            }
            Ok(filters)
        }));

        let query = descriptor
            .create_query_or_fail(&json!({"filters": {"title": "Dune"}}), None)
            .await
            .unwrap();
        assert_eq!(query.filters.get("title"), Some(&json!("dune")));
    }

    // Test critique: un échec du validateur de filtres rejette toute la requête
    #[tokio::test]
    async fn test_filters_validator_failure_is_total() {
        let descriptor = books_cursor().filters_validator(filters_validator_fn(|_| {
            Err(Violation::custom("author", "Unknown author").into())
        }));

        let outcome = descriptor
            .create_query(&json!({"limit": 10, "filters": {"author": "x"}}))
            .await
            .unwrap();
        let violations = outcome.unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.for_path("filters.author").len(), 1);
    }

    #[tokio::test]
    async fn test_filters_validator_skipped_on_structural_failure() {
        let descriptor = books_cursor().filters_validator(filters_validator_fn(|_| {
            Err(Violation::custom("", "should not run").into())
        }));

        let violations = descriptor.create_query(&json!({"limit": -1})).await.unwrap().unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.for_path("limit").len(), 1);
    }

    #[tokio::test]
    async fn test_filters_validator_must_return_object() {
        let descriptor = books_cursor().filters_validator(filters_validator_fn(|_| Ok(json!([1]))));
        let violations = descriptor.create_query(&json!({})).await.unwrap().unwrap_err();
        assert_eq!(violations.for_path("filters").len(), 1);
    }

    #[test]
    fn test_create_result_checks_configuration() {
        let descriptor = QueryDescriptor::new().cursor_pagination(PaginationOptions::new());
        let err = descriptor
            .create_result(ResultOptions::new(vec![1], Query::default()))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingSingleSortingForCursorPagination);
    }
}
