//! Query compiler.
//!
//! Turns a [`QueryConfig`] into one merged [`ObjectSchema`] and a typed
//! extraction step producing [`Query`] values. Three factories build the
//! sub-schemas:
//!
//! - [`sortable_field_schema`] - one `{field, direction}` sort key
//! - [`pagination_schema`] - `limit` plus `offset` or `after`/`before`
//! - [`sorting_schema`] - `sortBy` as a single key or a non-empty list
//!
//! [`query_schema`] merges them under the `filters` base.

use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use crate::error::ConfigResult;
use crate::models::{PageRequest, Pagination, Query, SortBy, SortDirection, Sorting};
use crate::schema::{FieldPath, ObjectSchema, Outcome, Schema, Violation, ViolationCode, ViolationList};
use crate::services::QueryConfig;

pub const FILTERS_KEY: &str = "filters";
pub const LIMIT_KEY: &str = "limit";
pub const OFFSET_KEY: &str = "offset";
pub const AFTER_KEY: &str = "after";
pub const BEFORE_KEY: &str = "before";
pub const SORT_BY_KEY: &str = "sortBy";

// =============================================================================
// Sub-schema Factories
// =============================================================================

/// Schema of one sort key: both fields required, no other keys.
pub fn sortable_field_schema(sortable_fields: &[String]) -> ObjectSchema {
    ObjectSchema::strict()
        .required("field", Schema::enumeration(sortable_fields.iter().cloned()))
        .required(
            "direction",
            Schema::enumeration(SortDirection::ALL.iter().map(SortDirection::as_str)),
        )
}

/// Pagination fields for the configured mode.
pub fn pagination_schema(pagination: &Pagination) -> ObjectSchema {
    let limits = pagination.limits();
    let base = ObjectSchema::strict().with_default(
        LIMIT_KEY,
        Schema::integer(1, i64::from(limits.max_limit)),
        json!(limits.default_limit),
    );

    match pagination {
        Pagination::ByCursor(_) => base
            .optional(AFTER_KEY, Schema::String)
            .optional(BEFORE_KEY, Schema::String),
        Pagination::ByOffset(_) => base.with_default(OFFSET_KEY, Schema::integer_min(0), json!(0)),
    }
}

/// `sortBy` field for the configured mode, defaulting to the configured sorting.
pub fn sorting_schema(sorting: &Sorting) -> ObjectSchema {
    let item = sortable_field_schema(sorting.sortable_fields());

    let (schema, default) = match sorting {
        Sorting::Single { default_sorting, .. } => (Schema::Object(item), json!(default_sorting)),
        Sorting::Multi { default_sorting, .. } => (Schema::non_empty_array(item.into()), json!(default_sorting)),
    };

    ObjectSchema::strict().with_default(SORT_BY_KEY, schema, default)
}

/// Merge filters, pagination and sorting into the full query schema.
///
/// Without a filters schema, `filters` accepts any object and defaults to `{}`.
pub fn query_schema(config: &QueryConfig) -> ConfigResult<ObjectSchema> {
    let filters = config
        .filters_schema
        .clone()
        .unwrap_or_else(ObjectSchema::passthrough);

    let mut schema = ObjectSchema::strict().with_default(FILTERS_KEY, filters, json!({}));

    if let Some(pagination) = &config.pagination {
        schema = schema.merge(pagination_schema(pagination))?;
    }
    if let Some(sorting) = &config.sorting {
        schema = schema.merge(sorting_schema(sorting))?;
    }

    Ok(schema)
}

// =============================================================================
// Compiled Query
// =============================================================================

/// Merged schema plus the modes needed to build typed [`Query`] values.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    schema: ObjectSchema,
    pagination: Option<Pagination>,
    sorting: Option<Sorting>,
}

impl CompiledQuery {
    pub fn new(config: &QueryConfig) -> ConfigResult<Self> {
        let schema = query_schema(config)?;

        debug!(
            fields = ?schema.fields().map(|(name, _)| name).collect::<Vec<_>>(),
            cursor = config.pagination.as_ref().is_some_and(Pagination::is_cursor),
            multi_sorting = config.sorting.as_ref().is_some_and(Sorting::is_multi),
            "Compiled query schema"
        );

        Ok(Self {
            schema,
            pagination: config.pagination,
            sorting: config.sorting.clone(),
        })
    }

    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    /// Structural validation only. Filters validators are applied by the descriptor.
    pub fn validate(&self, input: &Value) -> Outcome<Query> {
        let normalized = self.schema.validate(input).inspect_err(|violations| {
            trace!(violations = violations.len(), "Query rejected");
        })?;

        let Value::Object(map) = normalized else {
            return Err(Violation::new(FieldPath::root(), ViolationCode::InvalidType, "Expected object").into());
        };
        self.extract(map)
    }

    fn extract(&self, mut map: Map<String, Value>) -> Outcome<Query> {
        let mut violations = ViolationList::new();

        let filters = match map.remove(FILTERS_KEY) {
            Some(Value::Object(filters)) => filters,
            _ => Map::new(),
        };

        let limit = || {
            map.get(LIMIT_KEY)
                .and_then(Value::as_u64)
                .and_then(|limit| u32::try_from(limit).ok())
        };
        let string = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

        let page = self.pagination.map(|pagination| match pagination {
            Pagination::ByOffset(limits) => PageRequest::Offset {
                limit: limit().unwrap_or(limits.default_limit),
                offset: map.get(OFFSET_KEY).and_then(Value::as_u64).unwrap_or(0),
            },
            Pagination::ByCursor(limits) => PageRequest::Cursor {
                limit: limit().unwrap_or(limits.default_limit),
                after: string(AFTER_KEY),
                before: string(BEFORE_KEY),
            },
        });

        let sort_by = match (&self.sorting, map.get(SORT_BY_KEY)) {
            (Some(sorting), Some(raw)) => {
                let parsed = if sorting.is_multi() {
                    serde_json::from_value(raw.clone()).map(SortBy::Multi)
                } else {
                    serde_json::from_value(raw.clone()).map(SortBy::Single)
                };
                match parsed {
                    Ok(sort_by) => Some(sort_by),
                    Err(e) => {
                        violations.push(Violation::new(
                            FieldPath::root().key(SORT_BY_KEY),
                            ViolationCode::InvalidType,
                            e.to_string(),
                        ));
                        None
                    }
                }
            }
            _ => None,
        };

        violations.into_outcome(Query { filters, page, sort_by })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaginationLimits, SortField};

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn config(pagination: Option<Pagination>, sorting: Option<Sorting>) -> QueryConfig {
        QueryConfig {
            pagination,
            sorting,
            filters_schema: None,
        }
    }

    #[test]
    fn test_pagination_schema_fields() {
        let cursor = pagination_schema(&Pagination::ByCursor(PaginationLimits::default()));
        assert_eq!(cursor.fields().map(|(n, _)| n).collect::<Vec<_>>(), ["limit", "after", "before"]);

        let offset = pagination_schema(&Pagination::ByOffset(PaginationLimits::default()));
        assert_eq!(offset.fields().map(|(n, _)| n).collect::<Vec<_>>(), ["limit", "offset"]);
    }

    #[test]
    fn test_sortable_field_rejects_extra_keys() {
        let schema = sortable_field_schema(&fields(&["id"]));
        let err = schema
            .validate(&json!({"field": "id", "direction": "ASC", "nulls": "first"}))
            .unwrap_err();
        assert_eq!(err.for_path("nulls").len(), 1);
    }

    #[test]
    fn test_query_schema_rejects_unknown_top_level_key() {
        let compiled = CompiledQuery::new(&config(None, None)).unwrap();
        let err = compiled.validate(&json!({"limit": 10})).unwrap_err();
        assert_eq!(err.for_path("limit")[0].code, ViolationCode::UnrecognizedKey);
    }

    #[test]
    fn test_filters_default_and_passthrough() {
        let compiled = CompiledQuery::new(&config(None, None)).unwrap();
        let query = compiled.validate(&json!({})).unwrap();
        assert!(query.filters.is_empty());
        assert!(query.page.is_none() && query.sort_by.is_none());

        let query = compiled.validate(&json!({"filters": {"author": "Herbert"}})).unwrap();
        assert_eq!(query.filters.get("author"), Some(&json!("Herbert")));

        let err = compiled.validate(&json!({"filters": "nope"})).unwrap_err();
        assert_eq!(err.for_path("filters").len(), 1);
    }

    #[test]
    fn test_custom_filters_schema() {
        let mut cfg = config(None, None);
        cfg.filters_schema = Some(ObjectSchema::strict().optional("year", Schema::integer_min(0)));
        let compiled = CompiledQuery::new(&cfg).unwrap();

        let query = compiled.validate(&json!({"filters": {"year": 1965}})).unwrap();
        assert_eq!(query.filters.get("year"), Some(&json!(1965)));

        let err = compiled.validate(&json!({"filters": {"genre": "sf"}})).unwrap_err();
        assert_eq!(err.for_path("filters.genre").len(), 1);
    }

    #[test]
    fn test_extracts_typed_sorting() {
        let sorting = Sorting::Multi {
            sortable_fields: fields(&["title", "year"]),
            default_sorting: vec![SortField::asc("title")],
        };
        let compiled = CompiledQuery::new(&config(None, Some(sorting))).unwrap();

        let query = compiled
            .validate(&json!({"sortBy": [{"field": "year", "direction": "DESC"}, {"field": "title", "direction": "ASC"}]}))
            .unwrap();
        assert_eq!(
            query.sort_by,
            Some(SortBy::Multi(vec![SortField::desc("year"), SortField::asc("title")]))
        );
    }
}
