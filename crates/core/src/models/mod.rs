//! Query and result models.
//!
//! Configuration types ([`Pagination`], [`Sorting`]) describe what a query
//! type accepts. Request types ([`Query`], [`PageRequest`], [`SortBy`]) are
//! what a validated input turns into. Result types ([`ResultSet`],
//! [`ResultMeta`]) are the envelope handed back to callers.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::QueryError;

// =============================================================================
// Sorting
// =============================================================================

/// Sort direction, `"ASC"` or `"DESC"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub const ALL: [SortDirection; 2] = [SortDirection::Asc, SortDirection::Desc];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(QueryError::InvalidSortDirection(other.to_string())),
        }
    }
}

/// One sort key: a field name and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

/// Validated `sortBy` value, a single key or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortBy {
    Single(SortField),
    Multi(Vec<SortField>),
}

impl SortBy {
    /// Sort keys in priority order.
    pub fn fields(&self) -> &[SortField] {
        match self {
            SortBy::Single(field) => std::slice::from_ref(field),
            SortBy::Multi(fields) => fields,
        }
    }
}

/// Sorting configuration of a query type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sorting {
    Single {
        sortable_fields: Vec<String>,
        default_sorting: SortField,
    },
    Multi {
        sortable_fields: Vec<String>,
        default_sorting: Vec<SortField>,
    },
}

impl Sorting {
    pub fn sortable_fields(&self) -> &[String] {
        match self {
            Sorting::Single { sortable_fields, .. } | Sorting::Multi { sortable_fields, .. } => sortable_fields,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Sorting::Multi { .. })
    }

    /// Default sort keys in priority order.
    pub fn default_fields(&self) -> &[SortField] {
        match self {
            Sorting::Single { default_sorting, .. } => std::slice::from_ref(default_sorting),
            Sorting::Multi { default_sorting, .. } => default_sorting,
        }
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Default page size when the caller gives none.
pub const DEFAULT_LIMIT: u32 = 50;

/// Default upper bound for the page size.
pub const DEFAULT_MAX_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

/// Partial limits, merged over [`PaginationLimits::default`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationOptions {
    pub default_limit: Option<u32>,
    pub max_limit: Option<u32>,
}

impl PaginationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_limit(mut self, limit: u32) -> Self {
        self.default_limit = Some(limit);
        self
    }

    pub fn max_limit(mut self, limit: u32) -> Self {
        self.max_limit = Some(limit);
        self
    }

    pub fn resolve(self) -> PaginationLimits {
        let defaults = PaginationLimits::default();
        PaginationLimits {
            default_limit: self.default_limit.unwrap_or(defaults.default_limit),
            max_limit: self.max_limit.unwrap_or(defaults.max_limit),
        }
    }
}

/// Pagination configuration of a query type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    ByCursor(PaginationLimits),
    ByOffset(PaginationLimits),
}

impl Pagination {
    pub fn limits(&self) -> PaginationLimits {
        match self {
            Pagination::ByCursor(limits) | Pagination::ByOffset(limits) => *limits,
        }
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self, Pagination::ByCursor(_))
    }
}

/// Validated pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    Offset {
        limit: u32,
        offset: u64,
    },
    Cursor {
        limit: u32,
        after: Option<String>,
        before: Option<String>,
    },
}

impl PageRequest {
    pub fn limit(&self) -> u32 {
        match self {
            PageRequest::Offset { limit, .. } | PageRequest::Cursor { limit, .. } => *limit,
        }
    }
}

// =============================================================================
// Query
// =============================================================================

/// A validated, defaulted query.
///
/// Serializes to the flat keyed form: `filters`, then `limit`/`offset` or
/// `limit`/`after`/`before` depending on the pagination mode, then `sortBy`.
/// Absent cursors are omitted rather than serialized as `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub filters: Map<String, Value>,
    pub page: Option<PageRequest>,
    pub sort_by: Option<SortBy>,
}

impl Query {
    /// Deserialize the filters into a caller-defined type.
    pub fn filters_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(Value::Object(self.filters.clone()))
    }

    pub fn limit(&self) -> Option<u32> {
        self.page.as_ref().map(PageRequest::limit)
    }

    pub fn offset(&self) -> Option<u64> {
        match &self.page {
            Some(PageRequest::Offset { offset, .. }) => Some(*offset),
            _ => None,
        }
    }

    pub fn after(&self) -> Option<&str> {
        match &self.page {
            Some(PageRequest::Cursor { after, .. }) => after.as_deref(),
            _ => None,
        }
    }

    pub fn before(&self) -> Option<&str> {
        match &self.page {
            Some(PageRequest::Cursor { before, .. }) => before.as_deref(),
            _ => None,
        }
    }

    /// Sort keys in priority order, empty without sorting.
    pub fn sort_fields(&self) -> &[SortField] {
        self.sort_by.as_ref().map(SortBy::fields).unwrap_or(&[])
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("filters", &self.filters)?;
        match &self.page {
            Some(PageRequest::Offset { limit, offset }) => {
                map.serialize_entry("limit", limit)?;
                map.serialize_entry("offset", offset)?;
            }
            Some(PageRequest::Cursor { limit, after, before }) => {
                map.serialize_entry("limit", limit)?;
                if let Some(after) = after {
                    map.serialize_entry("after", after)?;
                }
                if let Some(before) = before {
                    map.serialize_entry("before", before)?;
                }
            }
            None => {}
        }
        if let Some(sort_by) = &self.sort_by {
            map.serialize_entry("sortBy", sort_by)?;
        }
        map.end()
    }
}

// =============================================================================
// Results
// =============================================================================

/// Pagination echo of a result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PageMeta {
    Offset {
        limit: u32,
        offset: u64,
    },
    #[serde(rename_all = "camelCase")]
    Cursor {
        limit: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_page: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_page: Option<String>,
    },
}

/// Result metadata: pagination echo plus sorting echo.
///
/// `extra` holds entries added by the caller after assembly (totals,
/// timings) and is serialized next to the echoes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResultMeta {
    #[serde(flatten)]
    pub page: Option<PageMeta>,
    #[serde(rename = "sortBy", skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultMeta {
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.sort_by.is_none() && self.extra.is_empty()
    }

    /// Add a caller-defined entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Result envelope. `meta` is absent, not empty, when there is nothing to echo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet<T> {
    pub results: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResultMeta>,
}

impl<T: Serialize> ResultSet<T> {
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Input of result assembly.
#[derive(Debug, Clone)]
pub struct ResultOptions<T> {
    pub results: Vec<T>,
    pub query: Query,
    /// Opaque cursor of the next page, cursor pagination only.
    pub next_page_cursor: Option<String>,
    /// Opaque cursor of the previous page, cursor pagination only.
    pub previous_page_cursor: Option<String>,
}

impl<T> ResultOptions<T> {
    pub fn new(results: Vec<T>, query: Query) -> Self {
        Self {
            results,
            query,
            next_page_cursor: None,
            previous_page_cursor: None,
        }
    }

    pub fn next_page(mut self, cursor: impl Into<String>) -> Self {
        self.next_page_cursor = Some(cursor.into());
        self
    }

    pub fn previous_page(mut self, cursor: impl Into<String>) -> Self {
        self.previous_page_cursor = Some(cursor.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        let err = "desc".parse::<SortDirection>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid sort direction: desc");
        assert_eq!(err.code(), "E_QUERY_1");
    }

    #[test]
    fn test_pagination_options_merge_over_defaults() {
        let limits = PaginationOptions::new().max_limit(200).resolve();
        assert_eq!(limits.default_limit, 50);
        assert_eq!(limits.max_limit, 200);
    }

    #[test]
    fn test_query_serializes_flat() {
        let query = Query {
            filters: Map::new(),
            page: Some(PageRequest::Cursor {
                limit: 10,
                after: Some("abc".into()),
                before: None,
            }),
            sort_by: Some(SortBy::Single(SortField::desc("createdAt"))),
        };

        assert_eq!(
            query.to_value(),
            json!({
                "filters": {},
                "limit": 10,
                "after": "abc",
                "sortBy": {"field": "createdAt", "direction": "DESC"}
            })
        );
    }

    #[test]
    fn test_filters_as_typed() {
        #[derive(Deserialize)]
        struct Filters {
            author: String,
        }

        let mut filters = Map::new();
        filters.insert("author".into(), json!("Le Guin"));
        let query = Query {
            filters,
            ..Default::default()
        };
        assert_eq!(query.filters_as::<Filters>().unwrap().author, "Le Guin");
    }

    #[test]
    fn test_result_meta_flattens_page_echo() {
        let result = ResultSet {
            results: vec![1, 2],
            meta: Some(ResultMeta {
                page: Some(PageMeta::Cursor {
                    limit: 10,
                    next_page: Some("n".into()),
                    previous_page: None,
                }),
                sort_by: Some(SortBy::Multi(vec![SortField::asc("id")])),
                ..Default::default()
            }),
        };

        assert_eq!(
            result.to_value().unwrap(),
            json!({
                "results": [1, 2],
                "meta": {
                    "limit": 10,
                    "nextPage": "n",
                    "sortBy": [{"field": "id", "direction": "ASC"}]
                }
            })
        );
    }

    #[test]
    fn test_result_meta_extra_entries() {
        let mut meta = ResultMeta::default();
        assert!(meta.is_empty());

        meta.insert("total", 42);
        assert!(!meta.is_empty());
        assert_eq!(serde_json::to_value(&meta).unwrap(), json!({"total": 42}));
    }
}
