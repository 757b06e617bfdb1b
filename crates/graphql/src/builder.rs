//! Projection of a query descriptor onto a GraphQL schema.
//!
//! [`GraphQLQueryBuilder`] turns a [`QueryDescriptor`] into the input and
//! output types of one query field and resolves that field by validating
//! its `query` argument and handing the normalized [`Query`] to a
//! [`Fetcher`].

use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, InputValue, Object, SchemaBuilder, TypeRef};
use async_graphql::{Context, ErrorExtensions, Name, Value};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use quarry_core::error::{ConfigResult, QueryError};
use quarry_core::models::{Query, ResultSet};
use quarry_core::services::compiler::SORT_BY_KEY;
use quarry_core::QueryDescriptor;

use crate::types::{
    EntityType, FiltersType, SortFieldType, create_input_sort_type, create_query_type, create_result_meta_type,
    create_result_sort_type, create_result_type, create_sort_field_type,
};
use crate::values::{from_json, into_field_value};

/// Extension code of rejected query arguments.
pub const BAD_USER_INPUT: &str = "BAD_USER_INPUT";

/// Message of rejected query arguments.
pub const INVALID_QUERY_MESSAGE: &str = "Invalid query";

/// Message of a result envelope missing the meta its type requires.
pub const MISSING_META_MESSAGE: &str = "Fetcher returned no meta";

/// Name of the argument carrying the query input.
pub const QUERY_ARGUMENT: &str = "query";

// =============================================================================
// Fetcher
// =============================================================================

/// Loads the entities of a validated query.
///
/// Implementations usually build the envelope with
/// [`QueryDescriptor::create_result`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, query: Query, ctx: &Context<'_>) -> async_graphql::Result<ResultSet<serde_json::Value>>;
}

// =============================================================================
// Builder
// =============================================================================

/// Options of a [`GraphQLQueryBuilder`].
pub struct GraphQLQueryOptions {
    /// Base name of the generated types, entity type name when unset.
    pub name: Option<String>,
    pub entity: EntityType,
    pub filters: FiltersType,
    pub fetcher: Arc<dyn Fetcher>,
}

impl GraphQLQueryOptions {
    pub fn new(entity: impl Into<EntityType>, filters: impl Into<FiltersType>, fetcher: impl Fetcher + 'static) -> Self {
        Self {
            name: None,
            entity: entity.into(),
            filters: filters.into(),
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// GraphQL projection of one query descriptor.
///
/// # Example
///
/// ```ignore
/// let books = GraphQLQueryBuilder::new(descriptor, GraphQLQueryOptions::new(book, filters, fetcher))?;
/// let query = books.attach_query_field(Object::new("Query"), "books");
/// let schema = build_schema(books.register(schema_builder("Query")).register(query))?;
/// ```
pub struct GraphQLQueryBuilder {
    descriptor: Arc<QueryDescriptor>,
    name: String,
    entity: EntityType,
    filters: FiltersType,
    fetcher: Arc<dyn Fetcher>,
    sort_field: Option<Arc<SortFieldType>>,
    extra_meta_fields: Vec<Field>,
}

impl GraphQLQueryBuilder {
    /// Fails when the descriptor is misconfigured.
    pub fn new(descriptor: Arc<QueryDescriptor>, options: GraphQLQueryOptions) -> ConfigResult<Self> {
        descriptor.validate()?;

        let GraphQLQueryOptions {
            name,
            entity,
            filters,
            fetcher,
        } = options;
        let name = name.unwrap_or_else(|| entity.type_name().to_string());

        let sort_field = descriptor
            .sorting_config()
            .map(|sorting| create_sort_field_type(&name, sorting.sortable_fields()))
            .transpose()?
            .map(Arc::new);

        Ok(Self {
            descriptor,
            name,
            entity,
            filters,
            fetcher,
            sort_field,
            extra_meta_fields: Vec::new(),
        })
    }

    /// Base name of the generated types.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query_type_name(&self) -> String {
        format!("{}_Query", self.name)
    }

    pub fn result_type_name(&self) -> String {
        format!("{}_Result", self.name)
    }

    pub fn sort_field_type(&self) -> Option<&SortFieldType> {
        self.sort_field.as_deref()
    }

    /// Add fields to the result meta type.
    ///
    /// They resolve from [`ResultMeta::extra`](quarry_core::models::ResultMeta::extra)
    /// entries of the same name, see [`value_field`](crate::value_field).
    pub fn use_extra_meta_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.extra_meta_fields.extend(fields);
        self
    }

    fn has_meta(&self) -> bool {
        self.descriptor.pagination_config().is_some()
            || self.descriptor.sorting_config().is_some()
            || !self.extra_meta_fields.is_empty()
    }

    /// Query field `name(query: {Base}_Query): {Base}_Result!`.
    pub fn query_field(&self, name: impl Into<String>) -> Field {
        let name = name.into();
        let resolver = QueryResolver {
            field: name.clone(),
            descriptor: self.descriptor.clone(),
            fetcher: self.fetcher.clone(),
            sort_field: self.sort_field.clone(),
            has_meta: self.has_meta(),
        };

        Field::new(name, TypeRef::named_nn(self.result_type_name()), move |ctx| {
            let resolver = resolver.clone();
            FieldFuture::new(async move {
                let input = ctx.args.as_index_map().get(QUERY_ARGUMENT).cloned();
                let value = resolver.resolve(input, ctx.ctx).await?;
                Ok(Some(into_field_value(value)))
            })
        })
        .argument(InputValue::new(QUERY_ARGUMENT, TypeRef::named(self.query_type_name())))
    }

    /// Add the query field to `object`.
    pub fn attach_query_field(&self, object: Object, name: impl Into<String>) -> Object {
        object.field(self.query_field(name))
    }

    /// Register every generated type, plus composed entity and filters types.
    ///
    /// The shared scalar and enum types come from
    /// [`schema_builder`](crate::schema_builder).
    pub fn register(self, mut builder: SchemaBuilder) -> SchemaBuilder {
        let Self {
            descriptor,
            name,
            entity,
            filters,
            sort_field,
            extra_meta_fields,
            ..
        } = self;
        let pagination = descriptor.pagination_config();
        let is_multi = descriptor.sorting_config().is_some_and(|sorting| sorting.is_multi());

        let (input_sort, result_sort) = match sort_field.as_deref() {
            Some(sort_field) => {
                let (input, input_ref) = create_input_sort_type(&name, sort_field, is_multi);
                let (result, result_ref) = create_result_sort_type(&name, sort_field, is_multi);
                builder = builder.register(sort_field.to_enum()).register(input).register(result);
                (Some(input_ref), Some(result_ref))
            }
            None => (None, None),
        };

        builder = builder.register(create_query_type(&name, filters.nullable(), input_sort, pagination));

        let meta = create_result_meta_type(&name, pagination, result_sort, extra_meta_fields);
        let meta_name = meta.as_ref().map(|meta| meta.type_name().to_string());
        if let Some(meta) = meta {
            builder = builder.register(meta);
        }
        builder = builder.register(create_result_type(&name, entity.non_null_list(), meta_name.as_deref()));

        if let Some(entity) = entity.into_composed() {
            builder = builder.register(entity);
        }
        if let Some(filters) = filters.into_composed() {
            builder = builder.register(filters);
        }

        debug!(name = %name, meta = meta_name.is_some(), "Registered query types");
        builder
    }
}

// =============================================================================
// Resolution
// =============================================================================

#[derive(Clone)]
struct QueryResolver {
    field: String,
    descriptor: Arc<QueryDescriptor>,
    fetcher: Arc<dyn Fetcher>,
    sort_field: Option<Arc<SortFieldType>>,
    has_meta: bool,
}

impl QueryResolver {
    async fn resolve(&self, input: Option<Value>, ctx: &Context<'_>) -> async_graphql::Result<Value> {
        let input = query_input(input, self.sort_field.as_deref())?;

        let query = match self
            .descriptor
            .create_query_or_fail(&input, Some(INVALID_QUERY_MESSAGE))
            .await
        {
            Ok(query) => query,
            Err(err) => {
                warn!(field = %self.field, code = err.code(), error = %err, "Query rejected");
                return Err(query_error(err));
            }
        };

        let result = self.fetcher.fetch(query, ctx).await?;
        debug!(field = %self.field, results = result.results.len(), "Query resolved");

        result_value(result, self.sort_field.as_deref(), self.has_meta)
    }
}

/// JSON input of the descriptor, sort items carrying raw field identifiers.
fn query_input(input: Option<Value>, sort_field: Option<&SortFieldType>) -> async_graphql::Result<serde_json::Value> {
    let mut input = match input {
        None | Some(Value::Null) => return Ok(json!({})),
        Some(value) => value.into_json()?,
    };

    strip_nulls(&mut input);
    if let serde_json::Value::Object(map) = &mut input {
        if let (Some(sort_field), Some(sort_by)) = (sort_field, map.get_mut(SORT_BY_KEY)) {
            match sort_by {
                serde_json::Value::Array(items) => items.iter_mut().for_each(|item| raw_sort_item(item, sort_field)),
                item => raw_sort_item(item, sort_field),
            }
        }
    }
    Ok(input)
}

/// Drop `null` object entries at every depth; GraphQL null means absent.
fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, entry| !entry.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

fn raw_sort_item(item: &mut serde_json::Value, sort_field: &SortFieldType) {
    if let Some(serde_json::Value::String(field)) = item.get_mut("field") {
        *field = sort_field.to_raw(field).to_string();
    }
}

/// GraphQL value of a result envelope, sort echoes as enum values.
fn result_value(
    result: ResultSet<serde_json::Value>,
    sort_field: Option<&SortFieldType>,
    has_meta: bool,
) -> async_graphql::Result<Value> {
    if has_meta && result.meta.is_none() {
        return Err(async_graphql::Error::new(MISSING_META_MESSAGE));
    }

    let mut value = from_json(serde_json::to_value(&result)?)?;
    if let Value::Object(envelope) = &mut value
        && let Some(Value::Object(meta)) = envelope.get_mut("meta")
        && let Some(sort_by) = meta.get_mut(SORT_BY_KEY)
    {
        match sort_by {
            Value::List(items) => items.iter_mut().for_each(|item| enum_sort_item(item, sort_field)),
            item => enum_sort_item(item, sort_field),
        }
    }
    Ok(value)
}

fn enum_sort_item(item: &mut Value, sort_field: Option<&SortFieldType>) {
    let Value::Object(map) = item else {
        return;
    };

    if let Some(Value::String(raw)) = map.get("field") {
        let name = sort_field.map_or(raw.as_str(), |sort_field| sort_field.to_graphql(raw));
        let field = Value::Enum(Name::new(name));
        map.insert(Name::new("field"), field);
    }
    if let Some(Value::String(direction)) = map.get("direction") {
        let direction = Value::Enum(Name::new(direction));
        map.insert(Name::new("direction"), direction);
    }
}

/// GraphQL error of a rejected query.
///
/// Validation failures carry `code = BAD_USER_INPUT` and the violation list
/// in their extensions.
fn query_error(err: QueryError) -> async_graphql::Error {
    let code = match &err {
        QueryError::Validation(_) => BAD_USER_INPUT,
        other => other.code(),
    };
    let violations = match &err {
        QueryError::Validation(validation) => serde_json::to_value(&validation.violations)
            .ok()
            .and_then(|violations| Value::from_json(violations).ok()),
        _ => None,
    };

    async_graphql::Error::new(err.to_string()).extend_with(|_, extensions| {
        extensions.set("code", code);
        if let Some(violations) = &violations {
            extensions.set("violations", violations.clone());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::dynamic::{InputObject, Schema};
    use quarry_core::models::{PaginationOptions, ResultOptions, SortField};

    use crate::schema::{build_schema, schema_builder};
    use crate::types::TypeSource;
    use crate::values::value_field;

    const BOOKS: &[(&str, &str, u64)] = &[
        ("1", "Dune", 1965),
        ("2", "Hyperion", 1989),
        ("3", "Solaris", 1961),
    ];

    /// Sorts the fixed catalog by the first requested field and slices it.
    struct CatalogFetcher {
        descriptor: Arc<QueryDescriptor>,
    }

    #[async_trait]
    impl Fetcher for CatalogFetcher {
        async fn fetch(&self, query: Query, _ctx: &Context<'_>) -> async_graphql::Result<ResultSet<serde_json::Value>> {
            let mut books: Vec<_> = BOOKS
                .iter()
                .map(|(id, title, published_year)| json!({"id": id, "title": title, "published_year": published_year}))
                .collect();
            if let Some(sort) = query.sort_fields().first() {
                books.sort_by(|a, b| {
                    let ordering = a[&sort.field].to_string().cmp(&b[&sort.field].to_string());
                    if sort.direction == quarry_core::SortDirection::Desc {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
            }
            let offset = query.offset().unwrap_or(0) as usize;
            let limit = query.limit().unwrap_or(u32::MAX) as usize;
            let page = books.into_iter().skip(offset).take(limit).collect();

            let mut result = self.descriptor.create_result(ResultOptions::new(page, query))?;
            if let Some(meta) = result.meta.as_mut() {
                meta.insert("total", BOOKS.len());
            }
            Ok(result)
        }
    }

    fn book_type() -> Object {
        Object::new("Book")
            .field(value_field("id", TypeRef::named_nn(TypeRef::ID)))
            .field(value_field("title", TypeRef::named_nn(TypeRef::STRING)))
    }

    fn filters_type() -> InputObject {
        InputObject::new("Book_Filters").field(InputValue::new("title", TypeRef::named(TypeRef::STRING)))
    }

    fn books_schema(descriptor: QueryDescriptor) -> Schema {
        let descriptor = Arc::new(descriptor);
        let fetcher = CatalogFetcher {
            descriptor: descriptor.clone(),
        };
        let books = GraphQLQueryBuilder::new(descriptor, GraphQLQueryOptions::new(book_type(), filters_type(), fetcher))
            .unwrap()
            .use_extra_meta_fields([value_field("total", TypeRef::named_nn(TypeRef::INT))]);

        let query = books.attach_query_field(Object::new("Query"), "books");
        build_schema(books.register(schema_builder("Query")).register(query)).unwrap()
    }

    fn offset_descriptor() -> QueryDescriptor {
        QueryDescriptor::new()
            .offset_pagination(PaginationOptions::new().default_limit(2).max_limit(10))
            .single_sorting(["title", "published_year"], SortField::asc("title"))
    }

    #[test]
    fn test_type_names_default_to_entity() {
        let descriptor = Arc::new(offset_descriptor());
        let fetcher = CatalogFetcher {
            descriptor: descriptor.clone(),
        };
        let options = GraphQLQueryOptions::new(TypeSource::named("Book"), filters_type(), fetcher);
        let books = GraphQLQueryBuilder::new(descriptor.clone(), options).unwrap();
        assert_eq!(books.name(), "Book");
        assert_eq!(books.query_type_name(), "Book_Query");
        assert_eq!(books.result_type_name(), "Book_Result");

        let fetcher = CatalogFetcher {
            descriptor: descriptor.clone(),
        };
        let options = GraphQLQueryOptions::new(TypeSource::named("Book"), filters_type(), fetcher).name("Library");
        let library = GraphQLQueryBuilder::new(descriptor, options).unwrap();
        assert_eq!(library.name(), "Library");
        assert_eq!(library.sort_field_type().map(SortFieldType::type_name), Some("Library_Sort_Field"));
    }

    #[test]
    fn test_misconfigured_descriptor_is_rejected() {
        let descriptor = Arc::new(QueryDescriptor::new().cursor_pagination(PaginationOptions::new()));
        let fetcher = CatalogFetcher {
            descriptor: descriptor.clone(),
        };
        let options = GraphQLQueryOptions::new(book_type(), filters_type(), fetcher);
        assert!(GraphQLQueryBuilder::new(descriptor, options).is_err());
    }

    #[test]
    fn test_sdl_contains_generated_types() {
        let sdl = books_schema(offset_descriptor()).sdl();

        for expected in [
            "input Book_Query",
            "input Book_Query_Sort_Input",
            "enum Book_Sort_Field",
            "publishedYear",
            "type Book_Result_Sort",
            "type Book_Result_Meta",
            "type Book_Result",
            "results: [Book!]!",
            "meta: Book_Result_Meta!",
            "sortBy: Book_Result_Sort!",
            "offset: NonNegativeInt!",
            "enum SortDirection",
            "books(query: Book_Query): Book_Result!",
        ] {
            assert!(sdl.contains(expected), "missing `{}` in:\n{}", expected, sdl);
        }
    }

    #[test]
    fn test_sdl_multi_sorting_and_cursor() {
        let cursor = QueryDescriptor::new()
            .cursor_pagination(PaginationOptions::new())
            .single_sorting(["id"], SortField::asc("id"));
        let sdl = books_schema(cursor).sdl();
        assert!(sdl.contains("nextPage: String"));
        assert!(sdl.contains("after: String"));

        let multi = QueryDescriptor::new().multi_sorting(["id", "title"], vec![SortField::asc("id")]);
        let sdl = books_schema(multi).sdl();
        assert!(sdl.contains("sortBy: [Book_Query_Sort_Input!]"));
        assert!(sdl.contains("sortBy: [Book_Result_Sort!]!"));
    }

    #[tokio::test]
    async fn test_execute_with_defaults() {
        let schema = books_schema(offset_descriptor());

        let response = schema
            .execute("{ books { results { title } meta { limit offset total sortBy { field direction } } } }")
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"books": {
                "results": [{"title": "Dune"}, {"title": "Hyperion"}],
                "meta": {"limit": 2, "offset": 0, "total": 3, "sortBy": {"field": "title", "direction": "ASC"}}
            }})
        );
    }

    #[tokio::test]
    async fn test_execute_maps_sort_enum_both_ways() {
        let schema = books_schema(offset_descriptor());

        let response = schema
            .execute(
                r#"{ books(query: {sortBy: {field: publishedYear, direction: DESC}, limit: 1, offset: 1, filters: null}) {
                    results { id }
                    meta { sortBy { field direction } }
                } }"#,
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"books": {
                "results": [{"id": "1"}],
                "meta": {"sortBy": {"field": "publishedYear", "direction": "DESC"}}
            }})
        );
    }

    #[test]
    fn test_query_input_normalization() {
        let sort_field = create_sort_field_type("Book", &["published_year"]).unwrap();
        let input = async_graphql::Value::from_json(json!({
            "filters": {"title": null, "author": "Lem"},
            "after": null,
            "sortBy": [{"field": "publishedYear", "direction": "ASC"}]
        }))
        .unwrap();

        assert_eq!(
            query_input(Some(input), Some(&sort_field)).unwrap(),
            json!({
                "filters": {"author": "Lem"},
                "sortBy": [{"field": "published_year", "direction": "ASC"}]
            })
        );
        assert_eq!(query_input(None, None).unwrap(), json!({}));
    }

    #[test]
    fn test_result_without_meta_is_explicit_error() {
        let result = ResultSet {
            results: vec![json!({"id": "1"})],
            meta: None,
        };

        let err = result_value(result.clone(), None, true).unwrap_err();
        assert_eq!(err.message, MISSING_META_MESSAGE);

        let value = result_value(result, None, false).unwrap();
        assert_eq!(value.into_json().unwrap(), json!({"results": [{"id": "1"}]}));
    }

    // Test critique: une requête invalide produit une erreur BAD_USER_INPUT avec les violations
    #[tokio::test]
    async fn test_invalid_query_is_bad_user_input() {
        let schema = books_schema(offset_descriptor());

        let response = schema.execute("{ books(query: {limit: 11}) { results { id } } }").await;
        assert_eq!(response.errors.len(), 1);

        let error = &response.errors[0];
        assert!(error.message.starts_with("Invalid query"), "{}", error.message);

        let extensions = serde_json::to_value(&error.extensions).unwrap();
        assert_eq!(extensions["code"], "BAD_USER_INPUT");
        assert_eq!(extensions["violations"][0]["path"], json!(["limit"]));
    }
}
