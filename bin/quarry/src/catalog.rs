//! In-memory book catalog served by the demo.
//!
//! Queries run through an [`Engine`]: the context starts as the whole
//! catalog, `filter_books` and `sort_books` narrow and order it, and the
//! result factory cuts the requested page.

use std::cmp::Ordering;
use std::sync::Arc;

use async_graphql::Context;
use async_graphql::dynamic::{InputObject, InputValue, Object, Schema, TypeRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use quarry_core::error::{EngineError, EngineResult};
use quarry_core::models::{PaginationOptions, Query, ResultOptions, ResultSet, SortDirection, SortField};
use quarry_core::ports::filters_validator_fn;
use quarry_core::schema::{ObjectSchema, Outcome, Schema as InputSchema, Violation};
use quarry_core::QueryDescriptor;
use quarry_engine::{Engine, Middleware, Next, QueryContext, QueryRunner};
use quarry_graphql::{
    Fetcher, GraphQLQueryBuilder, GraphQLQueryOptions, NON_NEGATIVE_INT_TYPE, build_schema, schema_builder, value_field,
};

/// Raw identifiers of the sortable book fields.
pub const SORTABLE_FIELDS: [&str; 3] = ["title", "author", "published_year"];

/// Meta entry holding the number of matches before pagination.
pub const TOTAL_META_FIELD: &str = "total";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub published_year: u32,
}

impl Book {
    fn new(id: u32, title: &str, author: &str, published_year: u32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            published_year,
        }
    }

    /// Order by a raw sortable field. Unknown fields compare equal.
    fn compare(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "title" => self.title.cmp(&other.title),
            "author" => self.author.cmp(&other.author),
            "published_year" => self.published_year.cmp(&other.published_year),
            _ => Ordering::Equal,
        }
    }
}

/// Catalog the demo starts with.
pub fn seed() -> Arc<[Book]> {
    [
        Book::new(1, "A Wizard of Earthsea", "Ursula K. Le Guin", 1968),
        Book::new(2, "Dune", "Frank Herbert", 1965),
        Book::new(3, "Foundation", "Isaac Asimov", 1951),
        Book::new(4, "Hyperion", "Dan Simmons", 1989),
        Book::new(5, "Neuromancer", "William Gibson", 1984),
        Book::new(6, "Solaris", "Stanisław Lem", 1961),
        Book::new(7, "The Dispossessed", "Ursula K. Le Guin", 1974),
        Book::new(8, "The Left Hand of Darkness", "Ursula K. Le Guin", 1969),
    ]
    .into()
}

// =============================================================================
// Query Type
// =============================================================================

/// Validated `filters` of a book query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookFilters {
    /// Lower-cased substring of the title.
    title: Option<String>,
    author: Option<String>,
    /// Strict lower bound on the publication year.
    published_after: Option<u32>,
}

impl BookFilters {
    fn matches(&self, book: &Book) -> bool {
        self.title
            .as_deref()
            .is_none_or(|title| book.title.to_lowercase().contains(title))
            && self.author.as_deref().is_none_or(|author| book.author == author)
            && self.published_after.is_none_or(|year| book.published_year > year)
    }
}

/// Trim and lower-case the title filter, reject blank authors.
fn normalize_filters(mut filters: Value) -> Outcome<Value> {
    if let Some(Value::String(author)) = filters.get("author")
        && author.trim().is_empty()
    {
        return Err(Violation::custom("author", "Author must not be blank").into());
    }
    if let Some(Value::String(title)) = filters.get_mut("title") {
        *title = title.trim().to_lowercase();
    }
    Ok(filters)
}

/// Book query type: offset pagination, single sorting, title by default.
pub fn descriptor(limits: PaginationOptions) -> QueryDescriptor {
    QueryDescriptor::new()
        .offset_pagination(limits)
        .single_sorting(SORTABLE_FIELDS, SortField::asc("title"))
        .filters_schema(
            ObjectSchema::strict()
                .optional("title", InputSchema::String)
                .optional("author", InputSchema::String)
                .optional("publishedAfter", InputSchema::integer(0, i64::from(u32::MAX))),
        )
        .filters_validator(filters_validator_fn(normalize_filters))
}

// =============================================================================
// Engine
// =============================================================================

type BookContext = QueryContext<Query, Vec<Book>>;
type BookResult = ResultSet<Value>;

struct FilterBooks;

#[async_trait]
impl Middleware<BookContext, BookResult> for FilterBooks {
    async fn handle(&self, mut ctx: BookContext, next: Next<BookContext, BookResult>) -> EngineResult<BookResult> {
        let filters: BookFilters = ctx.query.filters_as().map_err(EngineError::handler)?;
        ctx.data.retain(|book| filters.matches(book));
        next.run(ctx).await
    }

    fn name(&self) -> &str {
        "filter_books"
    }
}

struct SortBooks;

#[async_trait]
impl Middleware<BookContext, BookResult> for SortBooks {
    async fn handle(&self, mut ctx: BookContext, next: Next<BookContext, BookResult>) -> EngineResult<BookResult> {
        let fields = ctx.query.sort_fields().to_vec();
        ctx.data.sort_by(|a, b| {
            fields
                .iter()
                .map(|sort| match sort.direction {
                    SortDirection::Asc => a.compare(b, &sort.field),
                    SortDirection::Desc => a.compare(b, &sort.field).reverse(),
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        next.run(ctx).await
    }

    fn name(&self) -> &str {
        "sort_books"
    }
}

/// Cut the requested page and wrap it, counting matches in `meta.total`.
fn paginate(ctx: BookContext, descriptor: &QueryDescriptor) -> EngineResult<BookResult> {
    let QueryContext { query, data: books } = ctx;
    let total = books.len();

    let offset = usize::try_from(query.offset().unwrap_or(0)).unwrap_or(usize::MAX);
    let limit = query.limit().map_or(usize::MAX, |limit| limit as usize);
    let results = books
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(EngineError::handler)?;

    let mut result = descriptor.create_result(ResultOptions::new(results, query))?;
    if let Some(meta) = result.meta.as_mut() {
        meta.insert(TOTAL_META_FIELD, total);
    }
    Ok(result)
}

pub fn engine(books: Arc<[Book]>, descriptor: Arc<QueryDescriptor>) -> Engine<Query, Vec<Book>, BookResult> {
    let mut engine = Engine::with_context_factory(move |_query: &Query| books.to_vec());
    engine
        .register(FilterBooks)
        .register(SortBooks)
        .use_result_factory(move |ctx: BookContext| {
            let descriptor = descriptor.clone();
            async move { paginate(ctx, &descriptor) }
        });
    engine
}

// =============================================================================
// GraphQL
// =============================================================================

/// [`Fetcher`] delegating to a query runner.
pub struct RunnerFetcher {
    runner: Arc<dyn QueryRunner<Query, BookResult>>,
}

impl RunnerFetcher {
    pub fn new(runner: Arc<dyn QueryRunner<Query, BookResult>>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Fetcher for RunnerFetcher {
    async fn fetch(&self, query: Query, _ctx: &Context<'_>) -> async_graphql::Result<BookResult> {
        self.runner.run(query).await.map_err(|e| {
            error!(code = e.code(), error = %e, "❌ Catalog query failed");
            async_graphql::Error::new(e.to_string())
        })
    }
}

fn book_type() -> Object {
    Object::new("Book")
        .description("A catalog entry.")
        .field(value_field("id", TypeRef::named_nn(TypeRef::ID)))
        .field(value_field("title", TypeRef::named_nn(TypeRef::STRING)))
        .field(value_field("author", TypeRef::named_nn(TypeRef::STRING)))
        .field(value_field("publishedYear", TypeRef::named_nn(TypeRef::INT)))
}

fn filters_type() -> InputObject {
    InputObject::new("Book_Filters")
        .field(InputValue::new("title", TypeRef::named(TypeRef::STRING)).description("Case-insensitive title substring"))
        .field(InputValue::new("author", TypeRef::named(TypeRef::STRING)).description("Exact author name"))
        .field(InputValue::new("publishedAfter", TypeRef::named(NON_NEGATIVE_INT_TYPE)))
}

/// Schema exposing `books(query: Book_Query): Book_Result!`.
pub fn build_catalog_schema(books: Arc<[Book]>, limits: PaginationOptions) -> anyhow::Result<Schema> {
    let descriptor = Arc::new(descriptor(limits));
    let fetcher = RunnerFetcher::new(engine(books, descriptor.clone()).into_query_runner());

    let books = GraphQLQueryBuilder::new(descriptor, GraphQLQueryOptions::new(book_type(), filters_type(), fetcher))?
        .use_extra_meta_fields([value_field(TOTAL_META_FIELD, TypeRef::named_nn(NON_NEGATIVE_INT_TYPE))]);
    let query = books.attach_query_field(Object::new("Query"), "books");

    build_schema(books.register(schema_builder("Query")).register(query))
        .map_err(|e| anyhow::anyhow!("Failed to build GraphQL schema: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        build_catalog_schema(seed(), PaginationOptions::new().default_limit(3).max_limit(5)).unwrap()
    }

    async fn execute(query: &str) -> async_graphql::Response {
        schema().execute(query).await
    }

    #[tokio::test]
    async fn test_default_page() {
        let response = execute("{ books { results { title } meta { limit offset total sortBy { field direction } } } }").await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"books": {
                "results": [{"title": "A Wizard of Earthsea"}, {"title": "Dune"}, {"title": "Foundation"}],
                "meta": {"limit": 3, "offset": 0, "total": 8, "sortBy": {"field": "title", "direction": "ASC"}}
            }})
        );
    }

    #[tokio::test]
    async fn test_filters_and_sorting() {
        let response = execute(
            r#"{ books(query: {
                filters: {author: "Ursula K. Le Guin", publishedAfter: 1968},
                sortBy: {field: publishedYear, direction: DESC}
            }) { results { title publishedYear } meta { total } } }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"books": {
                "results": [
                    {"title": "The Dispossessed", "publishedYear": 1974},
                    {"title": "The Left Hand of Darkness", "publishedYear": 1969}
                ],
                "meta": {"total": 2}
            }})
        );
    }

    #[tokio::test]
    async fn test_title_filter_is_normalized() {
        let response = execute(r#"{ books(query: {filters: {title: "  EARTH "}}) { results { id } } }"#).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(response.data.into_json().unwrap(), json!({"books": {"results": [{"id": "1"}]}}));
    }

    #[tokio::test]
    async fn test_offset_past_end() {
        let response = execute("{ books(query: {offset: 7, limit: 5}) { results { id } meta { offset total } } }").await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"books": {"results": [{"id": "8"}], "meta": {"offset": 7, "total": 8}}})
        );
    }

    // Test critique: les violations du validateur de filtres sont préfixées par "filters"
    #[tokio::test]
    async fn test_blank_author_rejected() {
        let response = execute(r#"{ books(query: {filters: {author: "  "}}) { results { id } } }"#).await;
        assert_eq!(response.errors.len(), 1);

        let extensions = serde_json::to_value(&response.errors[0].extensions).unwrap();
        assert_eq!(extensions["code"], "BAD_USER_INPUT");
        assert_eq!(extensions["violations"][0]["path"], json!(["filters", "author"]));
    }

    #[tokio::test]
    async fn test_published_after_out_of_range_rejected() {
        let response = execute("{ books(query: {filters: {publishedAfter: 4294967296}}) { results { id } } }").await;
        assert_eq!(response.errors.len(), 1);

        let extensions = serde_json::to_value(&response.errors[0].extensions).unwrap();
        assert_eq!(extensions["code"], "BAD_USER_INPUT");
        assert_eq!(extensions["violations"][0]["path"], json!(["filters", "publishedAfter"]));
        assert_eq!(extensions["violations"][0]["code"], "too_big");
    }

    #[tokio::test]
    async fn test_limit_above_max_rejected() {
        let response = execute("{ books(query: {limit: 6}) { results { id } } }").await;
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].message.contains("limit"), "{}", response.errors[0].message);
    }
}
