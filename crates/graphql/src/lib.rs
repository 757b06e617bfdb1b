//! GraphQL projection of quarry query descriptors.
//!
//! A [`GraphQLQueryBuilder`] derives the input and output types of one query
//! field from a [`QueryDescriptor`](quarry_core::QueryDescriptor) and
//! resolves it through a [`Fetcher`]. Types are built with
//! `async_graphql::dynamic`, so one schema can host any number of
//! projections.
//!
//! # Building a Schema
//!
//! ```ignore
//! use async_graphql::dynamic::Object;
//! use quarry_graphql::{build_schema, schema_builder, GraphQLQueryBuilder, GraphQLQueryOptions};
//!
//! let books = GraphQLQueryBuilder::new(descriptor, GraphQLQueryOptions::new(book, filters, fetcher))?;
//! let query = books.attach_query_field(Object::new("Query"), "books");
//!
//! let schema = build_schema(books.register(schema_builder("Query")).register(query))?;
//! ```

mod builder;
mod schema;
mod server;
mod types;
mod values;

pub use builder::{
    BAD_USER_INPUT, Fetcher, GraphQLQueryBuilder, GraphQLQueryOptions, INVALID_QUERY_MESSAGE, MISSING_META_MESSAGE,
    QUERY_ARGUMENT,
};
pub use schema::{MAX_QUERY_COMPLEXITY, MAX_QUERY_DEPTH, build_schema, schema_builder};
pub use server::{ServerConfig, router, serve, serve_with_shutdown};
pub use types::{
    EntityType, FiltersType, NON_NEGATIVE_INT_TYPE, NamedType, POSITIVE_INT_TYPE, SORT_DIRECTION_TYPE, SortFieldType,
    TypeSource, create_input_sort_type, create_query_type, create_result_meta_type, create_result_sort_type,
    create_result_type, create_sort_field_type, non_negative_int_type, positive_int_type, sort_direction_type,
};
pub use values::{from_json, into_field_value, value_field};
