//! Dynamic schema assembly.

use async_graphql::dynamic::{Schema, SchemaBuilder, SchemaError};

use crate::types::{non_negative_int_type, positive_int_type, sort_direction_type};

// -----------------------------------------------------------------------------
// Schema Configuration
// -----------------------------------------------------------------------------

/// Maximum query depth.
/// Note: GraphQL introspection requires depth ~13, so we use 15 to allow it.
pub const MAX_QUERY_DEPTH: usize = 15;

/// Maximum query complexity score.
/// Each field has a default complexity of 1, nested objects multiply.
pub const MAX_QUERY_COMPLEXITY: usize = 500;

// -----------------------------------------------------------------------------
// Schema Builder
// -----------------------------------------------------------------------------

/// Schema builder with the types shared by every query projection:
/// `SortDirection`, `PositiveInt` and `NonNegativeInt`.
///
/// Register each [`GraphQLQueryBuilder`](crate::GraphQLQueryBuilder) and
/// the root query object on it, then call [`build_schema`].
pub fn schema_builder(query_type: &str) -> SchemaBuilder {
    Schema::build(query_type, None, None)
        .register(sort_direction_type())
        .register(positive_int_type())
        .register(non_negative_int_type())
}

/// Finish a schema with query depth and complexity limits.
pub fn build_schema(builder: SchemaBuilder) -> Result<Schema, SchemaError> {
    builder
        .limit_depth(MAX_QUERY_DEPTH)
        .limit_complexity(MAX_QUERY_COMPLEXITY)
        .finish()
}
