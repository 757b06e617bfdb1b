//! GraphQL type factories.
//!
//! Each `create_*` function projects one part of a query configuration into
//! `async_graphql::dynamic` types. Names derive from a base name, usually the
//! entity type name:
//!
//! | type | name |
//! |---|---|
//! | query input | `{Base}_Query` |
//! | sort input | `{Base}_Query_Sort_Input` |
//! | sortable fields enum | `{Base}_Sort_Field` |
//! | result | `{Base}_Result` |
//! | result meta | `{Base}_Result_Meta` |
//! | result sort | `{Base}_Result_Sort` |

use async_graphql::Value;
use async_graphql::dynamic::{Enum, EnumItem, Field, InputObject, InputValue, Object, Scalar, TypeRef};
use convert_case::{Case, Casing};

use quarry_core::error::{ConfigError, ConfigResult};
use quarry_core::models::{Pagination, SortDirection};

use crate::values::value_field;

pub const SORT_DIRECTION_TYPE: &str = "SortDirection";
pub const POSITIVE_INT_TYPE: &str = "PositiveInt";
pub const NON_NEGATIVE_INT_TYPE: &str = "NonNegativeInt";

// =============================================================================
// Type Sources
// =============================================================================

/// A type that knows its GraphQL name.
pub trait NamedType {
    fn type_name(&self) -> &str;
}

impl NamedType for Object {
    fn type_name(&self) -> &str {
        Object::type_name(self)
    }
}

impl NamedType for InputObject {
    fn type_name(&self) -> &str {
        InputObject::type_name(self)
    }
}

/// Where a type used by a query projection comes from.
pub enum TypeSource<T> {
    /// Already registered in the schema under this name.
    Named(String),
    /// Owned by the projection, registered along with its other types.
    Composed(T),
}

/// Entity type listed in `results`.
pub type EntityType = TypeSource<Object>;

/// Input type of `filters`.
pub type FiltersType = TypeSource<InputObject>;

impl<T: NamedType> TypeSource<T> {
    pub fn named(name: impl Into<String>) -> Self {
        TypeSource::Named(name.into())
    }

    pub fn type_name(&self) -> &str {
        match self {
            TypeSource::Named(name) => name,
            TypeSource::Composed(ty) => ty.type_name(),
        }
    }

    /// `T`
    pub fn nullable(&self) -> TypeRef {
        TypeRef::named(self.type_name())
    }

    /// `T!`
    pub fn non_null(&self) -> TypeRef {
        TypeRef::named_nn(self.type_name())
    }

    /// `[T!]!`
    pub fn non_null_list(&self) -> TypeRef {
        TypeRef::named_nn_list_nn(self.type_name())
    }

    /// The owned type to register, if any.
    pub fn into_composed(self) -> Option<T> {
        match self {
            TypeSource::Named(_) => None,
            TypeSource::Composed(ty) => Some(ty),
        }
    }
}

impl<T> From<T> for TypeSource<T> {
    fn from(ty: T) -> Self {
        TypeSource::Composed(ty)
    }
}

// =============================================================================
// Shared Types
// =============================================================================

/// `SortDirection` enum: `ASC`, `DESC`.
pub fn sort_direction_type() -> Enum {
    SortDirection::ALL
        .iter()
        .fold(Enum::new(SORT_DIRECTION_TYPE), |ty, direction| ty.item(direction.as_str()))
}

/// `PositiveInt` scalar: integers greater than 0.
pub fn positive_int_type() -> Scalar {
    Scalar::new(POSITIVE_INT_TYPE)
        .description("Integers that will have a value greater than 0.")
        .validator(|value| matches!(value, Value::Number(n) if n.as_i64().is_some_and(|i| i > 0)))
}

/// `NonNegativeInt` scalar: integers greater than or equal to 0.
pub fn non_negative_int_type() -> Scalar {
    Scalar::new(NON_NEGATIVE_INT_TYPE)
        .description("Integers that will have a value of 0 or more.")
        .validator(|value| matches!(value, Value::Number(n) if n.as_i64().is_some_and(|i| i >= 0)))
}

// =============================================================================
// Sorting
// =============================================================================

/// `{Base}_Sort_Field` enum with camel-cased item names.
///
/// Keeps the mapping between GraphQL item names and raw field identifiers
/// in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortFieldType {
    name: String,
    /// `(graphql name, raw field)` in declaration order.
    items: Vec<(String, String)>,
}

impl SortFieldType {
    pub fn type_name(&self) -> &str {
        &self.name
    }

    /// Raw field identifier of a GraphQL item name.
    pub fn to_raw<'a>(&'a self, item: &'a str) -> &'a str {
        self.items
            .iter()
            .find(|(graphql, _)| graphql == item)
            .map(|(_, raw)| raw.as_str())
            .unwrap_or(item)
    }

    /// GraphQL item name of a raw field identifier.
    pub fn to_graphql<'a>(&'a self, raw: &'a str) -> &'a str {
        self.items
            .iter()
            .find(|(_, r)| r == raw)
            .map(|(graphql, _)| graphql.as_str())
            .unwrap_or(raw)
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(g, r)| (g.as_str(), r.as_str()))
    }

    pub fn to_enum(&self) -> Enum {
        self.items.iter().fold(Enum::new(&self.name), |ty, (graphql, raw)| {
            ty.item(EnumItem::new(graphql.as_str()).description(format!("Sort by `{}`", raw)))
        })
    }
}

/// Build the sortable fields enum of `base_name`.
pub fn create_sort_field_type<S: AsRef<str>>(base_name: &str, sortable_fields: &[S]) -> ConfigResult<SortFieldType> {
    if sortable_fields.is_empty() {
        return Err(ConfigError::EmptySortableFields);
    }

    Ok(SortFieldType {
        name: format!("{}_Sort_Field", base_name),
        items: sortable_fields
            .iter()
            .map(|raw| (raw.as_ref().to_case(Case::Camel), raw.as_ref().to_string()))
            .collect(),
    })
}

/// `{Base}_Query_Sort_Input` plus the argument type: `T` for single
/// sorting, `[T!]` for multi sorting.
pub fn create_input_sort_type(base_name: &str, sort_field: &SortFieldType, is_multi: bool) -> (InputObject, TypeRef) {
    let name = format!("{}_Query_Sort_Input", base_name);
    let input = InputObject::new(&name)
        .field(InputValue::new("direction", TypeRef::named_nn(SORT_DIRECTION_TYPE)))
        .field(InputValue::new("field", TypeRef::named_nn(sort_field.type_name())));

    let type_ref = if is_multi {
        TypeRef::named_nn_list(&name)
    } else {
        TypeRef::named(&name)
    };
    (input, type_ref)
}

/// `{Base}_Result_Sort` plus the field type: `T!` for single sorting,
/// `[T!]!` for multi sorting.
pub fn create_result_sort_type(base_name: &str, sort_field: &SortFieldType, is_multi: bool) -> (Object, TypeRef) {
    let name = format!("{}_Result_Sort", base_name);
    let object = Object::new(&name)
        .field(value_field("direction", TypeRef::named_nn(SORT_DIRECTION_TYPE)))
        .field(value_field("field", TypeRef::named_nn(sort_field.type_name())));

    let type_ref = if is_multi {
        TypeRef::named_nn_list_nn(&name)
    } else {
        TypeRef::named_nn(&name)
    };
    (object, type_ref)
}

// =============================================================================
// Query and Result
// =============================================================================

/// `{Base}_Query` input: `filters`, optional `sortBy`, pagination fields.
pub fn create_query_type(
    base_name: &str,
    filters: TypeRef,
    sort_by: Option<TypeRef>,
    pagination: Option<&Pagination>,
) -> InputObject {
    let mut input = InputObject::new(format!("{}_Query", base_name)).field(InputValue::new("filters", filters));

    if let Some(sort_by) = sort_by {
        input = input.field(InputValue::new("sortBy", sort_by));
    }

    match pagination {
        Some(Pagination::ByOffset(_)) => input
            .field(InputValue::new("limit", TypeRef::named(POSITIVE_INT_TYPE)))
            .field(InputValue::new("offset", TypeRef::named(NON_NEGATIVE_INT_TYPE))),
        Some(Pagination::ByCursor(_)) => input
            .field(InputValue::new("limit", TypeRef::named(POSITIVE_INT_TYPE)))
            .field(InputValue::new("after", TypeRef::named(TypeRef::STRING)))
            .field(InputValue::new("before", TypeRef::named(TypeRef::STRING))),
        None => input,
    }
}

/// `{Base}_Result_Meta`, or `None` when it would have no fields.
pub fn create_result_meta_type(
    base_name: &str,
    pagination: Option<&Pagination>,
    sort_by: Option<TypeRef>,
    extra_fields: Vec<Field>,
) -> Option<Object> {
    let mut fields = Vec::new();

    match pagination {
        Some(Pagination::ByOffset(_)) => {
            fields.push(value_field("limit", TypeRef::named_nn(POSITIVE_INT_TYPE)));
            fields.push(value_field("offset", TypeRef::named_nn(NON_NEGATIVE_INT_TYPE)));
        }
        Some(Pagination::ByCursor(_)) => {
            fields.push(value_field("limit", TypeRef::named_nn(POSITIVE_INT_TYPE)));
            fields.push(value_field("nextPage", TypeRef::named(TypeRef::STRING)));
            fields.push(value_field("previousPage", TypeRef::named(TypeRef::STRING)));
        }
        None => {}
    }
    if let Some(sort_by) = sort_by {
        fields.push(value_field("sortBy", sort_by));
    }
    fields.extend(extra_fields);

    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .into_iter()
            .fold(Object::new(format!("{}_Result_Meta", base_name)), Object::field),
    )
}

/// `{Base}_Result` with `results: [Entity!]!` and, when present, `meta: {Base}_Result_Meta!`.
pub fn create_result_type(base_name: &str, results: TypeRef, meta_type: Option<&str>) -> Object {
    let object = Object::new(format!("{}_Result", base_name)).field(value_field("results", results));
    match meta_type {
        Some(meta) => object.field(value_field("meta", TypeRef::named_nn(meta))),
        None => object,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field_type_camel_cases_items() {
        let ty = create_sort_field_type("Book", &["last_name", "id", "createdAt"]).unwrap();
        assert_eq!(ty.type_name(), "Book_Sort_Field");
        assert_eq!(
            ty.items().collect::<Vec<_>>(),
            [("lastName", "last_name"), ("id", "id"), ("createdAt", "createdAt")]
        );
        assert_eq!(ty.to_raw("lastName"), "last_name");
        assert_eq!(ty.to_graphql("last_name"), "lastName");
    }

    #[test]
    fn test_sort_field_type_requires_fields() {
        let empty: [&str; 0] = [];
        assert_eq!(create_sort_field_type("Book", &empty), Err(ConfigError::EmptySortableFields));
    }

    #[test]
    fn test_input_and_result_sort_wrapping() {
        let field = create_sort_field_type("Book", &["id"]).unwrap();

        let (input, single) = create_input_sort_type("Book", &field, false);
        assert_eq!(input.type_name(), "Book_Query_Sort_Input");
        assert_eq!(single.to_string(), "Book_Query_Sort_Input");
        let (_, multi) = create_input_sort_type("Book", &field, true);
        assert_eq!(multi.to_string(), "[Book_Query_Sort_Input!]");

        let (_, single) = create_result_sort_type("Book", &field, false);
        assert_eq!(single.to_string(), "Book_Result_Sort!");
        let (_, multi) = create_result_sort_type("Book", &field, true);
        assert_eq!(multi.to_string(), "[Book_Result_Sort!]!");
    }

    #[test]
    fn test_meta_type_absent_without_fields() {
        assert!(create_result_meta_type("Book", None, None, Vec::new()).is_none());
        let meta = create_result_meta_type("Book", None, None, vec![value_field("total", TypeRef::named_nn(TypeRef::INT))]);
        assert_eq!(meta.map(|m| m.type_name().to_string()).as_deref(), Some("Book_Result_Meta"));
    }

    #[test]
    fn test_type_source_wrapping() {
        let named: EntityType = TypeSource::named("Book");
        assert_eq!(named.non_null_list().to_string(), "[Book!]!");
        assert!(named.into_composed().is_none());

        let composed: EntityType = Object::new("Author").into();
        assert_eq!(composed.non_null().to_string(), "Author!");
        assert!(composed.into_composed().is_some());
    }
}
