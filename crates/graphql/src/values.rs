//! Value-backed objects.
//!
//! Result envelopes reach the schema as plain [`Value`] trees. Fields of
//! the generated object types read their entry from the parent value.

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, TypeRef};
use async_graphql::{Name, Value};

/// Field resolving to the `name` entry of its parent object value.
///
/// Missing entries and `null` resolve to `null`. Useful for entity types
/// whose instances come from JSON documents.
pub fn value_field(name: impl Into<String>, ty: impl Into<TypeRef>) -> Field {
    let name = name.into();
    let key = Name::new(&name);

    Field::new(name, ty, move |ctx| {
        let entry = match ctx.parent_value.as_value() {
            Some(Value::Object(map)) => map.get(&key).cloned(),
            _ => None,
        };
        FieldFuture::new(async move {
            Ok(match entry {
                None | Some(Value::Null) => None,
                Some(value) => Some(into_field_value(value)),
            })
        })
    })
}

/// Wrap a value, splitting lists so that object items resolve one by one.
pub fn into_field_value(value: Value) -> FieldValue<'static> {
    match value {
        Value::List(items) => FieldValue::list(items.into_iter().map(into_field_value)),
        other => FieldValue::value(other),
    }
}

/// Convert a JSON document to a GraphQL value.
pub fn from_json(value: serde_json::Value) -> async_graphql::Result<Value> {
    Ok(Value::from_json(value)?)
}
