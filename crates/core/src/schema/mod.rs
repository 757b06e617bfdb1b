//! Structural validation schemas.
//!
//! A small declarative schema language over [`serde_json::Value`]:
//! integers with bounds, strings, enums, nested objects (strict or
//! passthrough), arrays with a minimum length, plus per-field presence
//! rules (required, optional, defaulted).
//!
//! Validation never panics and never stops at the first problem: every
//! offending path contributes one [`Violation`] and the whole list is
//! returned as the error side of an [`Outcome`]. On success the value is
//! returned normalized (defaults applied, integral floats turned into
//! integers, fields in schema order).
//!
//! ```
//! use quarry_core::schema::{ObjectSchema, Schema};
//! use serde_json::json;
//!
//! let schema = ObjectSchema::strict()
//!     .with_default("limit", Schema::integer(1, 100), json!(10));
//!
//! assert_eq!(schema.validate(&json!({})).unwrap(), json!({"limit": 10}));
//! assert!(schema.validate(&json!({"limit": 0})).is_err());
//! ```

mod violation;

pub use violation::{FieldPath, Outcome, PathSegment, Violation, ViolationCode, ViolationList};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Schema Nodes
// =============================================================================

/// Shape expected at one position of the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Any JSON value, passed through untouched.
    Any,
    Boolean,
    /// Any JSON number.
    Number,
    /// Integral number with optional inclusive bounds.
    Integer { min: Option<i64>, max: Option<i64> },
    String,
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    Object(ObjectSchema),
    Array { items: Box<Schema>, min_items: usize },
}

impl Schema {
    /// Integer within `min..=max`.
    pub fn integer(min: i64, max: i64) -> Self {
        Schema::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Integer greater than or equal to `min`.
    pub fn integer_min(min: i64) -> Self {
        Schema::Integer {
            min: Some(min),
            max: None,
        }
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::Enum(values.into_iter().map(Into::into).collect())
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items: 0,
        }
    }

    pub fn non_empty_array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items: 1,
        }
    }

    /// Validate `value` found at `path`, collecting violations.
    ///
    /// Returns the normalized value, or `None` when at least one violation
    /// was recorded for this subtree.
    pub fn check(&self, value: &Value, path: &FieldPath, violations: &mut ViolationList) -> Option<Value> {
        match self {
            Schema::Any => Some(value.clone()),
            Schema::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                other => invalid_type(path, "boolean", other, violations),
            },
            Schema::Number => match value {
                Value::Number(_) => Some(value.clone()),
                other => invalid_type(path, "number", other, violations),
            },
            Schema::Integer { min, max } => check_integer(value, *min, *max, path, violations),
            Schema::String => match value {
                Value::String(_) => Some(value.clone()),
                other => invalid_type(path, "string", other, violations),
            },
            Schema::Enum(options) => check_enum(value, options, path, violations),
            Schema::Object(object) => object.check(value, path, violations),
            Schema::Array { items, min_items } => {
                let Value::Array(elements) = value else {
                    return invalid_type(path, "array", value, violations);
                };

                let before = violations.len();
                if elements.len() < *min_items {
                    violations.push(Violation::new(
                        path.clone(),
                        ViolationCode::TooSmall,
                        format!("Array must contain at least {} element(s)", min_items),
                    ));
                }

                let checked: Vec<Option<Value>> = elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| items.check(element, &path.index(i), violations))
                    .collect();

                if violations.len() > before {
                    return None;
                }
                checked.into_iter().collect::<Option<Vec<_>>>().map(Value::Array)
            }
        }
    }

    /// Validate a whole input value against this schema.
    pub fn validate(&self, value: &Value) -> Outcome<Value> {
        let mut violations = ViolationList::new();
        match self.check(value, &FieldPath::root(), &mut violations) {
            Some(normalized) if violations.is_empty() => Ok(normalized),
            _ => Err(violations),
        }
    }
}

impl From<ObjectSchema> for Schema {
    fn from(object: ObjectSchema) -> Self {
        Schema::Object(object)
    }
}

// =============================================================================
// Object Schemas
// =============================================================================

/// What happens to keys an [`ObjectSchema`] does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeys {
    /// One violation per undeclared key.
    Reject,
    /// Undeclared keys are kept as-is after the declared ones.
    Passthrough,
}

/// Whether a field may be absent, and what it becomes when it is.
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    Required,
    Optional,
    /// Absent fields take this value, which is itself validated.
    Default(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub schema: Schema,
    pub presence: Presence,
}

/// Keyed structure with declared fields in a stable order.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    fields: IndexMap<String, FieldSpec>,
    unknown_keys: UnknownKeys,
}

impl ObjectSchema {
    /// Object rejecting undeclared keys.
    pub fn strict() -> Self {
        Self {
            fields: IndexMap::new(),
            unknown_keys: UnknownKeys::Reject,
        }
    }

    /// Object keeping undeclared keys.
    pub fn passthrough() -> Self {
        Self {
            fields: IndexMap::new(),
            unknown_keys: UnknownKeys::Passthrough,
        }
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn required(self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.field(
            name,
            FieldSpec {
                schema: schema.into(),
                presence: Presence::Required,
            },
        )
    }

    pub fn optional(self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.field(
            name,
            FieldSpec {
                schema: schema.into(),
                presence: Presence::Optional,
            },
        )
    }

    pub fn with_default(self, name: impl Into<String>, schema: impl Into<Schema>, default: Value) -> Self {
        self.field(
            name,
            FieldSpec {
                schema: schema.into(),
                presence: Presence::Default(default),
            },
        )
    }

    pub fn unknown_keys(&self) -> UnknownKeys {
        self.unknown_keys
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Shallow key union. The receiver's unknown-key policy is kept.
    ///
    /// Fails on the first key declared by both sides.
    pub fn merge(mut self, other: ObjectSchema) -> ConfigResult<Self> {
        for (name, spec) in other.fields {
            if self.fields.contains_key(&name) {
                return Err(ConfigError::DuplicateQueryField(name));
            }
            self.fields.insert(name, spec);
        }
        Ok(self)
    }

    pub fn check(&self, value: &Value, path: &FieldPath, violations: &mut ViolationList) -> Option<Value> {
        let Value::Object(input) = value else {
            return invalid_type(path, "object", value, violations);
        };

        let before = violations.len();
        let mut output = Map::with_capacity(input.len().max(self.fields.len()));

        for (name, spec) in &self.fields {
            let field_path = path.key(name.as_str());
            match (input.get(name), &spec.presence) {
                (Some(raw), _) => {
                    if let Some(checked) = spec.schema.check(raw, &field_path, violations) {
                        output.insert(name.clone(), checked);
                    }
                }
                (None, Presence::Required) => {
                    violations.push(Violation::new(field_path, ViolationCode::Required, "Required"));
                }
                (None, Presence::Optional) => {}
                (None, Presence::Default(default)) => {
                    if let Some(checked) = spec.schema.check(default, &field_path, violations) {
                        output.insert(name.clone(), checked);
                    }
                }
            }
        }

        for (key, raw) in input {
            if self.fields.contains_key(key) {
                continue;
            }
            match self.unknown_keys {
                UnknownKeys::Reject => violations.push(Violation::new(
                    path.key(key.as_str()),
                    ViolationCode::UnrecognizedKey,
                    format!("Unrecognized key '{}'", key),
                )),
                UnknownKeys::Passthrough => {
                    output.insert(key.clone(), raw.clone());
                }
            }
        }

        if violations.len() > before {
            None
        } else {
            Some(Value::Object(output))
        }
    }

    pub fn validate(&self, value: &Value) -> Outcome<Value> {
        let mut violations = ViolationList::new();
        match self.check(value, &FieldPath::root(), &mut violations) {
            Some(normalized) if violations.is_empty() => Ok(normalized),
            _ => Err(violations),
        }
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid_type(path: &FieldPath, expected: &str, received: &Value, violations: &mut ViolationList) -> Option<Value> {
    violations.push(Violation::new(
        path.clone(),
        ViolationCode::InvalidType,
        format!("Expected {}, received {}", expected, type_name(received)),
    ));
    None
}

fn check_integer(
    value: &Value,
    min: Option<i64>,
    max: Option<i64>,
    path: &FieldPath,
    violations: &mut ViolationList,
) -> Option<Value> {
    let Value::Number(number) = value else {
        return invalid_type(path, "integer", value, violations);
    };

    // i128 covers both the i64 and u64 ranges of a JSON integer.
    let parsed = if let Some(i) = number.as_i64() {
        Some(i128::from(i))
    } else if let Some(u) = number.as_u64() {
        Some(i128::from(u))
    } else {
        number
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i128)
    };

    let Some(parsed) = parsed else {
        return invalid_type(path, "integer", value, violations);
    };

    if let Some(min) = min.filter(|min| parsed < i128::from(*min)) {
        violations.push(Violation::new(
            path.clone(),
            ViolationCode::TooSmall,
            format!("Number must be greater than or equal to {}", min),
        ));
        return None;
    }
    if let Some(max) = max.filter(|max| parsed > i128::from(*max)) {
        violations.push(Violation::new(
            path.clone(),
            ViolationCode::TooBig,
            format!("Number must be less than or equal to {}", max),
        ));
        return None;
    }

    match i64::try_from(parsed) {
        Ok(i) => Some(Value::from(i)),
        Err(_) => u64::try_from(parsed).ok().map(Value::from),
    }
}

fn check_enum(value: &Value, options: &[String], path: &FieldPath, violations: &mut ViolationList) -> Option<Value> {
    let expected = || {
        options
            .iter()
            .map(|o| format!("'{}'", o))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    match value {
        Value::String(s) if options.iter().any(|o| o == s) => Some(value.clone()),
        Value::String(s) => {
            violations.push(Violation::new(
                path.clone(),
                ViolationCode::InvalidEnumValue,
                format!("Invalid enum value. Expected {}, received '{}'", expected(), s),
            ));
            None
        }
        other => {
            violations.push(Violation::new(
                path.clone(),
                ViolationCode::InvalidType,
                format!("Expected {}, received {}", expected(), type_name(other)),
            ));
            None
        }
    }
}
