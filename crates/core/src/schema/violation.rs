//! Field-level validation failures.
//!
//! A [`Violation`] describes one offending path in an input value. Violations
//! are collected into a [`ViolationList`] and returned on the error side of
//! an [`Outcome`], never thrown.

use std::fmt;

use serde::Serialize;

/// Two-branch result of validating untrusted input.
pub type Outcome<T> = Result<T, ViolationList>;

// =============================================================================
// Field Paths
// =============================================================================

/// One step in a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Location of a value inside the validated input, e.g. `sortBy.0.field`.
///
/// Serializes as a segment array (`["sortBy", 0, "field"]`) and displays
/// dotted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The input value itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Child path for an object key.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    /// Child path for an array index.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Re-root this path under `key`.
    pub fn prefixed(&self, key: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(PathSegment::Key(key.into()));
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    /// Parse a dotted path. Purely numeric segments become indexes.
    fn from(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        Self(
            dotted
                .split('.')
                .map(|part| match part.parse::<usize>() {
                    Ok(index) => PathSegment::Index(index),
                    Err(_) => PathSegment::Key(part.to_string()),
                })
                .collect(),
        )
    }
}

// =============================================================================
// Violations
// =============================================================================

/// Machine-readable violation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    Required,
    InvalidType,
    TooSmall,
    TooBig,
    InvalidEnumValue,
    UnrecognizedKey,
    Custom,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::Required => "required",
            ViolationCode::InvalidType => "invalid_type",
            ViolationCode::TooSmall => "too_small",
            ViolationCode::TooBig => "too_big",
            ViolationCode::InvalidEnumValue => "invalid_enum_value",
            ViolationCode::UnrecognizedKey => "unrecognized_key",
            ViolationCode::Custom => "custom",
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: FieldPath,
    pub message: String,
    pub code: ViolationCode,
}

impl Violation {
    pub fn new(path: FieldPath, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            code,
        }
    }

    /// Violation raised by caller-supplied validation logic.
    pub fn custom(path: impl Into<FieldPath>, message: impl Into<String>) -> Self {
        Self::new(path.into(), ViolationCode::Custom, message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Ordered collection of violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ViolationList(Vec<Violation>);

impl ViolationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    /// Violations reported exactly at the given dotted path.
    pub fn for_path(&self, dotted: &str) -> Vec<&Violation> {
        let path = FieldPath::from(dotted);
        self.0.iter().filter(|v| v.path == path).collect()
    }

    /// Re-root every violation under `key`.
    pub fn prefixed(self, key: &str) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|mut v| {
                    v.path = v.path.prefixed(key);
                    v
                })
                .collect(),
        )
    }

    /// `Ok(value)` when nothing was collected.
    pub fn into_outcome<T>(self, value: T) -> Outcome<T> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    pub fn into_inner(self) -> Vec<Violation> {
        self.0
    }
}

impl From<Violation> for ViolationList {
    fn from(violation: Violation) -> Self {
        Self(vec![violation])
    }
}

impl From<Vec<Violation>> for ViolationList {
    fn from(violations: Vec<Violation>) -> Self {
        Self(violations)
    }
}

impl Extend<Violation> for ViolationList {
    fn extend<I: IntoIterator<Item = Violation>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ViolationList {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ViolationList {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ViolationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}
