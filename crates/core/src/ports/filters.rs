//! Port trait for caller-supplied filter validation.
//!
//! A [`FiltersValidator`] runs after the structural schema accepted the
//! whole query. It only sees the `filters` object and may rewrite it.
//! Violation paths it reports are relative to `filters`; the descriptor
//! re-roots them.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use crate::schema::Outcome;

/// Validates and normalizes the `filters` part of a query.
#[async_trait]
pub trait FiltersValidator: Send + Sync {
    /// Returns the filters to keep, or the violations to report.
    ///
    /// The returned value must be a JSON object.
    async fn validate(&self, filters: Value) -> Outcome<Value>;
}

// -----------------------------------------------------------------------------
// Closure adapters
// -----------------------------------------------------------------------------

/// [`FiltersValidator`] backed by a synchronous closure.
pub struct FnFiltersValidator<F> {
    f: F,
}

#[async_trait]
impl<F> FiltersValidator for FnFiltersValidator<F>
where
    F: Fn(Value) -> Outcome<Value> + Send + Sync,
{
    async fn validate(&self, filters: Value) -> Outcome<Value> {
        (self.f)(filters)
    }
}

/// Wrap a synchronous closure as a [`FiltersValidator`].
///
/// ```
/// use quarry_core::ports::filters_validator_fn;
/// use quarry_core::schema::Violation;
///
/// let validator = filters_validator_fn(|filters| {
///     if filters.get("year").is_some_and(|y| !y.is_u64()) {
///         return Err(Violation::custom("year", "Year must be a positive integer").into());
///     }
///     Ok(filters)
/// });
/// # let _ = validator;
/// ```
pub fn filters_validator_fn<F>(f: F) -> FnFiltersValidator<F>
where
    F: Fn(Value) -> Outcome<Value> + Send + Sync,
{
    FnFiltersValidator { f }
}

/// [`FiltersValidator`] backed by an async closure.
pub struct AsyncFnFiltersValidator<F, Fut> {
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> FiltersValidator for AsyncFnFiltersValidator<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<Value>> + Send,
{
    async fn validate(&self, filters: Value) -> Outcome<Value> {
        (self.f)(filters).await
    }
}

/// Wrap an async closure as a [`FiltersValidator`].
pub fn async_filters_validator_fn<F, Fut>(f: F) -> AsyncFnFiltersValidator<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<Value>> + Send,
{
    AsyncFnFiltersValidator {
        f,
        _future: PhantomData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Violation;
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_adapter() {
        let validator = filters_validator_fn(|mut filters: Value| {
            if let Some(obj) = filters.as_object_mut() {
                obj.insert("normalized".into(), json!(true));
            }
            Ok(filters)
        });

        let out = validator.validate(json!({"a": 1})).await.unwrap();
        assert_eq!(out, json!({"a": 1, "normalized": true}));
    }

    #[tokio::test]
    async fn test_async_adapter_reports_violations() {
        let validator = async_filters_validator_fn(|filters: Value| async move {
            if filters.get("author").is_none() {
                return Err(Violation::custom("author", "Required").into());
            }
            Ok(filters)
        });

        let err = validator.validate(json!({})).await.unwrap_err();
        assert_eq!(err.for_path("author").len(), 1);
    }
}
