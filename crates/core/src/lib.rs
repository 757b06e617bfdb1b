//! Core query layer for quarry.
//!
//! This crate turns a small declarative query configuration (filters,
//! pagination mode, sorting mode) into a validation function for incoming
//! query objects and a builder for outgoing result envelopes. It has no
//! knowledge of any transport or data store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      quarry (binary)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │        quarry-graphql          │       quarry-engine        │
//! │   (GraphQL projection, API)    │   (middleware pipeline)    │
//! ├────────────────────────────────┴────────────────────────────┤
//! │                     quarry-core  ← YOU ARE HERE             │
//! │          (schema, models, ports, services, errors)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`schema`] - Structural validation schemas and violations
//! - [`models`] - Configuration, query and result types
//! - [`ports`] - Interface traits for caller-supplied logic
//! - [`services`] - Query compiler, descriptor and result assembly
//! - [`error`] - Error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Descriptors
//!
//! A [`services::QueryDescriptor`] holds the configuration of one query
//! type. Its first use seals the configuration (cross-field invariants are
//! checked) and compiles one merged schema, which is cached until the
//! descriptor is reconfigured.
//!
//! ## Outcomes
//!
//! Validating a query never fails with an error for bad input. Bad input is
//! an [`schema::Outcome`] whose error side lists every offending path.
//! Errors ([`error::ConfigError`]) are reserved for misconfigured
//! descriptors.
//!
//! ## Query Lifecycle
//!
//! 1. Validate and default the raw input into a typed [`models::Query`]
//! 2. Run the optional filters validator on `filters`
//! 3. Fetch entities (caller code)
//! 4. Wrap them with the pagination and sorting echo

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod schema;
pub mod services;

pub use error::{ConfigError, EngineError, QueryError, ValidationError};
pub use models::{Query, ResultOptions, ResultSet, SortBy, SortDirection, SortField};
pub use schema::{Outcome, Violation, ViolationList};
pub use services::QueryDescriptor;
