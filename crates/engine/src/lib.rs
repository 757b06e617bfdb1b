//! Execution pipeline for validated queries.
//!
//! An [`Engine`] runs a query through an ordered list of [`Middleware`].
//! Each middleware receives a [`QueryContext`] and a [`Next`] handle and
//! either delegates to the rest of the chain or returns a result itself.
//!
//! ```text
//! query ─▶ context factory ─▶ m1 ─▶ m2 ─▶ … ─▶ result factory ─▶ result
//!                              │
//!                              └─ (returns without next) ─▶ result
//! ```
//!
//! Misassembled pipelines fail with
//! [`EngineError::NoMiddlewares`](quarry_core::EngineError::NoMiddlewares) or
//! [`EngineError::NoFurtherMiddleware`](quarry_core::EngineError::NoFurtherMiddleware).

mod engine;
mod middleware;

pub use engine::{Engine, QueryContext, QueryRunner};
pub use middleware::{FnMiddleware, Middleware, Next, middleware_fn};
