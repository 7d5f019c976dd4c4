//! Operation timing and explain re-issue.
//!
//! The host driver calls two lifecycle callbacks per operation:
//! - [`Instrumentator::on_start`] (or [`Instrumentator::start`]) when the
//!   operation is dispatched, which records the start time
//! - [`Instrumentator::on_complete`] once it finished, which logs the
//!   [`OperationEvent`](crate::OperationEvent) and, for explain-eligible
//!   verbs, re-issues the operation through an [`ExplainExecutor`] and logs
//!   the classified plan
//!
//! [`Instrumentator::complete_detached`] and [`Instrumentator::instrument`]
//! run the explain re-issue on a spawned task, so a slow or hung explain never
//! holds back the operation's result.
//!
//! Nothing here can change the outcome of the instrumented operation:
//! missing context, explain failures, malformed explain output and
//! panicking loggers or executors all end up as `tracing` diagnostics under
//! the `mongolens.instrument` target.
//!
//! # Example
//!
//! ```rust,ignore
//! use mongolens::{Instrumentator, LoggerConfig, Operation, OperationSpec};
//! use bson::doc;
//!
//! let instrumentator = Instrumentator::new(LoggerConfig::new());
//! let spec = OperationSpec::new(Operation::Find, "tasks").with_filter(doc! { "name": "john" });
//!
//! let tasks = instrumentator
//!     .instrument(spec, explainer.clone(), async { collection.find(doc! { "name": "john" }).await })
//!     .await?;
//! ```

mod context;
mod executor;
mod instrumentator;


pub use context::InvocationContext;
pub use executor::ExplainExecutor;
pub use instrumentator::Instrumentator;

/// Tracing target for fail-open diagnostics.
pub const DIAGNOSTIC_TARGET: &str = "mongolens.instrument";
