//! # mongolens
//!
//! Query timing and explain-plan logging for MongoDB operations.
//!
//! ## Features
//!
//! - **Per-operation timing**: every instrumented call produces one
//!   [`OperationEvent`] (`tasks.find({"name":"john"})`, elapsed milliseconds)
//! - **Plan extraction**: eligible operations are re-issued with `explain`
//!   and their winning plan is flattened leaf first
//! - **Plan classification**: index scans are favorable, collection scans
//!   unfavorable, `_id` lookups are not logged at all
//! - **Pluggable loggers**: console, `tracing`, closures, or your own
//!   [`QueryLogger`] / [`ExplainLogger`]
//! - **Fail-open**: nothing the instrumentation does can change an
//!   operation's result
//!
//! ## Example
//!
//! ```ignore
//! use mongolens::{Instrumentator, LoggerConfig, Operation, OperationSpec, TracingLogger};
//! use mongolens::driver::MongoExplainer;
//! use bson::doc;
//! use std::sync::Arc;
//!
//! let instrumentator = Instrumentator::new(
//!     LoggerConfig::new()
//!         .with_query_logger(TracingLogger::new())
//!         .with_explain_logger(TracingLogger::new()),
//! );
//! let explainer = Arc::new(MongoExplainer::new(db.clone()));
//!
//! let spec = OperationSpec::new(Operation::Find, "tasks").with_filter(doc! { "name": "john" });
//! let cursor = instrumentator
//!     .instrument(spec, explainer.clone(), tasks.find(doc! { "name": "john" }).into_future())
//!     .await?;
//! ```
//!
//! Without the driver, implement [`ExplainExecutor`] for whatever issues
//! your explain commands and call [`Instrumentator::on_start`] /
//! [`Instrumentator::on_complete`] from your own hooks.

pub mod config;
pub mod error;
pub mod explain;
pub mod format;
pub mod instrument;
pub mod logger;
pub mod operation;

#[cfg(feature = "mongodb")]
pub mod driver;

pub use config::{LoggerConfig, LoggerSettings};
pub use error::{LensError, LensResult};
pub use explain::{
    Emphasis, ExplainDocument, FlattenedPlan, PlanStage, PlanSummary, PlanVerdict, classify,
    find_query_planners, flatten_winning_plan,
};
pub use instrument::{ExplainExecutor, Instrumentator, InvocationContext};
pub use logger::{
    CompositeLogger, ConsoleLogger, ExplainEvent, ExplainLogger, NoopLogger, QueryLogger,
    TracingLogger,
};
pub use operation::{Operation, OperationCategory, OperationEvent, OperationSpec};

#[cfg(feature = "mongodb")]
pub use driver::MongoExplainer;
