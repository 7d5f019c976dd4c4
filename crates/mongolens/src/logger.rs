//! Pluggable query and explain loggers.
//!
//! An [`Instrumentator`](crate::Instrumentator) hands every timed operation to
//! a [`QueryLogger`] and, when a plan was extracted, an [`ExplainEvent`] to an
//! [`ExplainLogger`]. Plain closures implement both traits.

use bson::Document;
use colored::Colorize;
use std::sync::Arc;
use tracing::Level;

use crate::explain::{Emphasis, FlattenedPlan, PlanSummary, PlanVerdict, classify_with_limit};
use crate::format::{self, DEFAULT_MAX_ARRAY_ITEMS};
use crate::operation::OperationEvent;

/// Receives one event per instrumented operation.
pub trait QueryLogger: Send + Sync {
    fn log_query(&self, event: &OperationEvent);
}

/// Receives the extracted plan of an explained operation.
pub trait ExplainLogger: Send + Sync {
    fn log_explain(&self, explain: &ExplainEvent<'_>);
}

impl<F> QueryLogger for F
where
    F: Fn(&OperationEvent) + Send + Sync,
{
    fn log_query(&self, event: &OperationEvent) {
        self(event)
    }
}

impl<F> ExplainLogger for F
where
    F: Fn(&ExplainEvent<'_>) + Send + Sync,
{
    fn log_explain(&self, explain: &ExplainEvent<'_>) {
        self(explain)
    }
}

/// An operation together with the plan the server chose for it.
#[derive(Debug, Clone)]
pub struct ExplainEvent<'a> {
    /// The base event already sent to the query logger.
    pub event: &'a OperationEvent,
    /// Every plan descriptor found in the explain response.
    pub planners: Vec<&'a Document>,
    /// Flattened winning plan, leaf first.
    pub plan: FlattenedPlan,
}

impl ExplainEvent<'_> {
    /// Classify the plan with the default truncation cap.
    pub fn verdict(&self) -> PlanVerdict {
        classify_with_limit(Some(&self.plan), DEFAULT_MAX_ARRAY_ITEMS)
    }
}

/// A logger that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl QueryLogger for NoopLogger {
    fn log_query(&self, _event: &OperationEvent) {}
}

impl ExplainLogger for NoopLogger {
    fn log_explain(&self, _explain: &ExplainEvent<'_>) {}
}

type Sink = Arc<dyn Fn(&str) + Send + Sync>;

/// Human-readable console output:
///
/// ```text
/// mongolens: 12 ms tasks.find({"name":"john"})
/// IXSCAN {"name":1}
/// ```
#[derive(Clone)]
pub struct ConsoleLogger {
    /// Prefix for query lines.
    pub prefix: String,
    /// Whether to color elapsed times and plan lines.
    pub colors: bool,
    /// Arrays longer than this are truncated in rendered documents.
    pub max_array_items: usize,
    sink: Option<Sink>,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            prefix: "mongolens:".to_string(),
            colors: true,
            max_array_items: DEFAULT_MAX_ARRAY_ITEMS,
            sink: None,
        }
    }
}

impl std::fmt::Debug for ConsoleLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleLogger")
            .field("prefix", &self.prefix)
            .field("colors", &self.colors)
            .field("max_array_items", &self.max_array_items)
            .field("sink", &self.sink.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl ConsoleLogger {
    /// Create a console logger writing to stdout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set prefix for query lines.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Disable ANSI colors.
    pub fn without_colors(mut self) -> Self {
        self.colors = false;
        self
    }

    /// Set the array truncation cap.
    pub fn max_array_items(mut self, max: usize) -> Self {
        self.max_array_items = max;
        self
    }

    /// Send lines to `sink` instead of stdout.
    pub fn with_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    fn emit(&self, line: &str) {
        match &self.sink {
            Some(sink) => sink(line),
            None => println!("{line}"),
        }
    }

    fn elapsed(&self, ms: u64) -> String {
        let text = ms.to_string();
        if !self.colors {
            return text;
        }
        if ms < 100 {
            text.green().to_string()
        } else if ms < 1000 {
            text.yellow().to_string()
        } else {
            text.red().to_string()
        }
    }

    /// The query line for `event`, without trailing newline.
    pub fn render_query(&self, event: &OperationEvent) -> String {
        let mut line = format!(
            "{} {} ms {}",
            self.prefix,
            self.elapsed(event.execution_time_ms),
            format::query_string(event, self.max_array_items)
        );
        if let Some(props) = &event.additional_properties {
            line.push(' ');
            line.push_str(&format::to_json(props, self.max_array_items));
        }
        line
    }

    /// The plan line for `explain`, or `None` when suppressed.
    pub fn render_explain(&self, explain: &ExplainEvent<'_>) -> Option<String> {
        let verdict = classify_with_limit(Some(&explain.plan), self.max_array_items);
        let PlanSummary { emphasis, text } = verdict.summary()?.clone();
        if !self.colors {
            return Some(text);
        }
        Some(match emphasis {
            Emphasis::Favorable => text.green().to_string(),
            Emphasis::Unfavorable => text.red().to_string(),
            Emphasis::Neutral => text.yellow().to_string(),
        })
    }
}

impl QueryLogger for ConsoleLogger {
    fn log_query(&self, event: &OperationEvent) {
        self.emit(&self.render_query(event));
    }
}

impl ExplainLogger for ConsoleLogger {
    fn log_explain(&self, explain: &ExplainEvent<'_>) {
        if let Some(line) = self.render_explain(explain) {
            self.emit(&line);
        }
    }
}

/// A `tracing`-based logger emitting structured events.
///
/// Query events go to target `mongolens.query` at [`TracingLogger::level`];
/// explain events go to `mongolens.explain` at a level picked by the plan's
/// emphasis (collection scans are warnings).
#[derive(Debug, Clone)]
pub struct TracingLogger {
    /// Tracing event level for query events.
    pub level: Level,
    /// Arrays longer than this are truncated in rendered documents.
    pub max_array_items: usize,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_array_items: DEFAULT_MAX_ARRAY_ITEMS,
        }
    }
}

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

impl TracingLogger {
    /// Create a new logger with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the level of query events.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the array truncation cap.
    pub fn max_array_items(mut self, max: usize) -> Self {
        self.max_array_items = max;
        self
    }

    fn level_for(emphasis: Emphasis) -> Level {
        match emphasis {
            Emphasis::Favorable => Level::DEBUG,
            Emphasis::Neutral => Level::INFO,
            Emphasis::Unfavorable => Level::WARN,
        }
    }
}

impl QueryLogger for TracingLogger {
    fn log_query(&self, event: &OperationEvent) {
        let max = self.max_array_items;
        let filter = event
            .filter
            .as_ref()
            .map(|f| format::to_json(f, max))
            .unwrap_or_else(|| "{}".to_string());
        let options = format::document_to_json(&event.options, max);
        let update = event.update.as_ref().map(|u| format::to_json(u, max));
        let additional = event
            .additional_properties
            .as_ref()
            .map(|p| format::to_json(p, max));
        emit_at_level!(
            self.level,
            target: "mongolens.query",
            operation = %event.operation,
            collection = %event.collection_name,
            elapsed_ms = event.execution_time_ms,
            filter = %filter,
            options = %options,
            update = update.as_deref(),
            additional = additional.as_deref(),
            "{}",
            format::query_string(event, max)
        );
    }
}

impl ExplainLogger for TracingLogger {
    fn log_explain(&self, explain: &ExplainEvent<'_>) {
        let verdict = classify_with_limit(Some(&explain.plan), self.max_array_items);
        let Some(summary) = verdict.summary() else {
            return;
        };
        emit_at_level!(
            Self::level_for(summary.emphasis),
            target: "mongolens.explain",
            operation = %explain.event.operation,
            collection = %explain.event.collection_name,
            emphasis = %summary.emphasis,
            plan = %summary.text,
        );
    }
}

/// A logger that forwards to several loggers in order.
#[derive(Default)]
pub struct CompositeLogger {
    query: Vec<Arc<dyn QueryLogger>>,
    explain: Vec<Arc<dyn ExplainLogger>>,
}

impl CompositeLogger {
    /// Create an empty composite logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a logger receiving both query and explain events.
    #[allow(clippy::should_implement_trait)]
    pub fn add<L: QueryLogger + ExplainLogger + 'static>(mut self, logger: L) -> Self {
        let logger = Arc::new(logger);
        self.query.push(logger.clone());
        self.explain.push(logger);
        self
    }

    /// Add an Arc-wrapped query logger.
    pub fn add_query_arc(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.query.push(logger);
        self
    }

    /// Add an Arc-wrapped explain logger.
    pub fn add_explain_arc(mut self, logger: Arc<dyn ExplainLogger>) -> Self {
        self.explain.push(logger);
        self
    }
}

impl QueryLogger for CompositeLogger {
    fn log_query(&self, event: &OperationEvent) {
        for logger in &self.query {
            logger.log_query(event);
        }
    }
}

impl ExplainLogger for CompositeLogger {
    fn log_explain(&self, explain: &ExplainEvent<'_>) {
        for logger in &self.explain {
            logger.log_explain(explain);
        }
    }
}
