use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{LensError, LensResult};
use crate::format::DEFAULT_MAX_ARRAY_ITEMS;
use crate::logger::{ConsoleLogger, ExplainLogger, QueryLogger};
use crate::operation::Operation;

/// Verbs instrumented by default: every supported verb.
pub fn default_target_operations() -> BTreeSet<Operation> {
    Operation::ALL.into_iter().collect()
}

/// Verbs explained by default. Count-family verbs are left out; add them
/// with [`LoggerConfig::with_explain_operations`] if their plans matter.
pub fn default_explain_operations() -> BTreeSet<Operation> {
    [Operation::Find, Operation::FindOne, Operation::Aggregate]
        .into_iter()
        .collect()
}

/// Configuration for an [`Instrumentator`](crate::Instrumentator).
///
/// Built once, then owned (immutably) by the instrumentator.
#[derive(Clone)]
pub struct LoggerConfig {
    /// Verbs that are timed and logged.
    pub target_operations: BTreeSet<Operation>,
    /// Verbs whose plans are extracted. Only verbs also in
    /// `target_operations` are ever explained.
    pub explain_operations: BTreeSet<Operation>,
    /// Master switch for explain re-issue.
    pub explain: bool,
    /// Whether caller-attached properties are carried into events.
    pub additional_log_properties: bool,
    pub query_logger: Arc<dyn QueryLogger>,
    pub explain_logger: Arc<dyn ExplainLogger>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let console = Arc::new(ConsoleLogger::new());
        Self {
            target_operations: default_target_operations(),
            explain_operations: default_explain_operations(),
            explain: true,
            additional_log_properties: false,
            query_logger: console.clone(),
            explain_logger: console,
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("target_operations", &self.target_operations)
            .field("explain_operations", &self.explain_operations)
            .field("explain", &self.explain)
            .field("additional_log_properties", &self.additional_log_properties)
            .finish_non_exhaustive()
    }
}

impl LoggerConfig {
    /// Create a configuration with defaults (explain on, console loggers).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from file settings. Loggers are console loggers
    /// honoring the settings' color and truncation options.
    pub fn from_settings(settings: &LoggerSettings) -> LensResult<Self> {
        settings.validate()?;
        let mut console = ConsoleLogger::new().max_array_items(settings.max_array_items);
        if !settings.colors {
            console = console.without_colors();
        }
        let console = Arc::new(console);
        Ok(Self {
            target_operations: settings.target_operations.clone(),
            explain_operations: settings.explain_operations.clone(),
            explain: settings.explain,
            additional_log_properties: settings.additional_log_properties,
            query_logger: console.clone(),
            explain_logger: console,
        })
    }

    /// Replace the set of instrumented verbs.
    pub fn with_target_operations(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.target_operations = ops.into_iter().collect();
        self
    }

    /// Replace the set of explained verbs.
    pub fn with_explain_operations(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.explain_operations = ops.into_iter().collect();
        self
    }

    /// Replace either set; `None` keeps the current one.
    pub fn with_query_methods(
        mut self,
        target: Option<Vec<Operation>>,
        explain: Option<Vec<Operation>>,
    ) -> Self {
        if let Some(target) = target {
            self.target_operations = target.into_iter().collect();
        }
        if let Some(explain) = explain {
            self.explain_operations = explain.into_iter().collect();
        }
        self
    }

    /// Turn explain re-issue on or off.
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Carry caller-attached properties into events.
    pub fn with_additional_log_properties(mut self, enabled: bool) -> Self {
        self.additional_log_properties = enabled;
        self
    }

    /// Set the query logger.
    pub fn with_query_logger<L: QueryLogger + 'static>(mut self, logger: L) -> Self {
        self.query_logger = Arc::new(logger);
        self
    }

    /// Set the query logger from an Arc.
    pub fn with_query_logger_arc(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.query_logger = logger;
        self
    }

    /// Set the explain logger.
    pub fn with_explain_logger<L: ExplainLogger + 'static>(mut self, logger: L) -> Self {
        self.explain_logger = Arc::new(logger);
        self
    }

    /// Set the explain logger from an Arc.
    pub fn with_explain_logger_arc(mut self, logger: Arc<dyn ExplainLogger>) -> Self {
        self.explain_logger = logger;
        self
    }

    /// Whether `op` is timed and logged.
    pub fn is_target(&self, op: Operation) -> bool {
        self.target_operations.contains(&op)
    }

    /// Whether `op` gets an explain re-issue.
    pub fn is_explain_eligible(&self, op: Operation) -> bool {
        self.explain && self.is_target(op) && self.explain_operations.contains(&op)
    }
}

/// The file-loadable part of [`LoggerConfig`].
///
/// ```toml
/// target_operations = ["find", "findOne", "aggregate", "count"]
/// explain_operations = ["find", "aggregate"]
/// explain = true
/// additional_log_properties = false
/// max_array_items = 100
/// colors = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerSettings {
    #[serde(alias = "targetOperations")]
    pub target_operations: BTreeSet<Operation>,
    #[serde(alias = "explainOperations")]
    pub explain_operations: BTreeSet<Operation>,
    pub explain: bool,
    #[serde(alias = "additionalLogProperties")]
    pub additional_log_properties: bool,
    #[serde(alias = "maxArrayItems")]
    pub max_array_items: usize,
    pub colors: bool,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            target_operations: default_target_operations(),
            explain_operations: default_explain_operations(),
            explain: true,
            additional_log_properties: false,
            max_array_items: DEFAULT_MAX_ARRAY_ITEMS,
            colors: true,
        }
    }
}

impl LoggerSettings {
    /// Parse settings from TOML.
    pub fn from_toml_str(raw: &str) -> LensResult<Self> {
        let settings: Self = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> LensResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LensError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            LensError::Config(msg) => LensError::config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Explain verbs must be a subset of target verbs.
    pub fn validate(&self) -> LensResult<()> {
        let stray: Vec<&str> = self
            .explain_operations
            .difference(&self.target_operations)
            .map(|op| op.as_str())
            .collect();
        if !stray.is_empty() {
            return Err(LensError::config(format!(
                "explain_operations not in target_operations: {}",
                stray.join(", ")
            )));
        }
        if self.max_array_items == 0 {
            return Err(LensError::config("max_array_items must be at least 1"));
        }
        Ok(())
    }
}
