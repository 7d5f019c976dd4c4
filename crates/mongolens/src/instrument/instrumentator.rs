use futures_util::FutureExt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::DIAGNOSTIC_TARGET;
use super::context::InvocationContext;
use super::executor::ExplainExecutor;
use crate::config::LoggerConfig;
use crate::error::LensError;
use crate::explain::ExplainDocument;
use crate::logger::ExplainEvent;
use crate::operation::{Operation, OperationCategory, OperationEvent, OperationSpec};

/// Times operations and logs their plans.
///
/// Cheap to clone; clones share the same configuration.
#[derive(Debug, Clone, Default)]
pub struct Instrumentator {
    config: Arc<LoggerConfig>,
}

impl Instrumentator {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Share an existing configuration.
    pub fn from_arc(config: Arc<LoggerConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Create a context for `spec` and run the start callback on it.
    pub fn start(&self, spec: OperationSpec) -> InvocationContext {
        let mut ctx = InvocationContext::new(spec);
        self.on_start(&mut ctx);
        ctx
    }

    /// Start callback: records the start time of target operations.
    pub fn on_start(&self, ctx: &mut InvocationContext) {
        if self.config.is_target(ctx.spec.operation) {
            ctx.mark_started();
        }
    }

    /// Completion callback for a successful operation.
    ///
    /// Logs the base event, then (for explain-eligible verbs) re-issues the
    /// operation with explain enabled and logs the classified plan. The
    /// returned future waits for the re-issue; callers that must not wait use
    /// [`complete_detached`](Self::complete_detached).
    pub async fn on_complete<E: ExplainExecutor>(&self, ctx: &InvocationContext, executor: &E) {
        let Some(event) = self.record(ctx) else {
            return;
        };
        if self.should_explain(&ctx.spec) {
            self.explain(&event, &ctx.spec, executor).await;
        }
    }

    /// Completion callback for an operation that returned an error. The base
    /// event is still logged; no explain is issued.
    pub fn complete_failed(&self, ctx: &InvocationContext) {
        self.record(ctx);
    }

    /// Like [`on_complete`](Self::on_complete), but the explain re-issue runs
    /// on a spawned task. The base event is logged before this returns.
    ///
    /// Returns the explain task handle, or `None` when no explain was started
    /// (not eligible, missing context, or no tokio runtime).
    pub fn complete_detached<E>(
        &self,
        ctx: InvocationContext,
        executor: Arc<E>,
    ) -> Option<JoinHandle<()>>
    where
        E: ExplainExecutor + 'static,
    {
        let event = self.record(&ctx)?;
        if !self.should_explain(&ctx.spec) {
            return None;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    target: DIAGNOSTIC_TARGET,
                    operation = %ctx.spec.operation,
                    error = %e,
                    "no runtime for detached explain"
                );
                return None;
            }
        };
        let this = self.clone();
        Some(handle.spawn(async move {
            this.explain(&event, &ctx.spec, executor.as_ref()).await;
        }))
    }

    /// Run `operation` between the two lifecycle callbacks.
    ///
    /// The result is returned exactly as the operation produced it, as soon as
    /// the base event is logged. The explain re-issue is left running on a
    /// spawned task (see [`complete_detached`](Self::complete_detached)).
    pub async fn instrument<T, Er, F, E>(
        &self,
        spec: OperationSpec,
        executor: Arc<E>,
        operation: F,
    ) -> Result<T, Er>
    where
        F: Future<Output = Result<T, Er>>,
        E: ExplainExecutor + 'static,
    {
        let ctx = self.start(spec);
        let result = operation.await;
        match &result {
            Ok(_) => {
                self.complete_detached(ctx, executor);
            }
            Err(_) => self.complete_failed(&ctx),
        }
        result
    }

    /// Whether a completed `spec` gets an explain re-issue.
    pub fn should_explain(&self, spec: &OperationSpec) -> bool {
        if !self.config.is_explain_eligible(spec.operation) {
            return false;
        }
        // the caller's own explain result already carries the plan
        !(spec.operation == Operation::Aggregate && spec.explain_requested())
    }

    /// Build the event and hand it to the query logger.
    fn record(&self, ctx: &InvocationContext) -> Option<OperationEvent> {
        let spec = &ctx.spec;
        if !self.config.is_target(spec.operation) {
            return None;
        }
        let Some(elapsed) = ctx.elapsed() else {
            skipped(spec.operation, &LensError::MissingContext("start time"));
            return None;
        };
        let Some(collection) = spec.collection.as_deref() else {
            skipped(spec.operation, &LensError::MissingContext("collection"));
            return None;
        };

        let event = OperationEvent::from_spec(
            spec,
            collection,
            elapsed,
            self.config.additional_log_properties,
        );
        let logger = &self.config.query_logger;
        if catch_unwind(AssertUnwindSafe(|| logger.log_query(&event))).is_err() {
            tracing::error!(
                target: DIAGNOSTIC_TARGET,
                operation = %event.operation,
                collection = %event.collection_name,
                "query logger panicked"
            );
        }
        Some(event)
    }

    async fn explain<E: ExplainExecutor>(
        &self,
        event: &OperationEvent,
        spec: &OperationSpec,
        executor: &E,
    ) {
        let explain_spec = spec.with_explain_flag();
        let reissue = async {
            match spec.operation.category() {
                OperationCategory::Aggregate => executor
                    .explain_aggregate(&explain_spec)
                    .await
                    .map(ExplainDocument::from),
                OperationCategory::Query | OperationCategory::Count => executor
                    .explain_query(&explain_spec)
                    .await
                    .map(ExplainDocument::from),
            }
        };
        let Ok(raw) = AssertUnwindSafe(reissue).catch_unwind().await else {
            tracing::error!(
                target: DIAGNOSTIC_TARGET,
                operation = %event.operation,
                collection = %event.collection_name,
                "explain executor panicked"
            );
            return;
        };

        match raw {
            Ok(raw) => self.dispatch_explain(event, &raw),
            Err(e) => {
                tracing::warn!(
                    target: DIAGNOSTIC_TARGET,
                    operation = %event.operation,
                    collection = %event.collection_name,
                    error = %e,
                    "explain re-issue failed"
                );
            }
        }
    }

    fn dispatch_explain(&self, event: &OperationEvent, raw: &ExplainDocument) {
        let Some(plan) = raw.winning_plan() else {
            return;
        };
        let explain = ExplainEvent {
            event,
            planners: raw.query_planners(),
            plan,
        };
        let logger = &self.config.explain_logger;
        if catch_unwind(AssertUnwindSafe(|| logger.log_explain(&explain))).is_err() {
            tracing::error!(
                target: DIAGNOSTIC_TARGET,
                operation = %event.operation,
                collection = %event.collection_name,
                "explain logger panicked"
            );
        }
    }
}

fn skipped(operation: Operation, reason: &LensError) {
    tracing::debug!(
        target: DIAGNOSTIC_TARGET,
        operation = %operation,
        reason = %reason,
        "instrumentation skipped"
    );
}
