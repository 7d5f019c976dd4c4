use bson::Document;
use std::future::Future;
use std::sync::Arc;

use crate::error::LensResult;
use crate::operation::OperationSpec;

/// Re-issues an operation with explain enabled.
///
/// The spec passed in is a copy of the instrumented operation with
/// `explain: true` merged into its options.
pub trait ExplainExecutor: Send + Sync {
    /// Explain a query or count operation. Returns the single explain document.
    fn explain_query(
        &self,
        spec: &OperationSpec,
    ) -> impl Future<Output = LensResult<Document>> + Send;

    /// Explain an aggregation. Returns one document per pipeline stage (or a
    /// single document wrapping them, depending on the server).
    fn explain_aggregate(
        &self,
        spec: &OperationSpec,
    ) -> impl Future<Output = LensResult<Vec<Document>>> + Send;
}

impl<E: ExplainExecutor> ExplainExecutor for Arc<E> {
    fn explain_query(
        &self,
        spec: &OperationSpec,
    ) -> impl Future<Output = LensResult<Document>> + Send {
        (**self).explain_query(spec)
    }

    fn explain_aggregate(
        &self,
        spec: &OperationSpec,
    ) -> impl Future<Output = LensResult<Vec<Document>>> + Send {
        (**self).explain_aggregate(spec)
    }
}

impl<E: ExplainExecutor> ExplainExecutor for &E {
    fn explain_query(
        &self,
        spec: &OperationSpec,
    ) -> impl Future<Output = LensResult<Document>> + Send {
        (**self).explain_query(spec)
    }

    fn explain_aggregate(
        &self,
        spec: &OperationSpec,
    ) -> impl Future<Output = LensResult<Vec<Document>>> + Send {
        (**self).explain_aggregate(spec)
    }
}
