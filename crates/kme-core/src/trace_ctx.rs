//! Per-request trace id, propagated via a task-local so deep call sites (error
//! rendering, logging) can read it without threading the request through.

use uuid::Uuid;

tokio::task_local! {
    static TRACE_ID: Uuid;
}

/// Runs `fut` with a fresh trace id bound to the current task.
pub async fn scope<F, T>(trace_id: Uuid, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    TRACE_ID.scope(trace_id, fut).await
}

/// Returns the trace id bound by the enclosing [`scope`], or a fresh one if
/// called outside of any (e.g. in a unit test).
pub fn current() -> Uuid {
    TRACE_ID.try_with(|id| *id).unwrap_or_else(|_| Uuid::new_v4())
}
