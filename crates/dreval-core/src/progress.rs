//! Progress reporting for batch execution. The executor emits done/total in
//! completion order; the orchestrator consumes via a sink.

use std::sync::Arc;

/// One progress update: how many batches are done and total batch count.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub done: usize,
    pub total: usize,
}

/// Sink for progress events. The executor calls this each time a batch
/// settles. Implementations may throttle.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
