//! Generic concurrent-batch executor.
//!
//! Splits an index list into contiguous batches and drives a task function
//! over them, either strictly sequentially or across a bounded worker pool.
//! In pooled mode every submitted batch is drained before the first failure
//! is surfaced, so partial progress stays checkpointed and resumable.

use crate::progress::{ProgressEvent, ProgressSink};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run `task` over `indices` in batches of `batch_size`.
///
/// `workers <= 1` executes batches in partition order and aborts on the
/// first failure. `workers > 1` keeps at most `workers` batches in flight
/// with no ordering guarantee between them; the first failure is returned
/// only after every started batch has settled.
pub async fn run_batches<F, Fut>(
    task: F,
    indices: &[usize],
    batch_size: usize,
    workers: usize,
    progress: Option<ProgressSink>,
) -> anyhow::Result<()>
where
    F: Fn(Vec<usize>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let batch_size = batch_size.max(1);
    let batches: Vec<Vec<usize>> = indices.chunks(batch_size).map(<[usize]>::to_vec).collect();
    let total = batches.len();

    if workers <= 1 {
        for (done, batch) in batches.into_iter().enumerate() {
            task(batch).await?;
            if let Some(sink) = &progress {
                sink(ProgressEvent {
                    done: done + 1,
                    total,
                });
            }
        }
        return Ok(());
    }

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut join_set = JoinSet::new();
    for batch in batches {
        let permit = semaphore.clone().acquire_owned().await?;
        let fut = task(batch);
        join_set.spawn(async move {
            let _permit = permit;
            fut.await
        });
    }

    let mut first_err = None;
    let mut done = 0usize;
    while let Some(joined) = join_set.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(anyhow::anyhow!("batch task panicked: {e}")),
        };
        done += 1;
        if let Some(sink) = &progress {
            sink(ProgressEvent { done, total });
        }
        if let Err(e) = outcome {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
