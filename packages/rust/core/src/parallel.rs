//! Bounded-parallel fan-out.
//!
//! One tokio task per item, admission-limited by a semaphore. Outputs come
//! back in input order no matter which task finishes first.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Run `task` over every item with at most `max_concurrent` in flight.
///
/// `output[i]` always corresponds to `items[i]`. A task that cannot be
/// scheduled or joined (closed semaphore, panic outside the task's own
/// envelope, runtime shutdown) fills its slot with `on_fault(i, reason)`.
/// A `max_concurrent` of zero is treated as one.
pub async fn fan_out<I, O, F, Fut>(
    items: Vec<I>,
    max_concurrent: usize,
    task: F,
    mut on_fault: impl FnMut(usize, String) -> O,
) -> Vec<O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    let limit = max_concurrent.max(1);
    let semaphore = Arc::new(Semaphore::new(limit));
    let task = Arc::new(task);

    debug!(tasks = items.len(), limit, "fanning out");

    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| format!("admission semaphore closed: {e}"))?;
                Ok::<O, String>((*task)(item).await)
            })
        })
        .collect();

    // Awaiting handles in spawn order fills each slot exactly once, so the
    // output cannot drift out of alignment with the input.
    let expected = handles.len();
    let mut outputs = Vec::with_capacity(expected);
    for (index, handle) in handles.into_iter().enumerate() {
        let output = match handle.await {
            Ok(Ok(output)) => output,
            Ok(Err(reason)) => {
                warn!(index, %reason, "task could not be admitted");
                on_fault(index, reason)
            }
            Err(e) => {
                let reason = format!("task join failed: {e}");
                warn!(index, %reason, "task did not complete");
                on_fault(index, reason)
            }
        };
        outputs.push(output);
    }

    debug_assert_eq!(outputs.len(), expected);
    outputs
}
