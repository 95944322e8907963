/*!
 * Concurrency-limited chunk scheduling.
 *
 * `ConcurrencyLimitedBatcher` runs one chapter's chunk translations with a
 * hard cap on simultaneously running calls. Results always come back in input
 * order, whatever order the calls complete in.
 */

use futures::future::join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::debug;
use std::future::Future;

use crate::app_config::SchedulingMode;

/// Scheduler for the chunks of one chapter
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimitedBatcher {
    /// Maximum number of in-flight translations
    limit: usize,
    /// Lockstep batches or sliding window
    mode: SchedulingMode,
}

impl ConcurrencyLimitedBatcher {
    /// Create a new batcher; a limit of 0 is treated as 1
    pub fn new(limit: usize, mode: SchedulingMode) -> Self {
        Self {
            limit: limit.max(1),
            mode,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `translate` over `items`, returning outputs in input order
    pub async fn run<T, F, Fut>(&self, items: Vec<T>, translate: F) -> Vec<Fut::Output>
    where
        F: Fn(T) -> Fut,
        Fut: Future,
    {
        match self.mode {
            SchedulingMode::Batched => self.run_batched(items, translate).await,
            SchedulingMode::Sliding => self.run_sliding(items, translate).await,
        }
    }

    /// Run fallible work over `items` in input order, stopping at the first error
    ///
    /// In batched mode the failing batch runs to its end and no later batch
    /// starts; in sliding mode the calls still in flight are dropped.
    pub async fn try_run<T, R, E, F, Fut>(&self, items: Vec<T>, translate: F) -> Result<Vec<R>, E>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        match self.mode {
            SchedulingMode::Batched => {
                let mut results = Vec::with_capacity(items.len());
                let mut remaining = items.into_iter();
                loop {
                    let batch: Vec<Fut> = remaining.by_ref().take(self.limit).map(&translate).collect();
                    if batch.is_empty() {
                        break;
                    }
                    for result in join_all(batch).await {
                        results.push(result?);
                    }
                }
                Ok(results)
            }
            SchedulingMode::Sliding => {
                stream::iter(items)
                    .map(translate)
                    .buffered(self.limit)
                    .try_collect()
                    .await
            }
        }
    }

    /// Consecutive batches of `limit`; a batch starts once the previous one is done
    async fn run_batched<T, F, Fut>(&self, items: Vec<T>, translate: F) -> Vec<Fut::Output>
    where
        F: Fn(T) -> Fut,
        Fut: Future,
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);
        let mut remaining = items.into_iter();
        let mut batch_index = 0;

        loop {
            let batch: Vec<Fut> = remaining.by_ref().take(self.limit).map(&translate).collect();
            if batch.is_empty() {
                break;
            }
            batch_index += 1;
            debug!(
                "Running batch {} of {} ({} chunks)",
                batch_index,
                total.div_ceil(self.limit),
                batch.len()
            );
            results.extend(join_all(batch).await);
        }

        results
    }

    /// Ordered sliding window: a new call starts as soon as any call finishes
    async fn run_sliding<T, F, Fut>(&self, items: Vec<T>, translate: F) -> Vec<Fut::Output>
    where
        F: Fn(T) -> Fut,
        Fut: Future,
    {
        stream::iter(items).map(translate).buffered(self.limit).collect().await
    }
}
