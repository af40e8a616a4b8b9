// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Count- and size-threshold bundling shared by the REST publishers.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::errors::PublishError;

#[derive(Debug)]
struct Pending<T> {
    items: Vec<T>,
    bytes: usize,
}

/// Accumulates items into bundles bounded by item count and total payload size.
///
/// A bundle is handed back once it holds `count_threshold` items, or when the next item
/// would push its payload past `byte_threshold`. An item larger than `byte_threshold` on
/// its own travels in a bundle of one.
#[derive(Debug)]
pub struct Bundler<T> {
    count_threshold: usize,
    byte_threshold: usize,
    pending: Mutex<Pending<T>>,
}

impl<T: AsRef<[u8]>> Bundler<T> {
    #[must_use]
    pub fn new(count_threshold: usize, byte_threshold: usize) -> Self {
        let count_threshold = count_threshold.max(1);
        Self {
            count_threshold,
            byte_threshold: byte_threshold.max(1),
            pending: Mutex::new(Pending {
                items: Vec::with_capacity(count_threshold),
                bytes: 0,
            }),
        }
    }

    #[must_use]
    pub fn count_threshold(&self) -> usize {
        self.count_threshold
    }

    #[must_use]
    pub fn byte_threshold(&self) -> usize {
        self.byte_threshold
    }

    /// Adds `item`, returning every bundle that became ready, in order.
    pub fn add(&self, item: T) -> Vec<Vec<T>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ready = Vec::new();

        let size = item.as_ref().len();
        if !pending.items.is_empty() && pending.bytes + size > self.byte_threshold {
            ready.push(self.cut(&mut pending));
        }

        pending.items.push(item);
        pending.bytes += size;
        if pending.items.len() >= self.count_threshold || pending.bytes >= self.byte_threshold {
            ready.push(self.cut(&mut pending));
        }
        ready
    }

    fn cut(&self, pending: &mut Pending<T>) -> Vec<T> {
        pending.bytes = 0;
        std::mem::replace(
            &mut pending.items,
            Vec::with_capacity(self.count_threshold),
        )
    }

    /// Takes whatever is pending, possibly nothing.
    pub fn take(&self) -> Vec<T> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.bytes = 0;
        std::mem::take(&mut pending.items)
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Requests running in the background until the next [`InFlight::wait`].
#[derive(Debug, Default)]
pub struct InFlight {
    tasks: tokio::sync::Mutex<JoinSet<Result<(), PublishError>>>,
}

impl InFlight {
    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Result<(), PublishError>> + Send + 'static,
    {
        self.tasks.lock().await.spawn(task);
    }

    /// Waits for every task spawned so far and returns the first failure.
    ///
    /// Later failures are logged.
    pub async fn wait(&self) -> Result<(), PublishError> {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
        debug!("Waiting for {} outstanding requests", tasks.len());

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| PublishError::Task(e.to_string()))
                .and_then(|result| result);
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    error!("Outstanding request failed: {e}");
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn item(size: usize) -> Vec<u8> {
        vec![b'x'; size]
    }

    #[test]
    fn test_bundles_at_count_threshold() {
        let bundler = Bundler::new(3, 1024);
        assert!(bundler.add("1").is_empty());
        assert!(bundler.add("2").is_empty());
        assert_eq!(bundler.add("3"), vec![vec!["1", "2", "3"]]);
        assert!(bundler.is_empty());
        assert!(bundler.add("4").is_empty());
        assert_eq!(bundler.take(), vec!["4"]);
        assert!(bundler.take().is_empty());
    }

    #[test]
    fn test_zero_thresholds_bundle_every_item() {
        let bundler = Bundler::new(0, 0);
        assert_eq!(bundler.count_threshold(), 1);
        assert_eq!(bundler.byte_threshold(), 1);
        assert_eq!(bundler.add("a"), vec![vec!["a"]]);
    }

    #[test]
    fn test_cuts_before_byte_threshold_is_exceeded() {
        let bundler = Bundler::new(300, 100);
        assert!(bundler.add(item(40)).is_empty());
        assert!(bundler.add(item(40)).is_empty());
        // 120 bytes would not fit, the first two go out and the third starts a new bundle
        let ready = bundler.add(item(40));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].len(), 2);
        assert_eq!(bundler.len(), 1);
    }

    #[test]
    fn test_exact_byte_threshold_cuts_immediately() {
        let bundler = Bundler::new(300, 100);
        assert!(bundler.add(item(60)).is_empty());
        assert_eq!(bundler.add(item(40)).len(), 1);
        assert!(bundler.is_empty());
    }

    #[test]
    fn test_oversized_item_travels_alone() {
        let bundler = Bundler::new(300, 100);
        assert!(bundler.add(item(10)).is_empty());
        let ready = bundler.add(item(500));
        let sizes: Vec<Vec<usize>> = ready
            .iter()
            .map(|bundle| bundle.iter().map(Vec::len).collect())
            .collect();
        assert_eq!(sizes, vec![vec![10], vec![500]]);
        assert!(bundler.is_empty());
    }

    #[test]
    fn test_large_items_split_into_bounded_bundles() {
        let bundler = Bundler::new(300, 1_000_000);
        let mut bundles = Vec::new();
        for _ in 0..300 {
            bundles.extend(bundler.add(item(30_000)));
        }
        bundles.push(bundler.take());

        assert!(bundles.len() > 1);
        assert_eq!(bundles.iter().map(Vec::len).sum::<usize>(), 300);
        for bundle in &bundles {
            let bytes: usize = bundle.iter().map(Vec::len).sum();
            assert!(bytes <= 1_000_000, "bundle of {bytes} bytes");
        }
    }

    #[tokio::test]
    async fn test_wait_joins_every_task() {
        let in_flight = InFlight::default();
        let done = Arc::new(AtomicUsize::new(0));
        for delay in [30, 10, 20] {
            let done = Arc::clone(&done);
            in_flight
                .spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
        }
        in_flight.wait().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_returns_failure_then_resets() {
        let in_flight = InFlight::default();
        in_flight.spawn(async { Ok(()) }).await;
        in_flight
            .spawn(async { Err(PublishError::Auth("expired".to_string())) })
            .await;
        assert!(matches!(
            in_flight.wait().await,
            Err(PublishError::Auth(_))
        ));
        // the failed set is gone
        in_flight.wait().await.unwrap();
    }
}
