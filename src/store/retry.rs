// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Retry policy for idempotent object store calls (§4.4). A small policy
//! object applied explicitly around each call — the systems-language
//! realization of this crate's reference lineage's `@retry` decorator
//! (§9 Design Notes).

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

use crate::error::{Error, Result};

/// Governs how many times, and how quickly, a transient object store
/// failure is retried before giving up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        Self {
            max_attempts,
            base_delay,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_max_elapsed_time(Some(self.base_delay * self.max_attempts.saturating_mul(4)))
            .build()
    }

    /// Runs `op`, retrying on transient `object_store::Error`s up to
    /// `max_attempts` total tries. A permanent error (including a
    /// well-formed 404) is returned on the first attempt. Exhausting
    /// retries surfaces `Error::TransientStore` carrying the attempt
    /// count and the last underlying error.
    pub async fn run<T, Fut, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, object_store::Error>>,
    {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let mut backoff = self.backoff();

        loop {
            attempts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let attempted = attempts.load(std::sync::atomic::Ordering::Relaxed);
                    if attempted >= self.max_attempts || !Error::is_transient_store_error(&err) {
                        if attempted > 1 {
                            return Err(Error::TransientStore {
                                attempts: attempted,
                                source: err,
                            });
                        }
                        return Err(Error::ObjectStore(err));
                    }
                    match backoff.next_backoff() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(Error::TransientStore {
                                attempts: attempted,
                                source: err,
                            })
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient_error() -> object_store::Error {
        object_store::Error::Generic {
            store: "test",
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "connection reset",
            )),
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::Relaxed);
                async { Ok::<_, object_store::Error>(42) }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    if n < 2 {
                        Err(transient_error())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::Relaxed);
                async { Err::<(), _>(object_store::Error::NotFound {
                    path: "x".to_string(),
                    source: "missing".into(),
                }) }
            })
            .await;
        assert!(matches!(result, Err(Error::ObjectStore(_))));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_transient_store_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let result: Result<()> = policy.run(|| async { Err(transient_error()) }).await;
        match result {
            Err(Error::TransientStore { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected TransientStore, got {other:?}"),
        }
    }
}
