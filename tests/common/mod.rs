//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod models;

use std::time::Duration;

use reducer_rs::Revision;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Collect `initial` plus every change published within `window`, stopping
/// early if the engine goes away.
pub async fn collect_states<S: Clone>(
    initial: S,
    changes: &mut broadcast::Receiver<Revision<S>>,
    window: Duration,
) -> Vec<S> {
    let deadline = tokio::time::Instant::now() + window;
    let mut states = vec![initial];

    loop {
        match tokio::time::timeout_at(deadline, changes.recv()).await {
            Ok(Ok(change)) => states.push(change.into_value()),
            Ok(Err(RecvError::Lagged(skipped))) => panic!("subscriber lagged by {skipped}"),
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        }
    }

    states
}

/// Collect exactly `count` values (initial included), or fail after `timeout`.
pub async fn collect_count<S: Clone>(
    initial: S,
    changes: &mut broadcast::Receiver<Revision<S>>,
    count: usize,
    timeout: Duration,
) -> Vec<S> {
    let mut states = vec![initial];
    while states.len() < count {
        let change = tokio::time::timeout(timeout, changes.recv())
            .await
            .expect("timed out waiting for state change")
            .expect("change stream closed");
        states.push(change.into_value());
    }
    states
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
