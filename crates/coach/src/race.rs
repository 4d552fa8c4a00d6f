//! First-of(call, timer) combinator
//!
//! The call runs on its own task. If the deadline fires first the task is
//! detached, not aborted: it keeps running to completion and its result is
//! dropped. Any cleanup is the responsibility of whatever the future drives.

use std::future::Future;
use std::time::Duration;

/// Result of racing a fallible call against a deadline
#[derive(Debug)]
pub enum RaceOutcome<T> {
    /// Call settled successfully before the deadline
    Finished(T),
    /// Call settled with an error (or panicked) before the deadline
    Failed(String),
    /// Deadline fired first; the call was left running
    TimedOut,
}

impl<T> RaceOutcome<T> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RaceOutcome::TimedOut)
    }
}

/// Race `call` against `deadline`
pub async fn first_of<F, T, E>(call: F, deadline: Duration) -> RaceOutcome<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let handle = tokio::spawn(call);

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(Ok(value))) => RaceOutcome::Finished(value),
        Ok(Ok(Err(e))) => RaceOutcome::Failed(e.to_string()),
        Ok(Err(join_error)) => RaceOutcome::Failed(format!("task failed: {}", join_error)),
        // Dropping the JoinHandle detaches the task
        Err(_) => RaceOutcome::TimedOut,
    }
}
