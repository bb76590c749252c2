use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

/// A background task that can be cleared before it fires.
///
/// Dropping the handle cancels the task, so a timer owned by some piece of
/// state never outlives that state.
#[derive(Debug)]
pub struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Runs `task` once, after `delay`.
    pub fn after<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            simulate(delay).await;
            task.await;
        });
        Self { handle }
    }

    /// Calls `tick` every `period` until it breaks.
    pub fn every<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        // tokio intervals panic on a zero period
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of an interval completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if tick().is_break() {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            debug!("Clearing pending timer");
            self.handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Stands in for work that would take `delay` in a real system.
pub async fn simulate(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
