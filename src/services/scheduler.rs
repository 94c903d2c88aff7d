//! Delayed-task scheduling for confirmation timers
//!
//! Deliberately fire-and-forget: there is no cancellation token in the
//! contract. Cancelling a scheduled confirmation is achieved by the
//! pending-status check when the timer fires, not by revoking the timer.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;

pub type ScheduledTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Injectable delayed-execution primitive
pub trait Scheduler: Send + Sync {
    /// Run `task` after `delay` on the background runtime
    fn after(&self, delay: Duration, task: ScheduledTask);
}

/// Production scheduler backed by `tokio::spawn` + `sleep`
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: ScheduledTask) {
        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            task.await;
        });
    }
}
