//! Delayed callbacks with cancellation.
//!
//! A [`Timer`] runs on its own task, so any number of timers keep
//! independent schedules.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// Runs a callback after a delay, once or repeatedly until cancelled.
///
/// The schedule starts on construction. A repeating timer re-arms after each
/// completed invocation. Dropping the timer cancels it.
pub struct Timer {
    task: Option<JoinHandle<()>>,
    delay: Duration,
    repeating: bool,
}

impl Timer {
    /// Schedules `callback` to run after `delay`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new<F, Fut>(repeating: bool, delay: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(delay).await;
                callback().await;
                if !repeating {
                    break;
                }
                trace!(?delay, "timer re-armed");
            }
        });

        Self {
            task: Some(task),
            delay,
            repeating,
        }
    }

    /// Single invocation after `delay`.
    pub fn once<F, Fut>(delay: Duration, callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(false, delay, callback)
    }

    /// Invocation every `delay` until cancelled.
    pub fn repeating<F, Fut>(delay: Duration, callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(true, delay, callback)
    }

    /// Whether an invocation is still pending.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    /// Stops the timer and waits for its task to finish.
    ///
    /// No invocation starts after this returns. Safe to call more than once.
    pub async fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Cancellation is the expected outcome here.
            let _ = task.await;
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::{Duration, sleep};

    use super::*;

    fn counting_timer(repeating: bool, delay: Duration) -> (Timer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let timer = Timer::new(repeating, delay, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (timer, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn single_shot_fires_once() {
        let (timer, calls) = counting_timer(false, Duration::from_secs(3));

        sleep(Duration::from_millis(2500)).await;
        assert!(timer.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(1000)).await;
        tokio::task::yield_now().await;
        assert!(!timer.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_timer_until_cancelled() {
        let (mut timer, calls) = counting_timer(true, Duration::from_millis(2500));

        sleep(Duration::from_millis(2000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(timer.is_running());

        timer.cancel().await;
        assert!(!timer.is_running());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_delay_prevents_invocation() {
        let (mut timer, calls) = counting_timer(false, Duration::from_secs(5));

        sleep(Duration::from_secs(1)).await;
        timer.cancel().await;
        timer.cancel().await;

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn timers_keep_independent_schedules() {
        let (_fast, fast_calls) = counting_timer(true, Duration::from_secs(1));
        let (_slow, slow_calls) = counting_timer(true, Duration::from_secs(3));

        sleep(Duration::from_millis(6500)).await;
        assert_eq!(fast_calls.load(Ordering::SeqCst), 6);
        assert_eq!(slow_calls.load(Ordering::SeqCst), 2);
    }
}
