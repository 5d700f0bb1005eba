//! Restartable response timer.
//!
//! Each command owns one [`ResponseTimer`]. The countdown runs on a Tokio
//! task that sleeps until the current deadline; restarting the timer pushes
//! a new deadline through a `watch` channel, so "reset on any traffic" never
//! needs to cancel and respawn the task. The countdown task invokes its
//! callback at most once; after [`ResponseTimer::stop`] further restarts are
//! ignored.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    /// Not counting down.
    Disarmed,
    /// Fires at the given instant unless moved.
    Armed(Instant),
    /// Stopped or expired for good.
    Stopped,
}

/// Per-command countdown that fires once unless restarted in time.
#[derive(Debug)]
pub(crate) struct ResponseTimer {
    interval_ms: AtomicU64,
    deadline: watch::Sender<Deadline>,
    spawned: AtomicBool,
}

impl ResponseTimer {
    pub(crate) fn new(interval: Duration) -> Self {
        let (deadline, _) = watch::channel(Deadline::Disarmed);
        Self {
            interval_ms: AtomicU64::new(duration_to_ms(interval)),
            deadline,
            spawned: AtomicBool::new(false),
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Acquire))
    }

    /// Changes the interval. A running countdown keeps its deadline; the new
    /// interval applies from the next restart.
    pub(crate) fn set_interval(&self, interval: Duration) {
        self.interval_ms
            .store(duration_to_ms(interval), Ordering::Release);
    }

    pub(crate) fn is_armed(&self) -> bool {
        matches!(*self.deadline.borrow(), Deadline::Armed(_))
    }

    #[cfg(test)]
    pub(crate) fn is_stopped(&self) -> bool {
        matches!(*self.deadline.borrow(), Deadline::Stopped)
    }

    /// Starts or restarts the countdown from now.
    ///
    /// `on_expiry` is only used the first time the countdown task is
    /// spawned.
    pub(crate) fn restart<F>(&self, on_expiry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let at = Instant::now() + self.interval();
        let armed = self.deadline.send_if_modified(|deadline| {
            if *deadline == Deadline::Stopped {
                false
            } else {
                *deadline = Deadline::Armed(at);
                true
            }
        });
        if armed {
            self.spawn_once(on_expiry);
        }
    }

    /// Pauses the countdown without killing the timer.
    pub(crate) fn disarm(&self) {
        self.deadline.send_if_modified(|deadline| {
            if matches!(deadline, Deadline::Armed(_)) {
                *deadline = Deadline::Disarmed;
                true
            } else {
                false
            }
        });
    }

    /// Stops the timer for good.
    pub(crate) fn stop(&self) {
        self.deadline.send_replace(Deadline::Stopped);
    }

    fn spawn_once<F>(&self, on_expiry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.spawned.swap(true, Ordering::AcqRel) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(countdown(self.deadline.subscribe(), on_expiry));
            }
            Err(_) => {
                self.spawned.store(false, Ordering::Release);
                tracing::warn!("no Tokio runtime available, response timer not running");
            }
        }
    }
}

async fn countdown<F>(mut rx: watch::Receiver<Deadline>, on_expiry: F)
where
    F: FnOnce() + Send + 'static,
{
    loop {
        let current = *rx.borrow_and_update();
        match current {
            Deadline::Stopped => return,
            Deadline::Disarmed => {
                if rx.changed().await.is_err() {
                    return;
                }
            }
            Deadline::Armed(at) => {
                tokio::select! {
                    () = sleep_until(at) => {
                        // A restart may have landed after the sleep completed.
                        if *rx.borrow() == current {
                            on_expiry();
                            return;
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use tokio::time::{advance, sleep};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = fired.clone();
        let make = move || {
            let fired = handle.clone();
            Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }) as Box<dyn FnOnce() + Send>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_interval() {
        let (fired, make) = counter();
        let timer = ResponseTimer::new(Duration::from_secs(5));
        timer.restart(make());

        sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_pushes_deadline_out() {
        let (fired, make) = counter();
        let timer = ResponseTimer::new(Duration::from_secs(5));
        timer.restart(make());

        for _ in 0..4 {
            sleep(Duration::from_secs(3)).await;
            timer.restart(make());
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_firing_and_restart() {
        let (fired, make) = counter();
        let timer = ResponseTimer::new(Duration::from_secs(1));
        timer.restart(make());
        timer.stop();
        timer.restart(make());
        assert!(timer.is_stopped());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_pauses_countdown() {
        let (fired, make) = counter();
        let timer = ResponseTimer::new(Duration::from_secs(1));
        timer.restart(make());
        timer.disarm();

        advance(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        timer.restart(make());
        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn interval_change_applies_on_restart() {
        let timer = ResponseTimer::new(Duration::from_secs(30));
        timer.set_interval(Duration::from_secs(60));
        assert_eq!(timer.interval(), Duration::from_secs(60));
    }

    #[test]
    fn restart_without_runtime_does_not_panic() {
        let timer = ResponseTimer::new(Duration::from_secs(1));
        timer.restart(|| {});
        assert!(timer.is_armed());
    }
}
