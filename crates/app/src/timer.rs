//! One-shot timers on the tokio clock.
//!
//! [`schedule_after`] runs a callback once after a delay and hands back a
//! [`TimerHandle`]. Cancelling (or dropping) the handle aborts the timer;
//! doing so after it already fired is a no-op. Each timer carries a
//! [`TimerId`] that is passed to the callback, so an owner can recognise a
//! fire that was already queued when the timer was cancelled.

use std::time::Duration;

use tokio::task::JoinHandle;

use lumo_domain::id::TimerId;

/// Owning handle of a scheduled timer.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    task: JoinHandle<()>,
}

impl TimerHandle {
    #[must_use]
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Whether the callback has already run (or the timer was aborted).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Abort the timer. Safe to call after it fired.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run `on_fire` once, `delay` from now, on the current tokio runtime.
pub fn schedule_after<F>(delay: Duration, on_fire: F) -> TimerHandle
where
    F: FnOnce(TimerId) + Send + 'static,
{
    let id = TimerId::new();
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        on_fire(id);
    });
    TimerHandle { id, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn should_fire_once_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = tokio::time::Instant::now();
        let handle = schedule_after(Duration::from_secs(30), move |id| {
            let _ = tx.send(id);
        });

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, handle.id());
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_fire_when_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerId>();
        let handle = schedule_after(Duration::from_secs(5), move |id| {
            let _ = tx.send(id);
        });
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        // Sender was dropped with the aborted task without sending.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_tolerate_cancel_after_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = schedule_after(Duration::ZERO, move |id| {
            let _ = tx.send(id);
        });
        let fired = rx.recv().await.unwrap();
        tokio::task::yield_now().await;
        assert!(handle.is_finished());
        assert_eq!(fired, handle.id());
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn should_give_each_timer_its_own_id() {
        let a = schedule_after(Duration::from_secs(1), |_| {});
        let b = schedule_after(Duration::from_secs(1), |_| {});
        assert_ne!(a.id(), b.id());
    }
}
