//! One-shot wake-up delivered through an actor's own mailbox.

use std::time::Duration;

use tokio::sync::mpsc::WeakSender;
use tokio::task::JoinHandle;

/// At most one outstanding wake-up.
///
/// `arm` is a no-op while a wake-up is pending. The pending flag is cleared
/// by the actor when it processes the wake-up message, not when the timer
/// fires, so a wake-up sitting in the mailbox still counts as outstanding.
#[derive(Debug, Default)]
pub(crate) struct Alarm {
    pending: Option<JoinHandle<()>>,
}

impl Alarm {
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule `message` into `mailbox` after `delay`. Returns false if a
    /// wake-up was already pending.
    ///
    /// The timer holds only a weak sender; once the actor's last handle is
    /// gone the wake-up is dropped.
    pub(crate) fn arm<M: Send + 'static>(&mut self, delay: Duration, mailbox: WeakSender<M>, message: M) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = mailbox.upgrade() {
                // closed mailbox: the actor is gone
                let _ = tx.send(message).await;
            }
        }));
        true
    }

    /// The wake-up was delivered.
    pub(crate) fn clear(&mut self) {
        self.pending = None;
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn delivers_after_delay() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let mut alarm = Alarm::default();

        assert!(alarm.arm(Duration::from_secs(10), tx.downgrade(), 7));
        assert!(alarm.is_pending());

        let started = tokio::time::Instant::now();
        assert_eq!(rx.recv().await, Some(7));
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn second_arm_is_ignored_while_pending() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let mut alarm = Alarm::default();

        assert!(alarm.arm(Duration::from_secs(10), tx.downgrade(), 1));
        assert!(!alarm.arm(Duration::from_secs(1), tx.downgrade(), 2));

        assert_eq!(rx.recv().await, Some(1));
        alarm.clear();
        assert!(!alarm.is_pending());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_alarm_never_fires() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let mut alarm = Alarm::default();

        alarm.arm(Duration::from_secs(10), tx.downgrade(), 1);
        alarm.cancel();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }
}
