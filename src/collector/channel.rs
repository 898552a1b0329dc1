//! Single-slot latest-value channel.
//!
//! Each field of a target shape gets one channel. The channel buffers at
//! most the most recently published value: publishing over an unconsumed
//! value overwrites it (last-write-wins, no queue). The background
//! assembly task is the single active consumer; publishers may be any
//! number of concurrent tasks.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use crate::schema::FieldValue;

pub(crate) struct FieldChannel {
    slot: Mutex<Option<FieldValue>>,
    notify: Notify,
    closed: AtomicBool,
}

impl FieldChannel {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Store `value`, overwriting any unconsumed buffered value, and wake
    /// the consumer. Returns `false` if the channel is already closed.
    pub(crate) fn publish(&self, value: FieldValue) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        *self.lock_slot() = Some(value);
        self.notify.notify_one();
        true
    }

    /// Await the next buffered value, or `None` once the channel is
    /// closed. Values published while the consumer is elsewhere conflate:
    /// only the latest survives until the next call.
    pub(crate) async fn recv(&self) -> Option<FieldValue> {
        loop {
            if let Some(value) = self.try_recv() {
                return Some(value);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            // `notify_one` stores a permit when no consumer is parked, so a
            // publish or close landing between the checks above and this
            // await still wakes us.
            self.notify.notified().await;
        }
    }

    /// Non-blocking take of the buffered value, if any.
    pub(crate) fn try_recv(&self) -> Option<FieldValue> {
        self.lock_slot().take()
    }

    /// Drop any buffered value, mark the channel closed, and wake the
    /// consumer. Idempotent.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.lock_slot().take();
        self.notify.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<FieldValue>> {
        // Poisoning can only come from a panicked publisher; the slot
        // itself stays coherent.
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FieldChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldChannel")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn boxed<T: std::any::Any + Send>(value: T) -> FieldValue {
        Box::new(value)
    }

    #[tokio::test]
    async fn test_publish_then_recv() {
        let ch = FieldChannel::new();
        assert!(ch.publish(boxed(7_u32)));
        let value = ch.recv().await.unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_latest_value_wins() {
        let ch = FieldChannel::new();
        ch.publish(boxed(1_u32));
        ch.publish(boxed(2_u32));
        let value = ch.recv().await.unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 2);
        assert!(ch.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_recv_waits_for_publish() {
        let ch = Arc::new(FieldChannel::new());
        let consumer = tokio::spawn({
            let ch = Arc::clone(&ch);
            async move { ch.recv().await }
        });
        tokio::task::yield_now().await;
        ch.publish(boxed("late".to_string()));
        let value = consumer.await.unwrap().unwrap();
        assert_eq!(*value.downcast::<String>().unwrap(), "late");
    }

    #[tokio::test]
    async fn test_close_wakes_parked_consumer() {
        let ch = Arc::new(FieldChannel::new());
        let consumer = tokio::spawn({
            let ch = Arc::clone(&ch);
            async move { ch.recv().await }
        });
        tokio::task::yield_now().await;
        ch.close();
        assert!(consumer.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publish_after_close_is_rejected() {
        let ch = FieldChannel::new();
        ch.close();
        assert!(!ch.publish(boxed(1_u32)));
        assert!(ch.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_drops_buffered_value() {
        let ch = FieldChannel::new();
        ch.publish(boxed(1_u32));
        ch.close();
        assert!(ch.recv().await.is_none());
    }
}
