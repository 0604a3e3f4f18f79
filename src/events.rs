//! Single-consumer notification queue.
//!
//! Sensor samples and transport outcomes share one FIFO queue so the owner
//! handles them one at a time, in arrival order, on a single thread. Producers
//! hold a [`Notifier`]; the owner holds the [`NotificationQueue`].
//!
//! Cancelling the queue turns every later `notify` into a no-op. Items that
//! were queued before cancellation are still delivered, after which the
//! consumer sees [`QueueError::Cancelled`].

use crate::collector::types::Sample;
use crate::link::{LinkEvent, RequestId, TransportEvent};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// An item delivered to the pipeline owner.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A sensor tick
    Sample(Sample),
    /// An asynchronous outcome from the link transport
    Link(LinkEvent),
}

/// Errors from receiving on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Nothing arrived within the timeout
    Timeout,
    /// Nothing is queued right now
    Empty,
    /// The queue was cancelled and has been drained
    Cancelled,
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Timeout => write!(f, "Timed out waiting for a notification"),
            QueueError::Empty => write!(f, "Notification queue is empty"),
            QueueError::Cancelled => write!(f, "Notification queue was cancelled"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Producer handle for the notification queue.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: Sender<Notification>,
    cancelled: Arc<AtomicBool>,
}

impl Notifier {
    /// Enqueue a notification. Returns `false` once the queue is cancelled.
    pub fn notify(&self, notification: Notification) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.sender.send(notification).is_ok()
    }

    pub fn sample(&self, sample: Sample) -> bool {
        self.notify(Notification::Sample(sample))
    }

    pub fn link(&self, request: RequestId, event: TransportEvent) -> bool {
        self.notify(Notification::Link(LinkEvent::new(request, event)))
    }

    /// Stop accepting notifications from every producer.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Consumer side of the notification queue.
pub struct NotificationQueue {
    receiver: Receiver<Notification>,
    notifier: Notifier,
}

impl NotificationQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            receiver,
            notifier: Notifier {
                sender,
                cancelled: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// A new producer handle.
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    /// Cancel the queue.
    pub fn cancel(&self) {
        self.notifier.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.notifier.is_cancelled()
    }

    /// Number of queued notifications.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Wait up to `timeout` for the next notification.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, QueueError> {
        if self.is_cancelled() {
            return self.try_recv();
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(notification) => Ok(notification),
            Err(RecvTimeoutError::Timeout) if self.is_cancelled() => Err(QueueError::Cancelled),
            Err(RecvTimeoutError::Timeout) => Err(QueueError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(QueueError::Cancelled),
        }
    }

    /// Take the next notification without blocking.
    pub fn try_recv(&self) -> Result<Notification, QueueError> {
        match self.receiver.try_recv() {
            Ok(notification) => Ok(notification),
            Err(TryRecvError::Empty) if self.is_cancelled() => Err(QueueError::Cancelled),
            Err(TryRecvError::Empty) => Err(QueueError::Empty),
            Err(TryRecvError::Disconnected) => Err(QueueError::Cancelled),
        }
    }

    /// Take everything queued right now, in arrival order.
    pub fn drain(&self) -> Vec<Notification> {
        self.receiver.try_iter().collect()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrival_order_across_producers() {
        let queue = NotificationQueue::new();
        let sensor = queue.notifier();
        let link = queue.notifier();

        sensor.sample(Sample::new(1.0, 0.0, 0.0, 1));
        link.link(3, TransportEvent::Written(4));
        sensor.sample(Sample::new(2.0, 0.0, 0.0, 2));

        let items = queue.drain();
        assert_eq!(
            items,
            vec![
                Notification::Sample(Sample::new(1.0, 0.0, 0.0, 1)),
                Notification::Link(LinkEvent::new(3, TransportEvent::Written(4))),
                Notification::Sample(Sample::new(2.0, 0.0, 0.0, 2)),
            ]
        );
    }

    #[test]
    fn test_cancel_rejects_new_and_drains_old() {
        let queue = NotificationQueue::new();
        let notifier = queue.notifier();

        assert!(notifier.sample(Sample::default()));
        queue.cancel();
        assert!(!notifier.sample(Sample::default()));

        assert!(matches!(queue.try_recv(), Ok(Notification::Sample(_))));
        assert_eq!(queue.try_recv(), Err(QueueError::Cancelled));
        assert_eq!(
            queue.recv_timeout(Duration::from_millis(1)),
            Err(QueueError::Cancelled)
        );
    }

    #[test]
    fn test_timeout_and_empty() {
        let queue = NotificationQueue::new();
        assert_eq!(queue.try_recv(), Err(QueueError::Empty));
        assert_eq!(
            queue.recv_timeout(Duration::from_millis(5)),
            Err(QueueError::Timeout)
        );
    }
}
