use std::collections::VecDeque;
use tokio::sync::{Mutex as AsyncMutex, Notify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOverflowPolicy {
    Block,
    DropOldest,
}

impl QueueOverflowPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "drop_oldest" | "drop-oldest" => Some(Self::DropOldest),
            "block" => Some(Self::Block),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::DropOldest => "drop_oldest",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum QueuePushResult {
    Enqueued { backpressured: bool },
    ReplacedOldest,
}

#[derive(Debug)]
struct OverflowQueueState<T> {
    deque: VecDeque<T>,
    closed: bool,
}

/// Bounded hand-off between the log stream reader and the enrichment stage.
#[derive(Debug)]
pub(crate) struct OverflowQueue<T> {
    state: AsyncMutex<OverflowQueueState<T>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> OverflowQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: AsyncMutex::new(OverflowQueueState {
                deque: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    /// Returns `None` once the queue is closed; the item is dropped in that case.
    pub(crate) async fn push(
        &self,
        item: T,
        policy: QueueOverflowPolicy,
    ) -> Option<QueuePushResult> {
        let mut was_backpressured = false;
        loop {
            let mut guard = self.state.lock().await;
            if guard.closed {
                return None;
            }
            if guard.deque.len() < self.capacity {
                guard.deque.push_back(item);
                drop(guard);
                self.not_empty.notify_one();
                return Some(QueuePushResult::Enqueued {
                    backpressured: was_backpressured,
                });
            }

            if policy == QueueOverflowPolicy::DropOldest {
                let _ = guard.deque.pop_front();
                guard.deque.push_back(item);
                drop(guard);
                self.not_empty.notify_one();
                return Some(QueuePushResult::ReplacedOldest);
            }

            was_backpressured = true;
            let not_full = self.not_full.notified();
            drop(guard);
            not_full.await;
        }
    }

    /// Waits for the next item; `None` after close once the backlog is drained.
    pub(crate) async fn pop(&self) -> Option<T> {
        loop {
            let mut guard = self.state.lock().await;
            if let Some(item) = guard.deque.pop_front() {
                drop(guard);
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            let not_empty = self.not_empty.notified();
            drop(guard);
            not_empty.await;
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.state.lock().await.deque.len()
    }

    pub(crate) async fn close(&self) {
        let mut guard = self.state.lock().await;
        guard.closed = true;
        drop(guard);
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn drop_oldest_keeps_freshest_items() {
        let queue = OverflowQueue::new(2);
        assert_eq!(
            queue.push("a", QueueOverflowPolicy::DropOldest).await,
            Some(QueuePushResult::Enqueued {
                backpressured: false
            })
        );
        queue
            .push("b", QueueOverflowPolicy::DropOldest)
            .await
            .expect("queue open");
        assert_eq!(
            queue.push("c", QueueOverflowPolicy::DropOldest).await,
            Some(QueuePushResult::ReplacedOldest)
        );

        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.pop().await, Some("b"));
        assert_eq!(queue.pop().await, Some("c"));
    }

    #[tokio::test]
    async fn block_policy_waits_for_consumer() {
        let queue = Arc::new(OverflowQueue::new(1));
        queue
            .push(1u32, QueueOverflowPolicy::Block)
            .await
            .expect("queue open");

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push(2u32, QueueOverflowPolicy::Block).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        assert_eq!(queue.pop().await, Some(1));
        let pushed = producer.await.expect("producer task");
        assert_eq!(
            pushed,
            Some(QueuePushResult::Enqueued {
                backpressured: true
            })
        );
        assert_eq!(queue.pop().await, Some(2));
    }

    #[tokio::test]
    async fn close_drains_backlog_then_ends() {
        let queue = OverflowQueue::new(4);
        queue
            .push("x", QueueOverflowPolicy::DropOldest)
            .await
            .expect("queue open");
        queue.close().await;

        assert_eq!(queue.push("y", QueueOverflowPolicy::DropOldest).await, None);
        assert_eq!(queue.pop().await, Some("x"));
        assert_eq!(queue.pop().await, None);
    }

    #[test]
    fn overflow_policy_parsing() {
        assert_eq!(
            QueueOverflowPolicy::parse("drop-oldest"),
            Some(QueueOverflowPolicy::DropOldest)
        );
        assert_eq!(
            QueueOverflowPolicy::parse(""),
            Some(QueueOverflowPolicy::DropOldest)
        );
        assert_eq!(
            QueueOverflowPolicy::parse(" BLOCK "),
            Some(QueueOverflowPolicy::Block)
        );
        assert_eq!(QueueOverflowPolicy::parse("fifo"), None);
    }
}
