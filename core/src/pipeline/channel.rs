use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Single-writer, latest-wins slot for one published entity.
///
/// Readers always see either the previous or the new value in full. Clones
/// share the same slot.
pub struct Publisher<T> {
    sender: Arc<watch::Sender<Option<Arc<T>>>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Publisher<T> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, value: T) {
        self.publish_shared(Arc::new(value));
    }

    pub fn publish_shared(&self, value: Arc<T>) {
        self.sender.send_replace(Some(value));
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Read side of a [`Publisher`].
pub struct Subscription<T> {
    receiver: watch::Receiver<Option<Arc<T>>>,
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> Subscription<T> {
    /// Current value without waiting.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.receiver.borrow().clone()
    }

    /// Waits for a value newer than the last one seen here. Intermediate
    /// values published in between are skipped. `None` once every publisher
    /// is gone.
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        loop {
            self.receiver.changed().await.ok()?;
            let value = self.receiver.borrow_and_update().clone();
            if value.is_some() {
                return value;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Operator-facing status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}
