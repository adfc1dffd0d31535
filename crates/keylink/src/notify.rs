//! Link notifications.
//!
//! The registry announces every change to the link tables on a broadcast
//! channel. Delivery is fire-and-forget: a send with no subscribers is
//! dropped, and a subscriber that falls behind sees `Lagged` from tokio.

use tokio::sync::broadcast;
use tracing::trace;

use keylink_core::{AccountId, SchnorrPubkey};

/// A change to the link tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkNotification {
    /// `account` is now linked to `key`.
    Created {
        account: AccountId,
        key: SchnorrPubkey,
    },
    /// `account` is no longer linked to `key`.
    Removed {
        account: AccountId,
        key: SchnorrPubkey,
    },
}

impl LinkNotification {
    /// The account side of the affected pair.
    pub fn account(&self) -> &AccountId {
        match self {
            Self::Created { account, .. } | Self::Removed { account, .. } => account,
        }
    }

    /// The key side of the affected pair.
    pub fn key(&self) -> &SchnorrPubkey {
        match self {
            Self::Created { key, .. } | Self::Removed { key, .. } => key,
        }
    }
}

/// Broadcast bus for link notifications.
pub struct NotificationBus {
    sender: broadcast::Sender<LinkNotification>,
}

impl NotificationBus {
    /// Create a bus buffering up to `capacity` notifications per subscriber.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit a notification to all current subscribers.
    pub fn emit(&self, notification: LinkNotification) {
        trace!(?notification, "emitting link notification");
        // No subscribers is fine
        let _ = self.sender.send(notification);
    }

    /// Subscribe to notifications emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkNotification> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
