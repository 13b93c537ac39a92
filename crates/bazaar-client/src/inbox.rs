use bazaar_types::notifications::{Notification, NotificationData};

/// One fetched page of the inbox plus its unread badge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InboxSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

impl InboxSnapshot {
    pub fn new(notifications: Vec<Notification>) -> Self {
        let unread_count = notifications.iter().filter(|n| !n.is_read).count();
        Self {
            notifications,
            unread_count,
        }
    }

    /// Reflect a successful mark-read without waiting for the next poll.
    /// Returns false if the notification is not in this snapshot or was
    /// already read.
    pub fn mark_read_locally(&mut self, notification_id: i64) -> bool {
        match self
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && !n.is_read)
        {
            Some(n) => {
                n.is_read = true;
                self.unread_count = self.unread_count.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    pub fn unread(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().filter(|n| !n.is_read)
    }

    /// Unread notifications newer than `last_seen_id`. Ids only grow, so this
    /// catches arrivals even when the unread count did not change.
    pub fn unread_since(&self, last_seen_id: i64) -> impl Iterator<Item = &Notification> {
        self.unread().filter(move |n| n.id > last_seen_id)
    }

    pub fn newest_id(&self) -> Option<i64> {
        self.notifications.iter().map(|n| n.id).max()
    }
}

/// Where following a notification leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTarget {
    Conversation(i64),
    Ad(i64),
    Service(i64),
}

impl NotificationTarget {
    /// `None` when the notification carries no related entity.
    pub fn of(notification: &Notification) -> Option<Self> {
        match &notification.data {
            NotificationData::NewMessage(data) => Some(Self::Conversation(data.conversation_id)),
            NotificationData::AdView => notification.related_id.map(Self::Ad),
            NotificationData::ServiceView => notification.related_id.map(Self::Service),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Conversation(id) => format!("/messages?conversation={}", id),
            Self::Ad(id) => format!("/ads/{}", id),
            Self::Service(id) => format!("/services/{}", id),
        }
    }
}
