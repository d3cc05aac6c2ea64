use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Notification, NotificationKind};

pub const FEED_CAPACITY: usize = 5;

/// A message a reducer wants shown; the feed stamps it with an id and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub kind: NotificationKind,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Info,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Warning,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Success,
        }
    }
}

/// Newest-first, capped at [`FEED_CAPACITY`]. No de-duplication, no expiry.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    entries: VecDeque<Notification>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a feed from stored entries, keeping the newest ones.
    pub fn from_entries(entries: Vec<Notification>) -> Self {
        let mut entries = VecDeque::from(entries);
        entries.truncate(FEED_CAPACITY);
        Self { entries }
    }

    pub fn push(&mut self, notice: Notice, now: DateTime<Utc>) -> &Notification {
        self.entries.push_front(Notification {
            id: Uuid::new_v4(),
            message: notice.message,
            kind: notice.kind,
            timestamp: now,
        });
        self.entries.truncate(FEED_CAPACITY);
        &self.entries[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_five_newest_first() {
        let mut feed = NotificationFeed::new();
        let now = Utc::now();
        for n in 0..7 {
            feed.push(Notice::info(format!("n{n}")), now);
        }
        let messages: Vec<_> = feed.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["n6", "n5", "n4", "n3", "n2"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut feed = NotificationFeed::new();
        let now = Utc::now();
        feed.push(Notice::warning("¡Stock bajo!: Leche"), now);
        feed.push(Notice::warning("¡Stock bajo!: Leche"), now);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn stored_entries_are_capped() {
        let now = Utc::now();
        let mut source = NotificationFeed::new();
        for n in 0..5 {
            source.push(Notice::info(format!("n{n}")), now);
        }
        let mut entries = source.to_vec();
        entries.extend(source.to_vec());

        let feed = NotificationFeed::from_entries(entries);
        assert_eq!(feed.len(), FEED_CAPACITY);
        assert_eq!(feed.iter().next().map(|n| n.message.as_str()), Some("n4"));
    }
}
