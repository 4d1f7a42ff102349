//! Transient notifications

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vprompt_data::{Language, Notice, NoticeLevel};

pub const DEFAULT_LIFETIME_SECS: i64 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub id: Uuid,
    pub level: NoticeLevel,
    /// Resolved against the page language when pushed
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Toasts {
    items: Vec<Toast>,
    lifetime: Duration,
}

impl Default for Toasts {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_LIFETIME_SECS))
    }
}

impl Toasts {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            items: Vec::new(),
            lifetime,
        }
    }

    pub fn with_lifetime(lifetime: std::time::Duration) -> Self {
        Self::new(
            Duration::from_std(lifetime)
                .unwrap_or_else(|_| Duration::seconds(DEFAULT_LIFETIME_SECS)),
        )
    }

    pub fn push(&mut self, notice: &Notice, lang: Language) -> Uuid {
        self.push_at(notice, lang, Utc::now())
    }

    pub fn push_at(&mut self, notice: &Notice, lang: Language, now: DateTime<Utc>) -> Uuid {
        let id = Uuid::now_v7();
        self.items.push(Toast {
            id,
            level: notice.level,
            text: notice.text.get(lang).to_string(),
            created_at: now,
            expires_at: now + self.lifetime,
        });
        id
    }

    /// Drop every toast that has expired by `now`
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.items.len();
        self.items.retain(|t| t.expires_at > now);
        before - self.items.len()
    }

    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|t| t.id != id);
        before != self.items.len()
    }

    pub fn active(&self) -> &[Toast] {
        &self.items
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.items.last()
    }

    /// Remove and return everything queued so far
    pub fn drain(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.items)
    }
}
