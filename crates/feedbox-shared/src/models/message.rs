use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An anonymous message embedded in its recipient's record.
///
/// The id is only unique within the recipient's sequence; it exists so the
/// owner can address a single message for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            created_at,
        }
    }
}

/// Order messages by `created_at`, most recent first.
///
/// Storage keeps arrival order, which is not guaranteed to be time order.
/// Messages sharing a timestamp come out latest-arrival first.
pub fn newest_first(mut messages: Vec<Message>) -> Vec<Message> {
    messages.reverse();
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    messages
}
