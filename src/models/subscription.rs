//! Subscription edge between two users.

use serde::{Deserialize, Serialize};

/// Directed edge: `subscriber` follows `channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Document ID
    pub id: String,
    /// User doing the subscribing
    pub subscriber: String,
    /// User being subscribed to
    pub channel: String,
    pub created_at: String,
}

impl Subscription {
    pub fn new(subscriber: &str, channel: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subscriber: subscriber.to_string(),
            channel: channel.to_string(),
            created_at: crate::time_utils::now_rfc3339(),
        }
    }
}
