//! Channel profile projection.

use serde::{Deserialize, Serialize};

/// A user viewed as a channel, with subscription aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: usize,
    pub subscribed_to_count: usize,
    /// Whether the viewing user subscribes to this channel
    pub is_subscribed: bool,
    pub email: String,
}
