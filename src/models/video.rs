//! Video records and the enriched watch-history entry.

use serde::{Deserialize, Serialize};

/// Video document. Only read by this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Seconds
    pub duration: f64,
    #[serde(default)]
    pub views: u64,
    #[serde(default = "default_published")]
    pub is_published: bool,
    /// Owning user ID
    pub owner: String,
    pub created_at: String,
    pub updated_at: String,
}

fn default_published() -> bool {
    true
}

/// Owner projection embedded in a watch-history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOwner {
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}

/// A watched video with its owner resolved to a single object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedVideo {
    pub id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: u64,
    pub is_published: bool,
    /// Absent when the owner account no longer exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<VideoOwner>,
    pub created_at: String,
    pub updated_at: String,
}

impl WatchedVideo {
    pub fn from_video(video: Video, owner: Option<VideoOwner>) -> Self {
        Self {
            id: video.id,
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            title: video.title,
            description: video.description,
            duration: video.duration,
            views: video.views,
            is_published: video.is_published,
            owner,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}
