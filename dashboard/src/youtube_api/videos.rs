//! YouTube Videos API types.

use crate::youtube_api::types::PageInfo;
use serde::{Deserialize, Serialize};

/// Response structure for the `videos.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoListResponse {
    /// Identifies the API resource's type.
    ///
    /// The value will be `youtube#videoListResponse`.
    pub kind: String,
    /// The videos that matched the requested ids.
    pub items: Vec<Video>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
}

/// A `video` resource, limited to the parts this crate requests.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    #[serde(default)]
    pub statistics: VideoStatistics,
}

/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoSnippet {
    pub title: String,
}

/// Statistics about the video.
///
/// All counts are decimal strings, and any of them may be absent (for example
/// when the owner hides the like count).
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#statistics>
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VideoStatistics {
    #[serde(rename = "viewCount")]
    pub view_count: Option<String>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<String>,
    #[serde(rename = "commentCount")]
    pub comment_count: Option<String>,
}
