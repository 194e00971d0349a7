//! Titles and engagement counts for a set of videos.
//!
//! `videos.list` accepts at most 50 ids per call, so lookups are split into
//! consecutive chunks and issued one after another.

use crate::error::{Error, Result};
use crate::youtube_api::{Video, YouTubeClient};
use std::collections::HashMap;
use tokio_stream::{Stream, StreamExt};

/// Upper bound on ids per `videos.list` call.
pub const MAX_IDS_PER_LOOKUP: usize = 50;

/// What the Data API tells us about one video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub likes: u64,
    pub comments: u64,
    /// The API exposes no share count; always 0.
    pub shares: u64,
}

impl From<Video> for VideoMetadata {
    fn from(video: Video) -> Self {
        let count = |n: Option<String>| n.and_then(|n| n.parse().ok()).unwrap_or(0);
        Self {
            title: video.snippet.map(|s| s.title).unwrap_or_default(),
            likes: count(video.statistics.like_count),
            comments: count(video.statistics.comment_count),
            shares: 0,
        }
    }
}

/// Splits `ids` into the batches that will be looked up together.
pub fn video_id_chunks(ids: &[String]) -> impl Iterator<Item = &[String]> {
    ids.chunks(MAX_IDS_PER_LOOKUP)
}

/// Looks up a single batch of at most [`MAX_IDS_PER_LOOKUP`] ids.
///
/// Batches are independent of each other, so a failed one can be re-issued on
/// its own.
pub async fn fetch_metadata_chunk(
    client: &YouTubeClient,
    chunk: &[String],
) -> Result<Vec<(String, VideoMetadata)>> {
    debug_assert!(chunk.len() <= MAX_IDS_PER_LOOKUP);
    let response = client
        .list_videos(chunk)
        .await
        .map_err(|e| Error::query("fetch video metadata", e))?;

    if response.items.len() < chunk.len() {
        tracing::debug!(
            requested = chunk.len(),
            returned = response.items.len(),
            "some videos have no metadata"
        );
    }

    Ok(response
        .items
        .into_iter()
        .map(|video| (video.id.clone(), VideoMetadata::from(video)))
        .collect())
}

/// Lazily looks up `ids` batch by batch; nothing is requested until polled.
pub fn metadata_chunks<'a>(
    client: &'a YouTubeClient,
    ids: &'a [String],
) -> impl Stream<Item = Result<Vec<(String, VideoMetadata)>>> + 'a {
    async_stream::stream! {
        for chunk in video_id_chunks(ids) {
            yield fetch_metadata_chunk(client, chunk).await;
        }
    }
}

/// Looks up every id and merges the batches into one map keyed by video id.
///
/// The first failing batch fails the whole lookup; what earlier batches
/// returned is dropped.
pub async fn fetch_metadata(
    client: &YouTubeClient,
    ids: &[String],
) -> Result<HashMap<String, VideoMetadata>> {
    let mut merged = HashMap::with_capacity(ids.len());
    let chunks = metadata_chunks(client, ids);
    let mut chunks = std::pin::pin!(chunks);
    while let Some(chunk) = chunks.next().await {
        merged.extend(chunk?);
    }
    tracing::info!(requested = ids.len(), found = merged.len(), "fetched video metadata");
    Ok(merged)
}
