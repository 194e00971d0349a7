//! The full 30-day report for one account: metrics, metadata, assembly.

use crate::assembly::{ReportTable, assemble};
use crate::error::{Error, Result};
use crate::metadata::fetch_metadata;
use crate::metrics::{DateRange, fetch_video_metrics};
use crate::youtube_api::YouTubeClient;
use jiff::civil::Date;
use std::fmt;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub range: DateRange,
    /// Title of the account's channel, if it has one.
    pub channel: Option<String>,
    pub table: ReportTable,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.channel {
            Some(channel) => writeln!(f, "{channel}: top videos, {}", self.range)?,
            None => writeln!(f, "Top videos, {}", self.range)?,
        }
        if self.table.is_empty() {
            writeln!(f, "(no video activity in this period)")
        } else {
            f.write_str(&self.table.render())
        }
    }
}

/// The local calendar date.
pub fn today() -> Date {
    jiff::Zoned::now().date()
}

/// Title of the first channel owned by the authenticated account.
pub async fn channel_name(client: &YouTubeClient) -> Result<Option<String>> {
    let channels = client.list_my_channels();
    let mut channels = std::pin::pin!(channels);
    match channels.next().await {
        Some(channel) => {
            let channel = channel.map_err(|e| Error::query("fetch channel", e))?;
            Ok(Some(channel.snippet.title))
        }
        None => Ok(None),
    }
}

/// Builds the report for the 30 days ending `today`.
///
/// The channel name only labels the report, so failing to look it up leaves
/// the report unlabelled instead of failing it.
pub async fn build_report(client: &YouTubeClient, today: Date) -> Result<Report> {
    let range = DateRange::last_30_days(today);
    let channel = match channel_name(client).await {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!(error = %eyre::Report::new(e), "could not look up channel name");
            None
        }
    };

    let metrics = fetch_video_metrics(client, range).await?;
    let rows = metrics.rows()?;
    let ids: Vec<String> = rows.iter().map(|r| r.video_id.clone()).collect();
    let metadata = fetch_metadata(client, &ids).await?;

    let table = assemble(&rows, &metadata);
    tracing::info!(%range, videos = table.rows.len(), "assembled report");
    Ok(Report {
        range,
        channel,
        table,
    })
}
