//! Joins per-video metrics with metadata into the table the user sees.

use crate::error::{Error, Result};
use crate::metadata::VideoMetadata;
use crate::metrics::MetricsRow;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Display columns, in output order.
pub const COLUMNS: [&str; 10] = [
    "Title",
    "Views",
    "Watch Time (min)",
    "Avg View Duration (sec)",
    "Subscribers Gained",
    "Subscribers Lost",
    "Likes",
    "Comments",
    "Shares",
    "EngagementRate(%)",
];

/// One video in the final report.
///
/// Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledRow {
    #[serde(skip)]
    pub video_id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Views")]
    pub views: u64,
    #[serde(rename = "Watch Time (min)")]
    pub watch_time_minutes: u64,
    #[serde(rename = "Avg View Duration (sec)")]
    pub average_view_duration_secs: u64,
    #[serde(rename = "Subscribers Gained")]
    pub subscribers_gained: u64,
    #[serde(rename = "Subscribers Lost")]
    pub subscribers_lost: u64,
    #[serde(rename = "Likes")]
    pub likes: u64,
    #[serde(rename = "Comments")]
    pub comments: u64,
    #[serde(rename = "Shares")]
    pub shares: u64,
    /// `None` when the video had no views.
    #[serde(rename = "EngagementRate(%)")]
    pub engagement_rate: Option<f64>,
}

/// `(views + likes + comments) / views * 100`, undefined without views.
pub fn engagement_rate(views: u64, likes: u64, comments: u64) -> Option<f64> {
    if views == 0 {
        return None;
    }
    let engaged = views.saturating_add(likes).saturating_add(comments);
    Some(engaged as f64 / views as f64 * 100.0)
}

/// The assembled report, rows in the order the metrics came in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    pub rows: Vec<AssembledRow>,
}

/// Joins `metrics` with `metadata` by video id.
///
/// Videos without metadata keep their metrics with an empty title and zero
/// likes and comments.
pub fn assemble(metrics: &[MetricsRow], metadata: &HashMap<String, VideoMetadata>) -> ReportTable {
    let rows = metrics
        .iter()
        .map(|m| {
            let meta = metadata.get(&m.video_id);
            if meta.is_none() {
                tracing::debug!(video_id = %m.video_id, "no metadata for video");
            }
            let title = meta.map(|v| v.title.clone()).unwrap_or_default();
            let likes = meta.map_or(0, |v| v.likes);
            let comments = meta.map_or(0, |v| v.comments);
            AssembledRow {
                video_id: m.video_id.clone(),
                title,
                views: m.views,
                watch_time_minutes: m.estimated_minutes_watched,
                average_view_duration_secs: m.average_view_duration,
                subscribers_gained: m.subscribers_gained,
                subscribers_lost: m.subscribers_lost,
                likes,
                comments,
                shares: 0,
                engagement_rate: engagement_rate(m.views, likes, comments),
            }
        })
        .collect();
    ReportTable { rows }
}

impl ReportTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn write_csv_to<W: std::io::Write>(&self, out: W) -> Result<W> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);
        // written by hand so an empty report still gets its header
        writer.write_record(COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::Csv(e.into_error().into()))
    }

    /// The table as CSV: a header row of display names, then one record per video.
    pub fn to_csv(&self) -> Result<String> {
        let bytes = self.write_csv_to(Vec::new())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Writes [`Self::to_csv`] to `path`, replacing any existing file.
    pub async fn write_csv(&self, path: &Path) -> Result<()> {
        let csv = self.to_csv()?;
        tokio::fs::write(path, csv)
            .await
            .map_err(|e| Error::io(path, e))?;
        tracing::info!(path = %path.display(), rows = self.rows.len(), "exported report");
        Ok(())
    }

    /// The table as aligned plain text. Titles are left-aligned, numbers right-aligned.
    pub fn render(&self) -> String {
        let cells: Vec<[String; 10]> = self
            .rows
            .iter()
            .map(|r| {
                [
                    r.title.clone(),
                    r.views.to_string(),
                    r.watch_time_minutes.to_string(),
                    r.average_view_duration_secs.to_string(),
                    r.subscribers_gained.to_string(),
                    r.subscribers_lost.to_string(),
                    r.likes.to_string(),
                    r.comments.to_string(),
                    r.shares.to_string(),
                    r.engagement_rate
                        .map_or_else(|| "n/a".to_string(), |rate| format!("{rate:.2}")),
                ]
            })
            .collect();

        let mut widths = COLUMNS.map(|c| c.chars().count());
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        push_line(&mut out, &widths, COLUMNS.into_iter());
        let rules = widths.map(|w| "-".repeat(w));
        push_line(&mut out, &widths, rules.iter().map(String::as_str));
        for row in &cells {
            push_line(&mut out, &widths, row.iter().map(String::as_str));
        }
        out
    }
}

fn push_line<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    for (i, (cell, &width)) in cells.zip(widths).enumerate() {
        let padding = " ".repeat(width.saturating_sub(cell.chars().count()));
        if i == 0 {
            out.push_str(cell);
            out.push_str(&padding);
        } else {
            out.push_str("  ");
            out.push_str(&padding);
            out.push_str(cell);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn metrics(video_id: &str, views: u64) -> MetricsRow {
        MetricsRow {
            video_id: video_id.into(),
            views,
            estimated_minutes_watched: 50,
            average_view_duration: 30,
            subscribers_gained: 2,
            subscribers_lost: 0,
        }
    }

    fn meta(title: &str, likes: u64, comments: u64) -> VideoMetadata {
        VideoMetadata {
            title: title.into(),
            likes,
            comments,
            shares: 0,
        }
    }

    #[test]
    fn joins_metrics_with_metadata() {
        let metadata = HashMap::from([("v1".to_string(), meta("Test", 10, 5))]);
        let table = assemble(&[metrics("v1", 100)], &metadata);

        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.title, "Test");
        assert_eq!(row.views, 100);
        assert_eq!(row.watch_time_minutes, 50);
        assert_eq!(row.average_view_duration_secs, 30);
        assert_eq!(row.subscribers_gained, 2);
        assert_eq!(row.subscribers_lost, 0);
        assert_eq!((row.likes, row.comments, row.shares), (10, 5, 0));
        assert_approx_eq!(f64, row.engagement_rate.unwrap(), 115.0);
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let table = assemble(&[metrics("v9", 100)], &HashMap::new());

        let row = &table.rows[0];
        assert_eq!(row.video_id, "v9");
        assert_eq!(row.title, "");
        assert_eq!((row.likes, row.comments, row.shares), (0, 0, 0));
        assert_approx_eq!(f64, row.engagement_rate.unwrap(), 100.0);
    }

    #[test]
    fn no_views_means_no_engagement_rate() {
        assert_eq!(engagement_rate(0, 3, 1), None);

        let metadata = HashMap::from([("v1".to_string(), meta("Unlisted", 3, 1))]);
        let table = assemble(&[metrics("v1", 0)], &metadata);
        assert_eq!(table.rows[0].engagement_rate, None);
    }

    #[test]
    fn engagement_rate_divides_before_scaling() {
        let rate = engagement_rate(3, 1, 0).unwrap();
        assert_eq!(rate.to_bits(), (4.0_f64 / 3.0 * 100.0).to_bits());

        let metadata = HashMap::from([("v1".to_string(), meta("t", 1, 0))]);
        let mut row = metrics("v1", 3);
        row.estimated_minutes_watched = 0;
        row.average_view_duration = 0;
        row.subscribers_gained = 0;
        let csv = assemble(&[row], &metadata).to_csv().unwrap();
        assert_eq!(
            csv.lines().nth(1),
            Some("t,3,0,0,0,0,1,0,0,133.33333333333331")
        );
    }

    #[test]
    fn row_order_follows_metrics() {
        let metadata = HashMap::from([
            ("a".to_string(), meta("A", 0, 0)),
            ("b".to_string(), meta("B", 0, 0)),
            ("c".to_string(), meta("C", 0, 0)),
        ]);
        let table = assemble(
            &[metrics("c", 300), metrics("a", 200), metrics("b", 100)],
            &metadata,
        );
        let titles: Vec<_> = table.rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["C", "A", "B"]);
    }

    #[test]
    fn assembling_twice_gives_identical_csv() {
        let metadata = HashMap::from([
            ("v1".to_string(), meta("First", 10, 5)),
            ("v2".to_string(), meta("Second", 1, 0)),
        ]);
        let rows = [metrics("v1", 100), metrics("v2", 7), metrics("v3", 0)];

        let once = assemble(&rows, &metadata);
        let twice = assemble(&rows, &metadata);
        assert_eq!(once, twice);
        assert_eq!(once.to_csv().unwrap(), twice.to_csv().unwrap());
    }

    #[test]
    fn csv_has_display_columns_in_order() {
        let metadata = HashMap::from([("v1".to_string(), meta("Test", 10, 5))]);
        let csv = assemble(&[metrics("v1", 100), metrics("v2", 0)], &metadata)
            .to_csv()
            .unwrap();

        assert_snapshot!(csv, @r"
        Title,Views,Watch Time (min),Avg View Duration (sec),Subscribers Gained,Subscribers Lost,Likes,Comments,Shares,EngagementRate(%)
        Test,100,50,30,2,0,10,5,0,114.99999999999999
        ,0,50,30,2,0,0,0,0,
        ");
    }

    #[test]
    fn empty_report_still_has_header() {
        let csv = ReportTable::default().to_csv().unwrap();
        assert_eq!(csv, format!("{}\n", COLUMNS.join(",")));
    }

    #[test]
    fn csv_quotes_awkward_titles() {
        let title = r#"Tips, tricks & "hacks""#;
        let metadata = HashMap::from([("v1".to_string(), meta(title, 0, 0))]);
        let csv = assemble(&[metrics("v1", 4)], &metadata).to_csv().unwrap();
        let record = csv.lines().nth(1).unwrap();
        assert_eq!(record, r#""Tips, tricks & ""hacks""",4,50,30,2,0,0,0,0,100.0"#);
    }

    #[tokio::test]
    async fn write_csv_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video_analytics.csv");
        let table = assemble(&[metrics("v1", 100)], &HashMap::new());

        table.write_csv(&path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, table.to_csv().unwrap());
    }

    #[tokio::test]
    async fn write_csv_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.csv");
        let err = ReportTable::default().write_csv(&path).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "{err:?}");
    }

    #[test]
    fn render_aligns_columns() {
        let metadata = HashMap::from([
            ("v1".to_string(), meta("Test", 10, 5)),
            ("v2".to_string(), meta("Zero views", 0, 0)),
        ]);
        let mut zero = metrics("v2", 0);
        zero.estimated_minutes_watched = 0;
        zero.average_view_duration = 0;
        zero.subscribers_gained = 0;
        let table = assemble(&[metrics("v1", 100), zero], &metadata);

        assert_snapshot!(table.render(), @r"
        Title       Views  Watch Time (min)  Avg View Duration (sec)  Subscribers Gained  Subscribers Lost  Likes  Comments  Shares  EngagementRate(%)
        ----------  -----  ----------------  -----------------------  ------------------  ----------------  -----  --------  ------  -----------------
        Test          100                50                       30                   2                 0     10         5       0             115.00
        Zero views      0                 0                        0                   0                 0      0         0       0                n/a
        ");
    }
}
