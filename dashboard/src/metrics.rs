//! Per-video counters from the YouTube Analytics API.

use crate::error::{Error, Result};
use crate::youtube_api::{ReportQuery, YouTubeClient};
use jiff::ToSpan;
use jiff::civil::Date;
use serde_json::Value;
use std::fmt;

/// Metrics requested for every video, in request order.
pub const METRICS: [&str; 5] = [
    "views",
    "estimatedMinutesWatched",
    "averageViewDuration",
    "subscribersGained",
    "subscribersLost",
];

pub const VIDEO_DIMENSION: &str = "video";

/// Only the most-viewed videos are reported.
pub const MAX_VIDEOS: u32 = 50;

const WINDOW_DAYS: i64 = 30;

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    /// `[today - 30 days, today]`.
    pub fn last_30_days(today: Date) -> Self {
        Self {
            start: today.saturating_sub(WINDOW_DAYS.days()),
            end: today,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// The analytics report as returned: headers in API order and raw row values.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// One video's counters over the reporting period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRow {
    pub video_id: String,
    pub views: u64,
    pub estimated_minutes_watched: u64,
    /// Seconds.
    pub average_view_duration: u64,
    pub subscribers_gained: u64,
    pub subscribers_lost: u64,
}

impl MetricsTable {
    /// Resolves every row by column name, whatever order the API used.
    pub fn rows(&self) -> Result<Vec<MetricsRow>> {
        let column = |name: &str| {
            self.columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| malformed(format!("response has no {name} column")))
        };
        let video = column(VIDEO_DIMENSION)?;
        let [views, minutes, duration, gained, lost] = [
            column(METRICS[0])?,
            column(METRICS[1])?,
            column(METRICS[2])?,
            column(METRICS[3])?,
            column(METRICS[4])?,
        ];

        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let video_id = row
                    .get(video)
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed(format!("row {i} has no video id")))?;
                let read = |at: usize| counter(row.get(at), i, &self.columns[at]);
                Ok(MetricsRow {
                    video_id: video_id.to_string(),
                    views: read(views)?,
                    estimated_minutes_watched: read(minutes)?,
                    average_view_duration: read(duration)?,
                    subscribers_gained: read(gained)?,
                    subscribers_lost: read(lost)?,
                })
            })
            .collect()
    }
}

fn counter(value: Option<&Value>, row: usize, column: &str) -> Result<u64> {
    let value = value.ok_or_else(|| malformed(format!("row {row} has no {column} value")))?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 => Ok(f.round() as u64),
        _ => Err(malformed(format!(
            "row {row} has {column} = {value}, expected a non-negative number"
        ))),
    }
}

fn malformed(what: String) -> Error {
    Error::query("read video metrics", eyre::eyre!(what))
}

/// Fetches the top videos by views for `range`.
///
/// One `reports.query` call for the channel of the authenticated account,
/// dimensioned by video, sorted by views descending, capped at [`MAX_VIDEOS`].
pub async fn fetch_video_metrics(client: &YouTubeClient, range: DateRange) -> Result<MetricsTable> {
    let query = ReportQuery {
        ids: "channel==MINE",
        start_date: range.start,
        end_date: range.end,
        metrics: &METRICS,
        dimensions: VIDEO_DIMENSION,
        sort: "-views",
        max_results: MAX_VIDEOS,
    };

    let report = client
        .query_report(&query)
        .await
        .map_err(|e| Error::query("fetch video metrics", e))?;

    let table = MetricsTable {
        columns: report.column_headers.into_iter().map(|h| h.name).collect(),
        rows: report.rows.unwrap_or_default(),
    };
    tracing::info!(%range, videos = table.rows.len(), "fetched video metrics");
    Ok(table)
}

#[cfg(test)]
pub(crate) fn report_json(columns: &[&str], rows: serde_json::Value) -> serde_json::Value {
    let headers: Vec<_> = columns
        .iter()
        .map(|name| {
            let column_type = if *name == VIDEO_DIMENSION { "DIMENSION" } else { "METRIC" };
            serde_json::json!({"name": name, "columnType": column_type, "dataType": "INTEGER"})
        })
        .collect();
    serde_json::json!({
        "kind": "youtubeAnalytics#resultTable",
        "columnHeaders": headers,
        "rows": rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockApi;
    use crate::youtube_api::client::test_client;
    use jiff::civil::date;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const API_ORDER: [&str; 6] = [
        "video",
        "views",
        "estimatedMinutesWatched",
        "averageViewDuration",
        "subscribersGained",
        "subscribersLost",
    ];

    #[test]
    fn window_is_thirty_days_inclusive() {
        let range = DateRange::last_30_days(date(2026, 3, 10));
        assert_eq!(range.start, date(2026, 2, 8));
        assert_eq!(range.end, date(2026, 3, 10));
        assert_eq!(range.to_string(), "2026-02-08 to 2026-03-10");
    }

    #[test]
    fn rows_resolve_by_column_name() {
        let table = MetricsTable {
            columns: vec![
                "subscribersLost".into(),
                "views".into(),
                "video".into(),
                "averageViewDuration".into(),
                "estimatedMinutesWatched".into(),
                "subscribersGained".into(),
            ],
            rows: vec![vec![json!(1), json!(100), json!("v1"), json!(30), json!(50), json!(2)]],
        };

        assert_eq!(
            table.rows().unwrap(),
            vec![MetricsRow {
                video_id: "v1".into(),
                views: 100,
                estimated_minutes_watched: 50,
                average_view_duration: 30,
                subscribers_gained: 2,
                subscribers_lost: 1,
            }]
        );
    }

    #[test]
    fn float_counters_are_rounded() {
        let table = MetricsTable {
            columns: API_ORDER.iter().map(|c| c.to_string()).collect(),
            rows: vec![vec![json!("v1"), json!(10), json!(12.6), json!(7.0), json!(0), json!(0)]],
        };
        let rows = table.rows().unwrap();
        assert_eq!(rows[0].estimated_minutes_watched, 13);
        assert_eq!(rows[0].average_view_duration, 7);
    }

    #[test]
    fn missing_column_is_query_error() {
        let table = MetricsTable {
            columns: vec!["video".into(), "views".into()],
            rows: vec![],
        };
        let err = table.rows().unwrap_err();
        assert!(matches!(err, Error::Query { .. }), "{err:?}");
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert_eq!(cause, "response has no estimatedMinutesWatched column");
    }

    #[test]
    fn negative_counter_is_query_error() {
        let table = MetricsTable {
            columns: API_ORDER.iter().map(|c| c.to_string()).collect(),
            rows: vec![vec![json!("v1"), json!(-5), json!(0), json!(0), json!(0), json!(0)]],
        };
        assert!(matches!(table.rows(), Err(Error::Query { .. })));
    }

    #[tokio::test]
    async fn queries_top_videos_for_range() {
        let api = MockApi::start(|_| {
            (
                200,
                report_json(
                    &API_ORDER,
                    json!([
                        ["v1", 100, 50, 30, 2, 0],
                        ["v2", 40, 10, 15, 0, 1],
                    ]),
                ),
            )
        })
        .await;
        let client = test_client(&api).await;

        let range = DateRange::last_30_days(date(2026, 10, 19));
        let table = fetch_video_metrics(&client, range).await.unwrap();

        assert_eq!(table.columns, API_ORDER.map(String::from).to_vec());
        assert_eq!(table.rows.len(), 2);
        let ids: Vec<_> = table.rows().unwrap().into_iter().map(|r| r.video_id).collect();
        assert_eq!(ids, ["v1", "v2"]);

        let requests = api.requests_to("/v2/reports");
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.param("ids"), Some("channel==MINE"));
        assert_eq!(request.param("startDate"), Some("2026-09-19"));
        assert_eq!(request.param("endDate"), Some("2026-10-19"));
        assert_eq!(
            request.param("metrics"),
            Some("views,estimatedMinutesWatched,averageViewDuration,subscribersGained,subscribersLost")
        );
        assert_eq!(request.param("dimensions"), Some("video"));
        assert_eq!(request.param("sort"), Some("-views"));
        assert_eq!(request.param("maxResults"), Some("50"));
    }

    #[tokio::test]
    async fn no_rows_is_empty_table() {
        let api = MockApi::start(|_| {
            (
                200,
                json!({
                    "kind": "youtubeAnalytics#resultTable",
                    "columnHeaders": [{"name": "video"}, {"name": "views"}],
                }),
            )
        })
        .await;
        let client = test_client(&api).await;

        let table = fetch_video_metrics(&client, DateRange::last_30_days(date(2026, 1, 1)))
            .await
            .unwrap();
        assert!(table.rows.is_empty());
    }

    #[tokio::test]
    async fn api_failure_is_query_error() {
        let api = MockApi::start(|_| {
            (
                403,
                json!({"error": {"code": 403, "message": "Forbidden"}}),
            )
        })
        .await;
        let client = test_client(&api).await;

        let err = fetch_video_metrics(&client, DateRange::last_30_days(date(2026, 1, 1)))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Query { operation: "fetch video metrics", .. }),
            "{err:?}"
        );
    }
}
