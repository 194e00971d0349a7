//! YouTube Analytics API report types.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// Parameters of a `reports.query` call.
///
/// See: <https://developers.google.com/youtube/analytics/reference/reports/query>
#[derive(Debug, Clone)]
pub struct ReportQuery<'a> {
    /// Whose data to report on, e.g. `channel==MINE`.
    pub ids: &'a str,
    /// First day of the reporting period (inclusive).
    pub start_date: Date,
    /// Last day of the reporting period (inclusive).
    pub end_date: Date,
    pub metrics: &'a [&'a str],
    pub dimensions: &'a str,
    /// Sort order; a leading `-` sorts descending.
    pub sort: &'a str,
    pub max_results: u32,
}

/// Response of a `reports.query` call: a table of dimension and metric values.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    /// Identifies the API resource's type.
    ///
    /// The value will be `youtubeAnalytics#resultTable`.
    pub kind: Option<String>,
    /// One header per column of `rows`, in the same order.
    #[serde(rename = "columnHeaders")]
    pub column_headers: Vec<ColumnHeader>,
    /// The report data. Omitted entirely when there is no data for the period.
    pub rows: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ColumnHeader {
    /// The dimension or metric name, e.g. `video` or `views`.
    pub name: String,
    /// `DIMENSION` or `METRIC`.
    #[serde(rename = "columnType")]
    pub column_type: Option<String>,
    /// e.g. `STRING`, `INTEGER`, `FLOAT`.
    #[serde(rename = "dataType")]
    pub data_type: Option<String>,
}
