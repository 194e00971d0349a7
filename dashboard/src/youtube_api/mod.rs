//! Thin clients for the two Google APIs the dashboard reads from.
//!
//! * YouTube Analytics v2 (`reports.query`) for per-video counters over a date range.
//! * YouTube Data v3 (`videos.list`, `channels.list`) for titles, likes, comments,
//!   and the channel name.
//!
//! Everything here returns [`eyre::Result`]; the operations in
//! [`crate::metrics`] and [`crate::metadata`] turn failures into
//! [`crate::Error::Query`].

pub mod channels;
pub mod client;
pub mod reports;
pub mod types;
pub mod videos;

pub use client::{Endpoints, TimeBoundAccessToken, YouTubeClient};
pub use types::{PageInfo, PagedStream};

pub use channels::{Channel, ChannelSnippet};
pub use reports::{ColumnHeader, ReportQuery, ReportResponse};
pub use videos::{Video, VideoSnippet, VideoStatistics};
