//! Authenticated access to the YouTube Analytics and YouTube Data APIs.

use crate::oauth::OAuthManager;
use crate::token_store::Credential;
use crate::youtube_api::{
    channels::{Channel, ChannelListResponse},
    reports::{ReportQuery, ReportResponse},
    types::PagedStream,
    videos::VideoListResponse,
};
use eyre::Context;
use http::Method;
use oauth2::TokenResponse;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio_stream::Stream;
use tracing::instrument;

pub const ANALYTICS_BASE_URL: &str = "https://youtubeanalytics.googleapis.com/v2";
pub const DATA_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// A credential together with the moment its access token stops being usable.
#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: Credential,
    expires_at: SystemTime,
}

impl TimeBoundAccessToken {
    /// Wraps a credential that must be refreshed before its first use.
    ///
    /// Credentials read back from the token store go through here, since there
    /// is no telling how long ago they were issued.
    pub fn expired(token: Credential) -> Self {
        Self {
            expires_at: SystemTime::UNIX_EPOCH,
            token,
        }
    }

    /// Wraps a credential that was issued just now.
    pub fn new(token: Credential) -> Self {
        Self {
            expires_at: Self::calculate_token_expiry(&token),
            token,
        }
    }

    /// Refreshes this token, keeping the old refresh token if the provider
    /// does not hand out a new one.
    ///
    /// Returns `Ok(false)` if the credential can no longer be refreshed.
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        tracing::trace!("refreshing token");
        match oauth_manager
            .refresh_token(&self.token)
            .await
            .context("refresh OAuth token")?
        {
            Some(new_token) => {
                let old_token = std::mem::replace(&mut self.token, new_token);
                if self.token.refresh_token().is_none() {
                    tracing::trace!("new token lacks refresh token, preserving original");
                    self.token.set_refresh_token(old_token.refresh_token().cloned());
                }
                self.expires_at = Self::calculate_token_expiry(&self.token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// `expires_in` minus a 5 minute buffer, or 55 minutes if the provider did not say.
    fn calculate_token_expiry(token: &Credential) -> SystemTime {
        let now = SystemTime::now();
        match token.expires_in() {
            Some(expires_in) => now + expires_in.saturating_sub(Duration::from_secs(300)),
            None => now + Duration::from_secs(3300),
        }
    }
}

/// Where the two APIs live. Only ever changed to point at a local test server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub analytics: String,
    pub data: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            analytics: ANALYTICS_BASE_URL.to_string(),
            data: DATA_BASE_URL.to_string(),
        }
    }
}

/// Client for one account's view of the YouTube Analytics v2 and Data v3 APIs.
///
/// Expired access tokens are refreshed transparently before each call. Clones
/// share the same token, so a refresh done by one is seen by all.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    oauth_manager: Arc<OAuthManager>,
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl YouTubeClient {
    pub fn with_endpoints(
        token: TimeBoundAccessToken,
        oauth_manager: Arc<OAuthManager>,
        client: reqwest::Client,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
            oauth_manager,
            client,
            endpoints,
        }
    }

    /// The current credential, including any refresh that happened since it was loaded.
    pub async fn token(&self) -> Credential {
        self.token.lock().await.token.clone()
    }

    #[instrument(skip(self))]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;

        if SystemTime::now() >= token.expires_at {
            tracing::debug!("access token expired, attempting refresh");
            if token.refresh(&self.oauth_manager).await? {
                tracing::debug!("access token successfully refreshed");
            } else {
                tracing::error!("access token refresh failed, client is unusable");
                eyre::bail!("unable to refresh expired access token; sign in to the account again");
            }
        }

        Ok(token.token.access_token().secret().to_string())
    }

    /// Sends an authenticated request and parses a successful JSON response.
    ///
    /// Non-2xx responses become errors carrying the status and the response body.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<T> {
        let access_token = self.fresh_access_token().await?;

        let response = self
            .client
            .request(method.clone(), url)
            .header("Authorization", format!("Bearer {}", access_token))
            .query(query_params)
            .send()
            .await
            .with_context(|| format!("send {} request to YouTube API: {}", method, url))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            eyre::bail!(
                "YouTube API {} request failed with status {}: {}",
                method,
                status_code,
                error_text
            );
        }

        response
            .json()
            .await
            .with_context(|| format!("parse YouTube API response from {} as JSON", url))
    }

    /// Runs a YouTube Analytics report query.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/yt-analytics.readonly`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/analytics/reference/reports/query>
    #[instrument(skip(self))]
    pub async fn query_report(&self, query: &ReportQuery<'_>) -> eyre::Result<ReportResponse> {
        let url = format!("{}/reports", self.endpoints.analytics);
        let start_date = query.start_date.to_string();
        let end_date = query.end_date.to_string();
        let metrics = query.metrics.join(",");
        let max_results = query.max_results.to_string();
        let query_params = [
            ("ids", query.ids),
            ("startDate", start_date.as_str()),
            ("endDate", end_date.as_str()),
            ("metrics", metrics.as_str()),
            ("dimensions", query.dimensions),
            ("sort", query.sort),
            ("maxResults", max_results.as_str()),
        ];

        let report: ReportResponse = self.request_json(Method::GET, &url, &query_params).await?;

        tracing::debug!(
            columns = report.column_headers.len(),
            returned_rows = report.rows.as_ref().map_or(0, Vec::len),
            "fetched analytics report"
        );

        Ok(report)
    }

    /// Looks up snippet and statistics for up to 50 videos in one `videos.list` call.
    ///
    /// Videos that do not exist or are not visible to the account are simply
    /// missing from the response.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self, video_ids), fields(requested = video_ids.len()))]
    pub async fn list_videos(&self, video_ids: &[String]) -> eyre::Result<VideoListResponse> {
        let url = format!("{}/videos", self.endpoints.data);
        let ids = video_ids.join(",");
        let query_params = [("part", "snippet,statistics"), ("id", ids.as_str())];

        let videos: VideoListResponse = self.request_json(Method::GET, &url, &query_params).await?;

        tracing::debug!(returned_items = videos.items.len(), "fetched video metadata");

        Ok(videos)
    }

    /// Returns a paginated stream of the channels owned by the authenticated user.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self))]
    pub fn list_my_channels(&self) -> impl Stream<Item = eyre::Result<Channel>> + use<'_> {
        PagedStream::new(|page_token| async {
            let response = self.list_channels_internal(50, page_token).await?;
            Ok((response.items, response.next_page_token))
        })
    }

    async fn list_channels_internal(
        &self,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<ChannelListResponse> {
        let url = format!("{}/channels", self.endpoints.data);
        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "id,snippet"),
            ("mine", "true"),
            ("maxResults", max_results_string.as_str()),
        ];
        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let channels: ChannelListResponse =
            self.request_json(Method::GET, &url, &query_params).await?;

        tracing::debug!(
            total_results = channels.page_info.total_results,
            returned_items = channels.items.len(),
            "fetched channels"
        );

        Ok(channels)
    }
}

#[cfg(test)]
pub(crate) async fn test_client(api: &crate::test_support::MockApi) -> YouTubeClient {
    let oauth = crate::oauth::test_manager(&api.url("/token"));
    YouTubeClient::with_endpoints(
        TimeBoundAccessToken::new(crate::token_store::test_credential("live-token")),
        Arc::new(oauth),
        reqwest::Client::new(),
        Endpoints {
            analytics: api.url("/v2"),
            data: api.url("/youtube/v3"),
        },
    )
}
