//! Per-video YouTube analytics for the last 30 days, across several accounts.
//!
//! Credentials live in a [`TokenStore`], one file per account label. A
//! [`Connector`] turns a label into an authenticated [`YouTubeClient`], which
//! [`report::build_report`] uses to fetch metrics and metadata and assemble
//! them into a table.

use crate::accounts::AccountRegistry;
use crate::oauth::OAuthManager;
use crate::token_store::TokenStore;
use crate::youtube_api::{Endpoints, TimeBoundAccessToken, YouTubeClient};
use std::sync::Arc;

pub mod accounts;
pub mod assembly;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod oauth;
pub mod report;
pub mod token_store;
pub mod youtube_api;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

/// A connected account and the API client acting on its behalf.
#[derive(Debug, Clone)]
pub struct Account {
    pub label: String,
    pub yt: YouTubeClient,
}

/// Everything needed to go from an account label to a working client.
#[derive(Debug, Clone)]
pub struct Connector {
    registry: AccountRegistry,
    oauth_manager: Arc<OAuthManager>,
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl Connector {
    pub fn new(registry: AccountRegistry, oauth_manager: OAuthManager) -> Self {
        Self::with_endpoints(registry, oauth_manager, Endpoints::default())
    }

    pub fn with_endpoints(
        registry: AccountRegistry,
        oauth_manager: OAuthManager,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            registry,
            oauth_manager: Arc::new(oauth_manager),
            http: reqwest::Client::new(),
            endpoints,
        }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn store(&self) -> &TokenStore {
        self.registry.store()
    }

    pub fn oauth(&self) -> &OAuthManager {
        &self.oauth_manager
    }

    /// Loads the stored credential for `label` and builds a client for it.
    ///
    /// The access token is refreshed on first use, since there is no telling
    /// how old the stored one is.
    pub async fn connect(&self, label: &str) -> Result<Account> {
        let credential = self.store().load(label).await?;
        let yt = YouTubeClient::with_endpoints(
            TimeBoundAccessToken::expired(credential),
            self.oauth_manager.clone(),
            self.http.clone(),
            self.endpoints.clone(),
        );
        tracing::debug!(label, "connected to stored account");
        Ok(Account {
            label: label.to_string(),
            yt,
        })
    }

    /// Writes the account's current credential back, so a rotated refresh
    /// token survives the session.
    pub async fn save_token(&self, account: &Account) -> Result<()> {
        let credential = account.yt.token().await;
        self.store().save(&account.label, &credential).await
    }
}

#[cfg(test)]
pub(crate) fn test_connector(
    api: &test_support::MockApi,
    credentials_dir: &std::path::Path,
) -> Connector {
    Connector::with_endpoints(
        AccountRegistry::new(TokenStore::new(credentials_dir)),
        oauth::test_manager(&api.url("/token")),
        Endpoints {
            analytics: api.url("/v2"),
            data: api.url("/youtube/v3"),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockApi;
    use crate::token_store::test_credential;
    use oauth2::TokenResponse;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn connect_refreshes_and_saves_rotated_token() {
        let api = MockApi::start(|req| match req.path.as_str() {
            "/token" => (
                200,
                json!({
                    "access_token": "fresh",
                    "token_type": "Bearer",
                    "expires_in": 3599,
                    "refresh_token": "rotated",
                }),
            ),
            _ => (
                200,
                json!({
                    "kind": "youtube#channelListResponse",
                    "pageInfo": {"totalResults": 0, "resultsPerPage": 50},
                    "items": [],
                }),
            ),
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let connector = test_connector(&api, dir.path());
        connector
            .store()
            .save("main", &test_credential("stale"))
            .await
            .unwrap();

        let account = connector.connect("main").await.unwrap();
        assert_eq!(account.label, "main");
        assert_eq!(report::channel_name(&account.yt).await.unwrap(), None);

        let token = api.requests_to("/token");
        assert_eq!(token.len(), 1);
        assert_eq!(token[0].method, hyper::Method::POST);
        assert_eq!(token[0].form_field("grant_type"), Some("refresh_token"));
        assert_eq!(token[0].form_field("refresh_token"), Some("refresh-stale"));

        connector.save_token(&account).await.unwrap();
        let saved = connector.store().load("main").await.unwrap();
        assert_eq!(saved.access_token().secret(), "fresh");
        assert_eq!(saved.refresh_token().unwrap().secret(), "rotated");
    }

    #[tokio::test]
    async fn connect_unknown_label_is_not_found() {
        let api = MockApi::start(|_| (500, json!({}))).await;
        let dir = tempfile::tempdir().unwrap();
        let connector = test_connector(&api, dir.path());

        let err = connector.connect("ghost").await.unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(ref l) if l == "ghost"), "{err:?}");
        assert!(api.requests().is_empty());
    }
}
