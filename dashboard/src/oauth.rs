//! OAuth 2.0 sign-in and token refresh for the YouTube APIs.
//!
//! Signing in is a two-step, paste-back flow: [`OAuthManager::begin_authentication`]
//! produces a consent URL for the user to open, and
//! [`OAuthManager::complete_authentication`] exchanges the code the provider hands
//! back for a credential, which is then written to the [`TokenStore`].

use crate::config::ClientSecrets;
use crate::error::{Error, Result};
use crate::token_store::{self, Credential, TokenStore};
use eyre::Context;
use oauth2::basic::BasicClient;
use oauth2::url::Url;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, reqwest,
};

/// Read-only access to channel analytics and to channel/video metadata.
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/yt-analytics.readonly",
    "https://www.googleapis.com/auth/youtube.readonly",
];

#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    http_client: reqwest::Client,
}

/// One in-progress sign-in.
///
/// The session owns the PKCE verifier for its authorization request, and gives it
/// up on the first exchange attempt. A consumed session can never exchange a code
/// again; the user has to start over with a new session.
#[derive(Debug)]
pub struct AuthSession {
    label: String,
    authorize_url: Url,
    csrf: CsrfToken,
    pkce_verifier: Option<PkceCodeVerifier>,
}

impl AuthSession {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    pub fn is_consumed(&self) -> bool {
        self.pkce_verifier.is_none()
    }

    /// Pulls the authorization code out of what the user pasted.
    ///
    /// Accepts either the bare code or the whole URL the provider redirected to;
    /// in the latter case the `state` parameter must match this session.
    fn code_from_input(&self, pasted: &str) -> Result<AuthorizationCode> {
        let pasted = pasted.trim();
        if pasted.is_empty() {
            return Err(Error::AuthExchange("no authorization code was provided".into()));
        }

        let url = match Url::parse(pasted) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => return Ok(AuthorizationCode::new(pasted.to_string())),
        };

        let mut state = None;
        let mut code = None;
        for (k, v) in url.query_pairs() {
            match &*k {
                "state" => state = Some(v.into_owned()),
                "code" => code = Some(v.into_owned()),
                _ => {}
            }
        }
        if state.as_deref() != Some(self.csrf.secret().as_str()) {
            return Err(Error::AuthExchange(
                "redirect URL does not belong to this sign-in".into(),
            ));
        }
        code.map(AuthorizationCode::new)
            .ok_or_else(|| Error::AuthExchange("redirect URL carries no authorization code".into()))
    }
}

impl OAuthManager {
    pub fn new(secrets: &ClientSecrets, redirect_uri: &str) -> Result<Self> {
        let auth_url = AuthUrl::new(secrets.auth_uri.clone())
            .map_err(|e| Error::Config(format!("auth_uri: {e}")))?;
        let token_url = TokenUrl::new(secrets.token_uri.clone())
            .map_err(|e| Error::Config(format!("token_uri: {e}")))?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| Error::Config(format!("redirect URI: {e}")))?;

        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("building reqwest client should not fail");

        Ok(Self {
            client_id: ClientId::new(secrets.client_id.clone()),
            client_secret: ClientSecret::new(secrets.client_secret.clone()),
            auth_url,
            token_url,
            redirect_url,
            http_client,
        })
    }

    /// Starts a sign-in for the account to be stored as `label`.
    ///
    /// Nothing is contacted or written until the user completes the consent step
    /// and the code is handed to [`Self::complete_authentication`].
    pub fn begin_authentication(&self, label: &str) -> Result<AuthSession> {
        token_store::validate_label(label)?;

        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (authorize_url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            // ask for a refresh token, and ask again even if consent was given before
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(label, url = %authorize_url, "started OAuth sign-in");
        Ok(AuthSession {
            label: label.to_string(),
            authorize_url,
            csrf,
            pkce_verifier: Some(pkce_verifier),
        })
    }

    /// Exchanges the pasted authorization code and stores the resulting credential.
    ///
    /// This consumes the session whether or not the exchange succeeds.
    pub async fn complete_authentication(
        &self,
        session: &mut AuthSession,
        pasted: &str,
        store: &TokenStore,
    ) -> Result<Credential> {
        if session.is_consumed() {
            return Err(Error::AuthSessionConsumed);
        }
        let code = session.code_from_input(pasted)?;
        let Some(pkce_verifier) = session.pkce_verifier.take() else {
            return Err(Error::AuthSessionConsumed);
        };

        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let credential = client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| {
                tracing::warn!(label = %session.label, error = %e, "authorization code rejected");
                Error::AuthExchange(e.into())
            })?;

        if credential.refresh_token().is_none() {
            tracing::warn!(
                label = %session.label,
                "provider issued no refresh token; the account will need to sign in again once the access token expires"
            );
        }

        store.save(&session.label, &credential).await?;
        tracing::info!(label = %session.label, "account connected");
        Ok(credential)
    }

    /// Attempts to refresh a credential using its refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_token))` - Refresh succeeded
    /// * `Ok(None)` - No refresh token, or the provider considers it an invalid grant
    /// * `Err(_)` - Network or other error occurred during the refresh attempt
    pub(crate) async fn refresh_token(
        &self,
        token: &Credential,
    ) -> eyre::Result<Option<Credential>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };

        tracing::debug!("attempting to refresh OAuth token");

        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone());

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&self.http_client)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_manager(token_uri: &str) -> OAuthManager {
    let secrets = ClientSecrets {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        auth_uri: crate::config::DEFAULT_AUTH_URI.to_string(),
        token_uri: token_uri.to_string(),
        redirect_uris: vec!["https://dashboard.example.com/".to_string()],
    };
    OAuthManager::new(&secrets, "https://dashboard.example.com/").unwrap()
}
