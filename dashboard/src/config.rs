//! Command-line configuration and OAuth client secrets.

use crate::error::{Error, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_EXPORT_FILE: &str = "video_analytics.csv";

#[derive(Debug, Parser)]
#[command(name = "youtube-analytics")]
#[command(
    about = "Per-video YouTube analytics for the last 30 days, across several accounts",
    long_about = None
)]
pub struct Cli {
    /// Directory holding one stored credential per account
    #[arg(long, env = "YTA_CREDENTIALS_DIR", default_value = "credentials")]
    pub credentials_dir: PathBuf,

    /// OAuth client secrets file as downloaded from the Google Cloud console
    #[arg(long, env = "YTA_CLIENT_SECRETS", default_value = "client_secrets.json")]
    pub client_secrets: PathBuf,

    /// Redirect URI registered for the OAuth client (defaults to the first one in the secrets file)
    #[arg(long, env = "YTA_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List connected accounts
    Accounts,
    /// Connect a new account by pasting an authorization code
    AddAccount {
        /// Label to store the account under (defaults to the next `account_N`)
        #[arg(long)]
        label: Option<String>,
        /// Print the authorization URL instead of opening it in a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Show the 30-day per-video report for an account
    Report {
        #[arg(long)]
        account: String,
        /// Also write the report as CSV to this file
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },
    /// Interactive dashboard
    Dashboard {
        /// Print authorization URLs instead of opening them in a browser
        #[arg(long)]
        no_browser: bool,
    },
}

/// The `web` or `installed` section of a `client_secrets.json` file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(alias = "installed")]
    web: ClientSecrets,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecrets {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("malformed client secrets: {e}")))?;
        Ok(file.web)
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        Self::from_json(&json)
    }

    /// The redirect URI to use: an explicit one wins over the file's first entry.
    pub fn redirect_uri(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .or(self.redirect_uris.first().map(String::as_str))
            .map(str::to_string)
            .ok_or_else(|| Error::Config("no redirect URI configured".to_string()))
    }
}
