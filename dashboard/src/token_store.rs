//! Flat-file storage of per-account OAuth credentials.
//!
//! Each account's token response lives in `<dir>/<label>.json`. The directory is
//! created on the first save; nothing else ever writes to it.

use crate::error::{Error, Result};
use oauth2::basic::BasicTokenResponse;
use std::path::{Path, PathBuf};

/// The credential stored for one account.
pub type Credential = BasicTokenResponse;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists `credential` under `label`, replacing whatever was stored before.
    pub async fn save(&self, label: &str, credential: &Credential) -> Result<()> {
        let path = self.path_for(label)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, e))?;

        let json = serde_json::to_vec_pretty(credential).map_err(|source| {
            Error::CorruptCredential {
                label: label.to_string(),
                source,
            }
        })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::io(&path, e))?;

        tracing::debug!(label, path = %path.display(), "saved credential");
        Ok(())
    }

    /// Loads the credential stored under `label`.
    pub async fn load(&self, label: &str) -> Result<Credential> {
        let path = self.path_for(label)?;
        let json = match tokio::fs::read(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::AccountNotFound(label.to_string()));
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        serde_json::from_slice(&json).map_err(|source| Error::CorruptCredential {
            label: label.to_string(),
            source,
        })
    }

    pub async fn contains(&self, label: &str) -> Result<bool> {
        let path = self.path_for(label)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::io(&path, e))
    }

    /// Labels of every stored credential, in the directory's listing order.
    pub async fn list_labels(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.dir, e)),
        };

        let mut labels = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                labels.push(stem.to_string());
            }
        }
        Ok(labels)
    }

    fn path_for(&self, label: &str) -> Result<PathBuf> {
        validate_label(label)?;
        Ok(self.dir.join(format!("{label}.{EXTENSION}")))
    }
}

pub(crate) fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || label.contains(['/', '\\']) || label.contains("..") {
        return Err(Error::InvalidLabel(label.to_string()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_credential(access_token: &str) -> Credential {
    use oauth2::basic::BasicTokenType;
    use oauth2::{AccessToken, EmptyExtraTokenFields, RefreshToken, Scope, StandardTokenResponse};

    let mut token = StandardTokenResponse::new(
        AccessToken::new(access_token.to_string()),
        BasicTokenType::Bearer,
        EmptyExtraTokenFields {},
    );
    token.set_refresh_token(Some(RefreshToken::new(format!("refresh-{access_token}"))));
    token.set_expires_in(Some(&std::time::Duration::from_secs(3599)));
    token.set_scopes(Some(vec![
        Scope::new("https://www.googleapis.com/auth/yt-analytics.readonly".to_string()),
        Scope::new("https://www.googleapis.com/auth/youtube.readonly".to_string()),
    ]));
    token
}
