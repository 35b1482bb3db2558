//! Cached OAuth token → authenticated HTTP client.
//!
//! Only the cached-token path is supported: the token file is produced by a
//! separate consent flow and read here as-is. Refreshing an expired token is
//! left to that flow.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("token file {path} could not be read ({source}); run the OAuth consent flow to create it")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token file {path} is not a valid token: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("token file {path} holds an empty access token")]
    EmptyToken { path: PathBuf },

    #[error("access token is not a valid header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// On-disk OAuth token, in the layout written by the common OAuth2 libraries.
#[derive(Debug, Clone, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
}

impl CachedToken {
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let token: CachedToken =
            serde_json::from_str(&raw).map_err(|source| CredentialsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if token.access_token.trim().is_empty() {
            return Err(CredentialsError::EmptyToken {
                path: path.to_path_buf(),
            });
        }
        info!(
            path = %path.display(),
            has_refresh_token = token.refresh_token.is_some(),
            expiry = token.expiry.as_deref().unwrap_or("unknown"),
            "Loaded cached OAuth token"
        );
        Ok(token)
    }

    /// `Authorization` header value, defaulting the scheme to `Bearer`.
    pub fn authorization(&self) -> String {
        let scheme = self
            .token_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Bearer");
        format!("{} {}", scheme, self.access_token)
    }
}

/// Builds a client that sends the token on every request.
pub fn authorized_client(
    token: &CachedToken,
    timeout: Option<Duration>,
) -> Result<Client, CredentialsError> {
    let mut value = HeaderValue::from_str(&token.authorization())?;
    value.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);

    let mut builder = Client::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if token.refresh_token.is_none() {
        warn!("Cached token has no refresh token; it cannot be renewed once expired");
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_token_and_defaults_scheme() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"access_token":"abc","refresh_token":"r"}}"#).unwrap();
        let token = CachedToken::from_file(file.path()).unwrap();
        assert_eq!(token.authorization(), "Bearer abc");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = CachedToken::from_file(Path::new("/definitely/not/here/token.json")).unwrap_err();
        assert!(matches!(err, CredentialsError::Read { .. }));
        assert!(err.to_string().contains("consent flow"));
    }

    #[test]
    fn empty_token_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"access_token":"  ","token_type":"Bearer"}}"#).unwrap();
        assert!(matches!(
            CachedToken::from_file(file.path()),
            Err(CredentialsError::EmptyToken { .. })
        ));
    }
}
