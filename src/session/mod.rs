//! Authenticated session bundle
//!
//! Logging in is handled by external tooling that writes a JSON cookie
//! bundle. This module only reads that bundle and turns it into the request
//! headers the channels need. A rejected session surfaces later as an auth
//! failure; replacing it means writing a new bundle and restarting.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading a session bundle
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to read session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse session file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Session is missing the {0} cookie")]
    MissingCookie(&'static str),
}

impl SessionError {
    /// True when the bundle was read but carries no usable session
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::MissingCookie(_))
    }
}

/// Cookie carrying the session id the CSRF token is derived from
pub const SESSION_ID_COOKIE: &str = "JSESSIONID";

/// One stored cookie
#[derive(Debug, Clone, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Request credentials derived from a cookie bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Value for the `Cookie` request header
    pub cookie_header: String,

    /// Value for the `csrf-token` request header
    pub csrf_token: String,
}

impl Session {
    /// Builds request credentials from stored cookies
    ///
    /// # Errors
    ///
    /// * `MissingCookie` if there is no `JSESSIONID` cookie
    pub fn from_cookies(cookies: &[StoredCookie]) -> Result<Self, SessionError> {
        let session_id = cookies
            .iter()
            .find(|c| c.name == SESSION_ID_COOKIE)
            .map(|c| c.value.as_str())
            .ok_or(SessionError::MissingCookie(SESSION_ID_COOKIE))?;

        let cookie_header = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        Ok(Self {
            cookie_header,
            csrf_token: csrf_token(session_id),
        })
    }
}

/// Derives the CSRF token from the session id cookie value
///
/// The stored value may be quoted and may already carry the `ajax:` prefix.
pub fn csrf_token(session_id: &str) -> String {
    let bare = session_id.trim_matches('"');
    let bare = bare.strip_prefix("ajax:").unwrap_or(bare);
    format!("ajax:{}", bare)
}

/// Source of a usable session
pub trait SessionProvider {
    fn session(&self) -> Result<Session, SessionError>;
}

/// Reads the cookie bundle written by the login tooling
#[derive(Debug, Clone)]
pub struct FileSessionProvider {
    path: PathBuf,
}

impl FileSessionProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SessionProvider for FileSessionProvider {
    fn session(&self) -> Result<Session, SessionError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| SessionError::Io {
            path: self.path.clone(),
            source,
        })?;
        let cookies: Vec<StoredCookie> = serde_json::from_str(&contents)?;
        tracing::debug!(
            "Loaded {} cookies from {}",
            cookies.len(),
            self.path.display()
        );
        Session::from_cookies(&cookies)
    }
}
