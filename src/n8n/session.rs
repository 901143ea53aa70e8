use reqwest::header::{HeaderMap, SET_COOKIE};

use super::errors::N8nError;

/// Name of the cookie n8n uses to carry the session token.
pub const AUTH_COOKIE: &str = "n8n-auth";

/// Login credentials for the n8n account used by the harness.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Build credentials from optional configuration values.
    pub fn from_parts(email: Option<&str>, password: Option<&str>) -> Result<Self, N8nError> {
        let email = email
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| N8nError::Config("N8N_EMAIL is not set".to_string()))?;
        let password = password
            .filter(|v| !v.is_empty())
            .ok_or_else(|| N8nError::Config("N8N_PASSWORD is not set".to_string()))?;
        Ok(Self::new(email, password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One harness session against an n8n instance.
///
/// A session starts unauthenticated. [`N8nClient::authenticate`] fills in the
/// token; every other call refuses to run until it is present.
///
/// [`N8nClient::authenticate`]: super::client::N8nClient::authenticate
#[derive(Debug, Clone)]
pub struct Session {
    base_url: String,
    token: Option<String>,
    user_email: Option<String>,
}

impl Session {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            user_email: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Token for an authenticated call, or [`N8nError::NotAuthenticated`].
    pub fn require_token(&self) -> Result<&str, N8nError> {
        self.token.as_deref().ok_or(N8nError::NotAuthenticated)
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> Result<String, N8nError> {
        Ok(format!("{}={}", AUTH_COOKIE, self.require_token()?))
    }

    pub fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }

    pub(crate) fn establish(&mut self, token: String, user_email: Option<String>) {
        self.token = Some(token);
        self.user_email = user_email;
    }
}

/// Pull the session token out of the `Set-Cookie` headers of a login response.
pub fn extract_auth_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_auth_cookie)
}

fn parse_auth_cookie(header: &str) -> Option<String> {
    let prefix = format!("{AUTH_COOKIE}=");
    // A single header may fold several cookies together.
    header
        .split(|c: char| c == ';' || c == ',')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(prefix.as_str()))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
