use reqwest::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use std::fmt;

const SESSION_COOKIE: &str = "session";
const CSRF_COOKIE: &str = "csrf_token";
/// Header carrying the CSRF token on both login response and later requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Authenticated session state returned by `/auth`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    session: Option<String>,
    csrf_token: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session", &self.session.as_ref().map(|_| "[REDACTED]"))
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Session {
    /// Pull the session cookie and CSRF token out of a login response.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut session = Self::default();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            match name.trim() {
                SESSION_COOKIE => session.session = Some(value.trim().to_string()),
                CSRF_COOKIE => session.csrf_token = Some(value.trim().to_string()),
                _ => {}
            }
        }
        if let Some(token) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
            session.csrf_token = Some(token.to_string());
        }
        session
    }

    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Headers to attach to an authenticated request.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let cookies: Vec<String> = [
            (SESSION_COOKIE, &self.session),
            (CSRF_COOKIE, &self.csrf_token),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("{name}={v}")))
        .collect();

        if !cookies.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&cookies.join("; ")) {
                headers.insert(COOKIE, value);
            }
        }
        if let Some(token) = self
            .csrf_token
            .as_deref()
            .and_then(|t| HeaderValue::from_str(t).ok())
        {
            headers.insert(CSRF_HEADER, token);
        }
        headers
    }
}
