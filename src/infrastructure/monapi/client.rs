use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::rate_limiter::RequestLimiter;
use super::session::Session;
use super::timeout::TimeoutLadder;
use super::types::{AuthRequest, BulkRequest, Envelope};
use crate::domain::errors::RemoteError;
use crate::domain::models::{
    ActualState, BulkChangeResponse, ChangeKind, ChangeRequest, Entity, MonitoringConfig,
    RateLimitConfig, ServiceScope,
};
use crate::domain::ports::{CredentialProvider, MonitoringApi};

/// Path prefix of every bulk endpoint.
pub const BULK_PATH: &str = "/bulk/entity/svc/";

/// HTTP method and endpoint under [`BULK_PATH`] for a change kind.
pub fn route(kind: &ChangeKind) -> (Method, &'static str) {
    match kind {
        ChangeKind::Enable(_) | ChangeKind::Disable(_) => (Method::PUT, "modify"),
        ChangeKind::Downtime(_) => (Method::POST, "maint"),
        ChangeKind::DowntimeDelete => (Method::DELETE, "maint"),
        ChangeKind::Ack { .. } => (Method::POST, "ack"),
        ChangeKind::AckDelete => (Method::DELETE, "ack"),
        ChangeKind::PassiveRun { submit: true } => (Method::PUT, "run"),
        ChangeKind::PassiveRun { submit: false } => (Method::POST, "run"),
    }
}

/// reqwest adapter for the monitoring bulk API.
///
/// Logs in lazily, re-authenticates on 401 up to `auth_attempts` times and
/// retries read timeouts through a [`TimeoutLadder`]. Connection failures are
/// returned immediately.
pub struct MonApiClient {
    http: ReqwestClient,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    session: RwLock<Session>,
    ladder: TimeoutLadder,
    limiter: RequestLimiter,
    auth_attempts: u32,
}

impl MonApiClient {
    pub fn new(
        config: &MonitoringConfig,
        rate_limit: &RateLimitConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let http = ReqwestClient::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            session: RwLock::new(Session::default()),
            ladder: TimeoutLadder::from_config(config),
            limiter: RequestLimiter::from_config(rate_limit),
            auth_attempts: config.auth_attempts.max(1),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{BULK_PATH}{path}", self.base_url)
    }

    /// Log in now rather than on the first call.
    pub async fn authenticate(&self) -> Result<(), RemoteError> {
        let session = self.login().await?;
        *self.session.write().await = session;
        Ok(())
    }

    async fn login(&self) -> Result<Session, RemoteError> {
        let credentials = self.credentials.credentials();
        let url = format!("{}/auth", self.base_url);
        self.limiter.acquire().await;

        let response = self
            .http
            .post(&url)
            .timeout(self.ladder.initial())
            .json(&AuthRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|err| self.map_transport(err, &url, self.ladder.initial()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(user = %credentials.username, "Login rejected");
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let session = Session::from_headers(response.headers());
        if !session.is_authenticated() {
            return Err(RemoteError::InvalidResponse(
                "login response carried no session cookie".to_string(),
            ));
        }
        info!(user = %credentials.username, "Authenticated with monitoring API");
        Ok(session)
    }

    /// Current session headers, logging in first if there is no session.
    async fn session_headers(&self) -> Result<(Session, HeaderMap), RemoteError> {
        {
            let session = self.session.read().await;
            if session.is_authenticated() {
                return Ok((session.clone(), session.headers()));
            }
        }

        let mut session = self.session.write().await;
        if !session.is_authenticated() {
            *session = self.login().await?;
        }
        Ok((session.clone(), session.headers()))
    }

    /// Drop `stale` so the next call logs in again; a session another
    /// worker already replaced is kept.
    async fn invalidate(&self, stale: &Session) {
        let mut session = self.session.write().await;
        if *session == *stale {
            *session = Session::default();
        }
    }

    async fn call(&self, method: Method, path: &str, body: &BulkRequest) -> Result<Envelope, RemoteError> {
        let url = self.endpoint(path);
        let mut failures = 0u32;

        loop {
            let attempt = match self.session_headers().await {
                Ok((session, headers)) => {
                    let result = self
                        .ladder
                        .execute(|timeout| {
                            self.send_once(method.clone(), &url, body, headers.clone(), timeout)
                        })
                        .await;
                    if matches!(result, Err(RemoteError::Unauthorized)) {
                        self.invalidate(&session).await;
                    }
                    result
                }
                Err(err) => Err(err),
            };

            match attempt {
                Err(RemoteError::Unauthorized) => {
                    failures += 1;
                    if failures >= self.auth_attempts {
                        warn!(attempts = failures, url = %url, "Giving up after repeated 401s");
                        return Err(RemoteError::AuthenticationFailed { attempts: failures });
                    }
                    warn!(attempt = failures, url = %url, "Unauthorized, re-authenticating");
                }
                other => return other,
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: &BulkRequest,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<Envelope, RemoteError> {
        self.limiter.acquire().await;
        debug!(%method, url, timeout_secs = timeout.as_secs(), entities = body.entities.len(), "Sending bulk request");

        let response = self
            .http
            .request(method, url)
            .headers(headers)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| self.map_transport(err, url, timeout))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Envelope>()
            .await
            .map_err(|err| self.map_transport(err, url, timeout))
    }

    /// Connect timeouts count as connection failures; only read timeouts
    /// climb the ladder.
    fn map_transport(&self, err: reqwest::Error, url: &str, timeout: Duration) -> RemoteError {
        if err.is_connect() {
            RemoteError::Connection {
                endpoint: url.to_string(),
                message: err.to_string(),
            }
        } else if err.is_timeout() {
            RemoteError::ReadTimeout {
                timeout_secs: timeout.as_secs(),
                ceiling_secs: self.ladder.ceiling_secs(),
            }
        } else if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else {
            RemoteError::Connection {
                endpoint: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl MonitoringApi for MonApiClient {
    #[instrument(skip(self, request), fields(kind = %request.kind, entities = request.entities.len()))]
    async fn submit(&self, request: &ChangeRequest<'_>) -> Result<BulkChangeResponse, RemoteError> {
        let (method, path) = route(request.kind);
        let envelope = self.call(method, path, &BulkRequest::from(request)).await?;
        Ok(BulkChangeResponse::from(envelope))
    }

    #[instrument(skip(self, entities, services), fields(entities = entities.len()))]
    async fn query_state(
        &self,
        entities: &[Entity],
        services: &ServiceScope,
    ) -> Result<ActualState, RemoteError> {
        let body = BulkRequest::query(entities, services.to_wire());
        let envelope = self.call(Method::POST, "query", &body).await?;
        Ok(BulkChangeResponse::from(envelope).into_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DowntimeWindow, Toggles};
    use chrono::Utc;

    #[test]
    fn test_routes() {
        let (method, path) = route(&ChangeKind::Enable(Toggles::new(true, true)));
        assert_eq!((method, path), (Method::PUT, "modify"));

        let window = DowntimeWindow {
            comment: "c".to_string(),
            duration_secs: 60,
            start_time: Utc::now(),
        };
        assert_eq!(route(&ChangeKind::Downtime(window)), (Method::POST, "maint"));
        assert_eq!(route(&ChangeKind::DowntimeDelete), (Method::DELETE, "maint"));
        assert_eq!(route(&ChangeKind::AckDelete), (Method::DELETE, "ack"));
        assert_eq!(route(&ChangeKind::PassiveRun { submit: true }), (Method::PUT, "run"));
        assert_eq!(route(&ChangeKind::PassiveRun { submit: false }), (Method::POST, "run"));
    }
}
