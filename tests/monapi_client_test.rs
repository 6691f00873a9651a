//! Integration tests for the monitoring bulk API client
//!
//! Test coverage:
//! - Session login and cookie/CSRF propagation
//! - Change and query response parsing
//! - 401 re-authentication until the attempt limit
//! - Error status and connection failures

use fleetmon::domain::errors::RemoteError;
use fleetmon::domain::models::{
    ChangeKind, ChangeRequest, ChangeScope, Credentials, Entity, MonitoringConfig,
    RateLimitConfig, ServiceScope, Toggles,
};
use fleetmon::domain::ports::{MonitoringApi, StaticCredentials};
use fleetmon::infrastructure::monapi::MonApiClient;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

fn client(base_url: String) -> MonApiClient {
    let config = MonitoringConfig {
        base_url,
        request_timeout_secs: 5,
        timeout_ceiling_secs: 10,
        connect_timeout_secs: 2,
        ..MonitoringConfig::default()
    };
    let rate_limit = RateLimitConfig {
        requests_per_second: 1000.0,
        burst_size: 1000,
    };
    let credentials = Arc::new(StaticCredentials::new(Credentials {
        username: "ops".to_string(),
        password: "s3cret".to_string(),
    }));
    MonApiClient::new(&config, &rate_limit, credentials).expect("Failed to create client")
}

async fn mock_login(server: &mut Server, hits: usize) -> mockito::Mock {
    server
        .mock("POST", "/auth")
        .match_body(Matcher::PartialJson(json!({"username": "ops", "password": "s3cret"})))
        .with_status(200)
        .with_header("set-cookie", "session=abc123; Path=/; HttpOnly")
        .with_header("x-csrf-token", "tok-1")
        .expect(hits)
        .create_async()
        .await
}

fn change_body() -> String {
    json!({
        "data": {
            "response": {
                "h1": {
                    "success": true,
                    "alert_services": {
                        "HOST": {"data": {"checks": true, "notifications": "true", "status_string": "OK"}},
                        "HTTP": {"data": {"checks": "false", "notifications": 1}}
                    }
                }
            }
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_submit_sends_session_and_parses_response() {
    let mut server = Server::new_async().await;
    let login = mock_login(&mut server, 1).await;
    let modify = server
        .mock("PUT", "/bulk/entity/svc/modify")
        .match_header("cookie", Matcher::Regex("session=abc123".to_string()))
        .match_header("x-csrf-token", "tok-1")
        .match_body(Matcher::PartialJson(json!({
            "entities": ["h1"],
            "service_list": ["*"],
            "notify": true
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(change_body())
        .create_async()
        .await;

    let client = client(server.url());
    let kind = ChangeKind::Enable(Toggles::new(false, true));
    let scope = ChangeScope::new([Entity::from("h1")], ServiceScope::All);

    let response = client.submit(&ChangeRequest::new(&kind, &scope)).await.unwrap();

    login.assert_async().await;
    modify.assert_async().await;
    let report = &response.entities[&Entity::from("h1")];
    assert!(report.success);
    assert_eq!(report.state.services["HOST"].notifications_enabled, Some(true));
    assert_eq!(report.state.services["HTTP"].checks_enabled, Some(false));
    assert_eq!(report.state.services["HTTP"].notifications_enabled, Some(true));
}

#[tokio::test]
async fn test_session_reused_across_calls() {
    let mut server = Server::new_async().await;
    let login = mock_login(&mut server, 1).await;
    let query = server
        .mock("POST", "/bulk/entity/svc/query")
        .match_body(Matcher::PartialJson(json!({"service_list": ["DISK"]})))
        .with_status(200)
        .with_body(
            json!({"data": {"results": {"h1": {"alert_services": {
                "DISK": {"data": {"maintenance": [
                    {"created_by": "ops", "end_time": 1_767_323_045},
                    {"end_time": "2026-01-02T03:04:05Z"}
                ]}}
            }}}}})
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let client = client(server.url());
    let services = ServiceScope::from_names(["DISK"]);
    let hosts = [Entity::from("h1")];

    client.query_state(&hosts, &services).await.unwrap();
    let state = client.query_state(&hosts, &services).await.unwrap();

    login.assert_async().await;
    query.assert_async().await;
    let disk = &state[&Entity::from("h1")].services["DISK"];
    assert_eq!(disk.maintenance_count(), 2);
    assert_eq!(disk.maintenance[0].end_time, disk.maintenance[1].end_time);
}

#[tokio::test]
async fn test_repeated_401_exhausts_auth_attempts() {
    let mut server = Server::new_async().await;
    let login = mock_login(&mut server, 3).await;
    let modify = server
        .mock("PUT", "/bulk/entity/svc/modify")
        .with_status(401)
        .expect(3)
        .create_async()
        .await;

    let client = client(server.url());
    let kind = ChangeKind::Disable(Toggles::new(true, false));
    let scope = ChangeScope::new([Entity::from("h1")], ServiceScope::All);

    let err = client
        .submit(&ChangeRequest::new(&kind, &scope))
        .await
        .unwrap_err();

    assert_eq!(err, RemoteError::AuthenticationFailed { attempts: 3 });
    login.assert_async().await;
    modify.assert_async().await;
}

#[tokio::test]
async fn test_rejected_login_never_sends_change() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/auth")
        .with_status(401)
        .expect(4)
        .create_async()
        .await;
    let modify = server
        .mock("PUT", "/bulk/entity/svc/modify")
        .expect(0)
        .create_async()
        .await;

    let client = client(server.url());
    let err = client.authenticate().await.unwrap_err();
    assert_eq!(err, RemoteError::Unauthorized);

    let kind = ChangeKind::Enable(Toggles::new(true, true));
    let scope = ChangeScope::new([Entity::from("h1")], ServiceScope::All);
    let err = client
        .submit(&ChangeRequest::new(&kind, &scope))
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::AuthenticationFailed { .. }));
    modify.assert_async().await;
    // One explicit login, then three from the submit.
    login.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_reported_with_body() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server, 1).await;
    let _maint = server
        .mock("DELETE", "/bulk/entity/svc/maint")
        .with_status(500)
        .with_body("maintenance backend down")
        .create_async()
        .await;

    let client = client(server.url());
    let scope = ChangeScope::new([Entity::from("h1")], ServiceScope::All);
    let err = client
        .submit(&ChangeRequest::new(&ChangeKind::DowntimeDelete, &scope))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RemoteError::Status {
            status: 500,
            body: "maintenance backend down".to_string()
        }
    );
}

#[tokio::test]
async fn test_connection_refused_is_fatal() {
    // Nothing listens on port 1.
    let client = client("http://127.0.0.1:1".to_string());
    let err = client
        .query_state(&[Entity::from("h1")], &ServiceScope::All)
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Connection { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_connect_timeout_is_not_retried_as_read_timeout() {
    // Non-routable address: the connect attempt hangs until the connect timeout.
    let config = MonitoringConfig {
        base_url: "http://10.255.255.1:81".to_string(),
        request_timeout_secs: 30,
        timeout_increment_secs: 30,
        timeout_ceiling_secs: 90,
        connect_timeout_secs: 1,
        ..MonitoringConfig::default()
    };
    let credentials = Arc::new(StaticCredentials::new(Credentials {
        username: "ops".to_string(),
        password: "s3cret".to_string(),
    }));
    let client = MonApiClient::new(&config, &RateLimitConfig::default(), credentials).unwrap();

    let started = std::time::Instant::now();
    let err = client
        .query_state(&[Entity::from("h1")], &ServiceScope::All)
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Connection { .. }), "got {err:?}");
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
