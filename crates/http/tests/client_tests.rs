//! Integration tests for the campus HTTP client

use campus_core::{RecordingNavigator, keys};
use campus_http::client::auth::LoginRequest;
use campus_http::{CampusClient, ClientError, RequestContext, Role, SessionCredential};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> (CampusClient, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::new());
    let client = CampusClient::builder()
        .base_url(server.uri())
        .navigator(navigator.clone())
        .build()
        .unwrap();
    (client, navigator)
}

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": data,
        "message": "OK"
    }))
}

fn unauthorized(code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "success": false,
        "code": code,
        "message": message
    }))
}

fn seed(client: &CampusClient, role: Role, token: &str, refresh: Option<&str>) {
    let mut credential = SessionCredential::new(token);
    if let Some(refresh) = refresh {
        credential = credential.with_refresh_token(refresh);
    }
    client.sessions().save(role, &credential).unwrap();
}

fn stored_token(client: &CampusClient, role: Role) -> Option<String> {
    client
        .sessions()
        .load(role)
        .unwrap()
        .map(|credential| credential.token)
}

#[tokio::test]
async fn test_client_builder() {
    let client = CampusClient::builder()
        .base_url("http://localhost:8080/api/")
        .timeout(Duration::from_secs(3))
        .build()
        .unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080/api");
}

#[tokio::test]
async fn test_success_returns_unwrapped_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .respond_with(ok(json!([{"code": "CSC101"}, {"code": "MTH201"}])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    let courses: Vec<Value> = client
        .get(&RequestContext::inferred(), "/courses")
        .await
        .unwrap();

    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0]["code"], "CSC101");
}

#[tokio::test]
async fn test_admin_route_attaches_admin_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .and(header("authorization", "Bearer admin-token"))
        .respond_with(ok(json!({"total": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed(&client, Role::Admin, "admin-token", None);
    seed(&client, Role::Student, "student-token", None);

    let stats: Value = client
        .get(&RequestContext::inferred().with_page("/admin/dashboard"), "/admin/users")
        .await
        .unwrap();
    assert_eq!(stats["total"], 3);
}

#[tokio::test]
async fn test_faculty_page_attaches_faculty_token_for_any_path() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/admin/counseling/42"))
        .and(header("authorization", "Bearer faculty-token"))
        .and(body_json(json!({"status": "accepted"})))
        .respond_with(ok(json!({"id": 42, "status": "accepted"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed(&client, Role::Admin, "admin-token", None);
    seed(&client, Role::Faculty, "faculty-token", None);

    let ctx = RequestContext::inferred().with_page("/faculty/requests");
    let updated: Value = client
        .patch(&ctx, "/admin/counseling/42", &json!({"status": "accepted"}))
        .await
        .unwrap();
    assert_eq!(updated["status"], "accepted");
}

#[tokio::test]
async fn test_student_legacy_record_is_used_as_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", "Bearer legacy-token"))
        .respond_with(ok(json!({"name": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    client
        .sessions()
        .store()
        .set(keys::LEGACY_AUTH, r#"{"state":{"token":"legacy-token"},"version":0}"#)
        .unwrap();

    let profile: Value = client
        .get(&RequestContext::inferred(), "/profile")
        .await
        .unwrap();
    assert_eq!(profile["name"], "Ada");
}

#[tokio::test]
async fn test_deactivated_account_clears_sessions_and_redirects_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appointments"))
        .respond_with(unauthorized(
            "FORBIDDEN",
            "Your account has been deactivated by the administrator",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Admin, "admin-token", Some("admin-refresh"));
    seed(&client, Role::Faculty, "faculty-token", Some("faculty-refresh"));
    seed(&client, Role::Student, "student-token", Some("student-refresh"));
    client
        .sessions()
        .store()
        .set(keys::LEGACY_AUTH, r#"{"token":"legacy"}"#)
        .unwrap();

    let err = client
        .get::<Value>(&RequestContext::inferred(), "/appointments")
        .await
        .unwrap_err();

    assert!(err.is_blocked());
    let normalized = err.normalized();
    assert_eq!(normalized.status, Some(401));
    assert!(normalized.blocked);
    assert_eq!(
        normalized.message,
        "Your account has been deactivated by the administrator"
    );

    let store = client.sessions().store();
    for key in keys::CREDENTIAL_KEYS {
        assert_eq!(store.get(key).unwrap(), None, "{key} should be cleared");
    }
    assert_eq!(
        store.get(keys::ACCOUNT_BLOCKED).unwrap().as_deref(),
        Some("true")
    );
    assert_eq!(
        store.get(keys::BLOCK_MESSAGE).unwrap().as_deref(),
        Some("Your account has been deactivated by the administrator")
    );
    assert_eq!(navigator.redirects(), vec!["/student-signin".to_string()]);
}

#[tokio::test]
async fn test_deactivated_faculty_is_sent_to_faculty_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/counseling/requests"))
        .respond_with(unauthorized("ACCOUNT_DEACTIVATED", "Account disabled"))
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Faculty, "faculty-token", None);

    let ctx = RequestContext::inferred().with_page("/faculty/dashboard");
    let err = client
        .get::<Value>(&ctx, "/counseling/requests")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::AccountBlocked { status: 401, .. }));
    assert_eq!(navigator.redirects(), vec!["/faculty-login".to_string()]);
    assert!(client.sessions().active_roles().unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_token_refreshes_and_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(body_json(json!({"refreshToken": "refresh-1"})))
        .respond_with(ok(json!({"accessToken": "fresh-token", "refreshToken": "refresh-2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ok(json!({"matric": "U2020/123"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Student, "stale-token", Some("refresh-1"));

    let me: Value = client
        .get(&RequestContext::inferred(), "/me")
        .await
        .unwrap();
    assert_eq!(me["matric"], "U2020/123");

    let stored = client.sessions().load(Role::Student).unwrap().unwrap();
    assert_eq!(stored.token, "fresh-token");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
    assert!(navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_second_unauthorized_after_retry_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ok(json!({"token": "fresh-token"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Student, "stale-token", Some("refresh-1"));

    let err = client
        .get::<Value>(&RequestContext::inferred(), "/me")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Http { status: 401, .. }));
    assert_eq!(err.normalized().message, "jwt expired");
    assert_eq!(stored_token(&client, Role::Student).as_deref(), Some("fresh-token"));
    assert!(navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/faculty/schedule"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(body_json(json!({"refreshToken": "faculty-refresh"})))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "message": "Refresh token revoked"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Faculty, "faculty-token", Some("faculty-refresh"));
    seed(&client, Role::Student, "student-token", None);

    let err = client
        .get::<Value>(&RequestContext::for_role(Role::Faculty), "/faculty/schedule")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired(_)));
    assert!(err.is_auth_expired());
    assert!(client.sessions().active_roles().unwrap().is_empty());
    assert_eq!(navigator.redirects(), vec!["/faculty-login".to_string()]);
}

#[tokio::test]
async fn test_missing_refresh_token_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grades"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ok(json!({"token": "never-issued"})))
        .expect(0)
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Student, "student-token", None);

    let err = client
        .get::<Value>(&RequestContext::inferred(), "/grades")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired(_)));
    assert!(client.sessions().active_roles().unwrap().is_empty());
    assert_eq!(navigator.redirects(), vec!["/student-signin".to_string()]);
}

#[tokio::test]
async fn test_refresh_reply_without_token_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grades"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Student, "student-token", Some("student-refresh"));

    let err = client
        .get::<Value>(&RequestContext::inferred(), "/grades")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired(_)));
    assert_eq!(stored_token(&client, Role::Student), None);
    assert_eq!(navigator.redirects(), vec!["/student-signin".to_string()]);
}

#[tokio::test]
async fn test_refresh_timeout_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ok(json!({"token": "too-late"})).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let navigator = Arc::new(RecordingNavigator::new());
    let client = CampusClient::builder()
        .base_url(server.uri())
        .timeout(Duration::from_millis(300))
        .navigator(navigator.clone())
        .build()
        .unwrap();
    seed(&client, Role::Admin, "admin-token", Some("admin-refresh"));

    let err = client
        .get::<Value>(&RequestContext::inferred(), "/admin/users")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired(_)));
    assert_eq!(stored_token(&client, Role::Admin), None);
    assert_eq!(navigator.redirects(), vec!["/student-signin".to_string()]);
}

#[tokio::test]
async fn test_concurrent_requests_redirect_once_when_refresh_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"success": false, "message": "Refresh token revoked"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Student, "stale-token", Some("refresh-1"));

    let ctx = RequestContext::inferred();
    let (first, second) = tokio::join!(
        client.get::<Value>(&ctx, "/timetable"),
        client.get::<Value>(&ctx, "/announcements"),
    );

    assert!(matches!(first, Err(ClientError::SessionExpired(_))));
    assert!(matches!(second, Err(ClientError::SessionExpired(_))));
    assert!(client.sessions().active_roles().unwrap().is_empty());
    assert_eq!(navigator.redirects(), vec!["/student-signin".to_string()]);
}

#[tokio::test]
async fn test_refresh_keeps_other_fields_of_stored_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(body_json(json!({"refreshToken": "r"})))
        .respond_with(ok(json!({"token": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ok(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    client
        .sessions()
        .store()
        .set(
            keys::STUDENT_AUTH,
            r#"{"state":{"token":"stale","refreshToken":"r","user":{"id":1},"isAuthenticated":true},"version":3}"#,
        )
        .unwrap();

    let profile: Value = client
        .get(&RequestContext::inferred(), "/profile")
        .await
        .unwrap();
    assert_eq!(profile["id"], 1);

    let raw = client
        .sessions()
        .store()
        .get(keys::STUDENT_AUTH)
        .unwrap()
        .unwrap();
    let record: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(record["state"]["token"], "fresh");
    assert_eq!(record["state"]["refreshToken"], "r");
    assert_eq!(record["state"]["isAuthenticated"], true);
    assert_eq!(record["version"], 3);
}

#[tokio::test]
async fn test_refresh_uses_legacy_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/reports"))
        .and(header("authorization", "Bearer admin-stale"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(body_json(json!({"refreshToken": "global-refresh"})))
        .respond_with(ok(json!({"token": "admin-fresh"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/reports"))
        .and(header("authorization", "Bearer admin-fresh"))
        .respond_with(ok(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed(&client, Role::Admin, "admin-stale", None);
    client
        .sessions()
        .store()
        .set(
            keys::LEGACY_AUTH,
            r#"{"state":{"token":"old","refreshToken":"global-refresh"}}"#,
        )
        .unwrap();

    let reports: Vec<Value> = client
        .get(&RequestContext::inferred(), "/admin/reports")
        .await
        .unwrap();
    assert!(reports.is_empty());
    assert_eq!(stored_token(&client, Role::Admin).as_deref(), Some("admin-fresh"));
}

#[tokio::test]
async fn test_concurrent_expired_requests_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(unauthorized("TOKEN_EXPIRED", "jwt expired"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ok(json!({"token": "fresh-token"})).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ok(json!({"ok": true})))
        .expect(5)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed(&client, Role::Student, "stale-token", Some("refresh-1"));

    let ctx = RequestContext::inferred();
    let requests = (0..5).map(|i| {
        let client = client.clone();
        let ctx = ctx.clone();
        async move {
            client
                .get::<Value>(&ctx, &format!("/notifications/{i}"))
                .await
        }
    });
    let results = futures::future::join_all(requests).await;

    for result in results {
        assert_eq!(result.unwrap()["ok"], true);
    }
}

#[tokio::test]
async fn test_other_errors_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/counseling/requests"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "success": false,
            "message": "You already have a pending request",
            "data": {"requestId": 9}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    seed(&client, Role::Student, "student-token", None);

    let err = client
        .post::<Value, _>(
            &RequestContext::for_role(Role::Student),
            "/counseling/requests",
            &json!({"reason": "course load"}),
        )
        .await
        .unwrap_err();

    let normalized = err.normalized();
    assert_eq!(normalized.status, Some(409));
    assert_eq!(normalized.message, "You already have a pending request");
    assert_eq!(normalized.data.unwrap()["data"]["requestId"], 9);
    assert!(!normalized.blocked);
}

#[tokio::test]
async fn test_plain_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grades"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ok(json!({"token": "never"})))
        .expect(0)
        .mount(&server)
        .await;

    let (client, navigator) = client_for(&server);
    seed(&client, Role::Student, "student-token", Some("refresh"));

    let err = client
        .get::<Value>(&RequestContext::inferred(), "/grades")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 401, ref message, .. } if message == "Unauthorized"));
    assert_eq!(stored_token(&client, Role::Student).as_deref(), Some("student-token"));
    assert!(navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_timeout_is_reported_generically() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ok(json!(null)).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = CampusClient::builder()
        .base_url(server.uri())
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let err = client
        .get::<Value>(&RequestContext::inferred(), "/slow")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Request(_)));
    assert_eq!(err.normalized().message, "Request timed out");
}

#[tokio::test]
async fn test_login_persists_credential_and_clears_block_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/faculty/login"))
        .and(body_json(json!({"email": "counselor@uni.edu", "password": "hunter2"})))
        .respond_with(ok(json!({
            "token": "faculty-token",
            "refreshToken": "faculty-refresh",
            "user": {"name": "Dr. Okafor", "role": "counselor"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    client.sessions().mark_blocked("old notice").unwrap();

    let credential = client
        .login(
            Role::Faculty,
            &LoginRequest {
                email: "counselor@uni.edu".into(),
                password: "hunter2".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(credential.refresh_token.as_deref(), Some("faculty-refresh"));
    let store = client.sessions().store();
    assert_eq!(
        store.get(keys::FACULTY_TOKEN).unwrap().as_deref(),
        Some("faculty-token")
    );
    assert_eq!(
        store.get(keys::FACULTY_REFRESH_TOKEN).unwrap().as_deref(),
        Some("faculty-refresh")
    );
    assert!(client.sessions().block_notice().unwrap().is_none());

    client.logout(Role::Faculty).unwrap();
    assert_eq!(stored_token(&client, Role::Faculty), None);
}

#[tokio::test]
async fn test_failed_login_reports_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/student/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "code": "TOKEN_EXPIRED",
            "message": "Invalid email or password"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    let err = client
        .login(
            Role::Student,
            &LoginRequest {
                email: "student@uni.edu".into(),
                password: "wrong".into(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.normalized().message, "Invalid email or password");
    assert!(client.sessions().active_roles().unwrap().is_empty());
}
