//! Integration tests for the `DocuVault` HTTP API.
//!
//! Each test builds the full router over the in-memory repository and
//! object store and drives it with `tower::ServiceExt::oneshot`. No network
//! socket is opened.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use docuvault_core::memory::MemoryRepository;
use docuvault_server::build_router;
use docuvault_server::config::ServerConfig;
use docuvault_server::state::AppState;
use docuvault_storage::MemoryObjectStore;

const BASE: &str = "http://localhost";
const BOUNDARY: &str = "docuvault-test-boundary";

/// Helper: router over fresh in-memory backends.
fn app_with(config: ServerConfig) -> Router {
    let state = AppState::new(
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryObjectStore::new()),
        &config,
    );
    build_router(Arc::new(state))
}

fn test_config() -> ServerConfig {
    ServerConfig::from_lookup(|key| match key {
        "DOCUVAULT_PUBLIC_URL" => Some(format!("{BASE}/storage/documents")),
        _ => None,
    })
}

fn app() -> Router {
    app_with(test_config())
}

/// Helper: send a request and return (status, headers' content type, body bytes).
async fn send_raw(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, bytes.to_vec())
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(app, req).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Helper: register `phone` and confirm the OTP; returns the session token.
async fn sign_up(app: &Router, name: &str, phone: &str) -> String {
    let (status, _) = send(
        app,
        json_request(
            Method::POST,
            "/v1/auth/register",
            None,
            &json!({"name": name, "phone": phone}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/v1/auth/verify",
            None,
            &json!({"phone": phone, "otp": "123456"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "verify failed: {body}");
    body["token"].as_str().unwrap().to_owned()
}

/// Helper: multipart upload of one file plus optional text fields.
fn upload_request(token: &str, file_name: &str, bytes: &[u8], fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/v1/documents")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}

async fn upload(app: &Router, token: &str, file_name: &str) -> Value {
    let (status, body) = send(app, upload_request(token, file_name, b"%PDF-1.4 test", &[])).await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {body}");
    body
}

async fn invite_code(app: &Router, token: &str, document_id: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/v1/invite-code",
            Some(token),
            &json!({"document_id": document_id}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "invite failed: {body}");
    body["code"].as_str().unwrap().to_owned()
}

async fn redeem(app: &Router, token: &str, document_id: &str, code: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            Method::POST,
            &format!("/v1/documents/{document_id}/share"),
            Some(token),
            &json!({"code": code}),
        ),
    )
    .await
}

// ── Health & auth guard ──────────────────────────────────────────────

#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    let (status, body) = send(&app, get("/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_routes_need_a_session() {
    let app = app();

    let (status, body) = send(&app, get("/v1/documents", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let req = Request::builder()
        .uri("/v1/profile")
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/v1/profile", Some("dv_not-a-real-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let app = app();
    let response = app.oneshot(get("/v1/health", None)).await.unwrap();
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["cache-control"], "no-store");
}

// ── Registration, login, profile ─────────────────────────────────────

#[tokio::test]
async fn test_register_login_profile_logout() {
    let app = app();

    // Wrong OTP fails and clears the pending state.
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/v1/auth/register",
            None,
            &json!({"name": "Ana", "phone": "+15550001"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "otp_pending");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/v1/auth/verify",
            None,
            &json!({"phone": "+15550001", "otp": "654321"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = sign_up(&app, "Ana", "+15550001").await;

    let (status, body) = send(&app, get("/v1/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ana");
    assert_eq!(body["phone"], "+15550001");

    let (status, body) = send(
        &app,
        json_request(
            Method::PATCH,
            "/v1/profile",
            Some(&token),
            &json!({"email": "ana@example.com", "age": 34}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ana@example.com");
    assert_eq!(body["age"], 34);

    // Logging in again by phone reaches the same profile.
    let (status, _) = send(
        &app,
        json_request(Method::POST, "/v1/auth/otp", None, &json!({"phone": "+15550001"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/v1/auth/verify",
            None,
            &json!({"phone": "+15550001", "otp": "123456"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "logged_in");
    assert_eq!(body["profile"]["email"], "ana@example.com");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/v1/auth/logout", Some(&token), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logged_out"], true);

    let (status, _) = send(&app, get("/v1/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cancel_and_blank_phone() {
    let app = app();

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/v1/auth/otp", None, &json!({"phone": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(
        &app,
        json_request(Method::POST, "/v1/auth/otp", None, &json!({"phone": "+15550009"})),
    )
    .await;
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/v1/auth/cancel", None, &json!({"phone": "+15550009"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);
    assert_eq!(body["state"], "unauthenticated");
}

// ── Documents ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upload_then_list_and_fetch() {
    let app = app();
    let token = sign_up(&app, "Ana", "+15550001").await;

    let (status, doc) = send(
        &app,
        upload_request(&token, "auto_policy.pdf", b"%PDF-1.4 body", &[("provider", "Acme Mutual")]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{doc}");
    assert_eq!(doc["type"], "Auto");
    assert_eq!(doc["provider"], "Acme Mutual");
    assert_eq!(doc["premium"], "$125/month");
    assert_eq!(doc["file_type"], "application/pdf");
    assert_eq!(doc["file_size"], 13);
    assert_eq!(doc["shared"], false);

    let (status, body) = send(&app, get("/v1/documents", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let documents = body["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["id"], doc["id"]);

    // The public URL is served by the storage route.
    let file_url = doc["file_url"].as_str().unwrap();
    let path = file_url.strip_prefix(BASE).unwrap();
    let (status, content_type, bytes) = send_raw(&app, get(path, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert_eq!(bytes, b"%PDF-1.4 body");

    let id = doc["id"].as_str().unwrap();
    let (status, _, bytes) =
        send_raw(&app, get(&format!("/v1/documents/{id}/file"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"%PDF-1.4 body");
}

#[tokio::test]
async fn test_upload_rejects_bad_files() {
    let app = app();
    let token = sign_up(&app, "Ana", "+15550001").await;

    let (status, body) = send(&app, upload_request(&token, "notes.txt", b"hello", &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = send(&app, upload_request(&token, "empty.pdf", b"", &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        upload_request(&token, "home.pdf", b"x", &[("due_date", "tomorrow")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, get("/v1/documents", Some(&token))).await;
    assert!(body["documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_extract_endpoint() {
    let app = app();
    let token = sign_up(&app, "Ana", "+15550001").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/v1/documents/extract",
            Some(&token),
            &json!({"file_name": "health_card.png"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "Health");
    assert_eq!(body["provider"], "BlueCross BlueShield");
}

#[tokio::test]
async fn test_update_records_edit_history() {
    let app = app();
    let token = sign_up(&app, "Ana", "+15550001").await;
    let doc = upload(&app, &token, "life.pdf").await;
    let id = doc["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/v1/documents/{id}"),
            Some(&token),
            &json!({"name": "Term Life", "premium": null}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Term Life");
    assert_eq!(body["premium"], Value::Null);

    let (status, _) = send(
        &app,
        json_request(Method::PATCH, &format!("/v1/documents/{id}"), Some(&token), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get(&format!("/v1/documents/{id}/edits"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let edits = body["edits"].as_array().unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0]["edit_type"], "update");
}

#[tokio::test]
async fn test_download_survives_control_characters_in_name() {
    let app = app();
    let token = sign_up(&app, "Ana", "+15550001").await;
    let doc = upload(&app, &token, "auto.pdf").await;
    let id = doc["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/v1/documents/{id}"),
            Some(&token),
            &json!({"name": "Auto\u{1}Policy"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, bytes) =
        send_raw(&app, get(&format!("/v1/documents/{id}/file"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!bytes.is_empty());
}

#[tokio::test]
async fn test_delete_twice() {
    let app = app();
    let owner = sign_up(&app, "Ana", "+15550001").await;
    let friend = sign_up(&app, "Ben", "+15550002").await;
    let doc = upload(&app, &owner, "home.pdf").await;
    let id = doc["id"].as_str().unwrap();

    let code = invite_code(&app, &owner, id).await;
    let (status, _) = redeem(&app, &friend, id, &code).await;
    assert_eq!(status, StatusCode::CREATED);

    // Grantees cannot delete.
    let (status, _) = send(&app, delete(&format!("/v1/documents/{id}"), &friend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, delete(&format!("/v1/documents/{id}"), &owner)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, delete(&format!("/v1/documents/{id}"), &owner)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, get("/v1/documents", Some(&owner))).await;
    assert!(body["documents"].as_array().unwrap().is_empty());
    let (_, body) = send(&app, get("/v1/shared", Some(&friend))).await;
    assert!(body["documents"].as_array().unwrap().is_empty());

    let path = doc["file_url"].as_str().unwrap().strip_prefix(BASE).unwrap();
    let (status, _) = send(&app, get(path, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Sharing ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_share_and_revoke_flip_shared_flag() {
    let app = app();
    let owner = sign_up(&app, "Ana", "+15550001").await;
    let friend = sign_up(&app, "Ben", "+15550002").await;
    let doc = upload(&app, &owner, "health.pdf").await;
    let id = doc["id"].as_str().unwrap();

    let code = invite_code(&app, &owner, id).await;
    let (_, current) = send(&app, get("/v1/invite-code", Some(&owner))).await;
    assert_eq!(current["invite_code"]["code"], code.as_str());
    assert_eq!(current["active"], true);

    // Codes are case-insensitive and trimmed.
    let (status, grant) = redeem(&app, &friend, id, &format!(" {} ", code.to_lowercase())).await;
    assert_eq!(status, StatusCode::CREATED, "{grant}");
    assert_eq!(grant["user_name"], "Ben");

    let (status, _) = redeem(&app, &friend, id, &code).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, get(&format!("/v1/documents/{id}"), Some(&owner))).await;
    assert_eq!(body["shared"], true);

    // The grantee can read but not edit.
    let (status, body) = send(&app, get("/v1/shared", Some(&friend))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"].as_array().unwrap().len(), 1);
    let (status, _) = send(&app, get(&format!("/v1/documents/{id}"), Some(&friend))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/v1/documents/{id}"),
            Some(&friend),
            &json!({"name": "Mine now"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, get(&format!("/v1/documents/{id}/access"), Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_array().unwrap();
    assert_eq!(access.len(), 1);
    let friend_id = access[0]["user_id"].as_str().unwrap().to_owned();

    let (status, _) = send(&app, get(&format!("/v1/documents/{id}/access"), Some(&friend))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        delete(&format!("/v1/documents/{id}/access/{friend_id}"), &owner),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, get(&format!("/v1/documents/{id}"), Some(&owner))).await;
    assert_eq!(body["shared"], false);
    let (status, _) = send(&app, get(&format!("/v1/documents/{id}"), Some(&friend))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invite_code_is_scoped_to_one_document() {
    let app = app();
    let owner = sign_up(&app, "Ana", "+15550001").await;
    let friend = sign_up(&app, "Ben", "+15550002").await;
    let first = upload(&app, &owner, "auto.pdf").await;
    let second = upload(&app, &owner, "home.pdf").await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    let code = invite_code(&app, &owner, first_id).await;
    let (status, body) = redeem(&app, &friend, second_id, &code).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    // Regenerating invalidates the previous code.
    let fresh = invite_code(&app, &owner, first_id).await;
    assert_ne!(fresh, code);
    let (status, _) = redeem(&app, &friend, first_id, &code).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = redeem(&app, &friend, first_id, &fresh).await;
    assert_eq!(status, StatusCode::CREATED);

    // Only the owner can issue a code.
    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/v1/invite-code",
            Some(&friend),
            &json!({"document_id": first_id}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_expired_invite_code_is_gone() {
    let mut config = test_config();
    config.invite_ttl_secs = -60;
    let app = app_with(config);

    let owner = sign_up(&app, "Ana", "+15550001").await;
    let friend = sign_up(&app, "Ben", "+15550002").await;
    let doc = upload(&app, &owner, "life.pdf").await;
    let id = doc["id"].as_str().unwrap();

    let code = invite_code(&app, &owner, id).await;
    let (_, current) = send(&app, get("/v1/invite-code", Some(&owner))).await;
    assert_eq!(current["active"], false);

    let (status, body) = redeem(&app, &friend, id, &code).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "gone");
}

#[tokio::test]
async fn test_storage_route_rejects_traversal_and_missing() {
    let app = app();
    let (status, _) = send(&app, get("/storage/documents/nobody/missing.pdf", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/storage/documents/a/../b.pdf", None)).await;
    assert_ne!(status, StatusCode::OK);
}
