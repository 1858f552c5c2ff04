//! API Integration Tests
//!
//! Every test drives the full router over the in-memory store, media store
//! and recording mailer.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
};
use async_trait::async_trait;
use photoshare_api::auth::{AccessTable, CacheStatsReport, Operation, Resource, SessionCache};
use photoshare_api::testing::TestApp;
use photoshare_core::{Account, AccountRepository, AppConfig, Role};
use std::sync::Arc;
use serde_json::{json, Value};
use std::time::Duration;

/// Helper to create a test request
fn create_json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn login_request(uri: &str, email: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "username={}&password={}",
            email.replace('@', "%40"),
            password
        )))
        .unwrap()
}

const BOUNDARY: &str = "photoshare-test-boundary";

/// Multipart upload with a small file and optional text fields
fn upload_request(token: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cat.jpg\"\r\nContent-Type: image/jpeg\r\n\r\nnot-really-a-jpeg\r\n--{BOUNDARY}--\r\n"
    ));

    Request::builder()
        .method("POST")
        .uri("/api/photos")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn wait_for_token(app: &TestApp, email: &str) -> String {
    for _ in 0..50 {
        if let Some(token) = app.mailer.last_token_for(email) {
            return token;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no confirmation mail for {email}");
}

async fn upload_photo(app: &TestApp, token: &str) -> i64 {
    let response = app
        .send(upload_request(token, &[("description", "a cat"), ("tags", "cat, pets")]))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().unwrap()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = TestApp::new();

    let response = app
        .send(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["media_backend"], "memory");

    app.state.set_ready(false);
    let response = app
        .send(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_prometheus_metrics() {
    let app = TestApp::new();
    let (_, token) = app.account_with_token("metrics", Role::User).await;

    let response = app
        .send(create_json_request("GET", "/api/users/me", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("photoshare_uptime_seconds"));
    assert!(text.contains("photoshare_session_cache_misses_total 1"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/api/auth/signup"].is_object());
}

// =============================================================================
// Account Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_signup_confirm_login() {
    let app = TestApp::new();

    let response = app
        .send(create_json_request(
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "username": "alice",
                "email": "Alice@Example.com",
                "password": "wonderland"
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "alice@example.com");
    assert_eq!(json["user"]["role"], "user");
    assert_eq!(json["user"]["confirmed"], false);

    // Same email in another case is a duplicate
    let response = app
        .send(create_json_request(
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "username": "alice2",
                "email": "alice@example.com",
                "password": "wonderland"
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .send(login_request("/api/auth/login", "alice@example.com", "wonderland"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Email not confirmed");

    let token = wait_for_token(&app, "alice@example.com").await;
    let uri = format!("/api/auth/confirmed_email/{token}");

    let response = app.send(create_json_request("GET", &uri, None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Email confirmed");

    let response = app.send(create_json_request("GET", &uri, None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Your email is already confirmed"
    );

    let response = app
        .send(login_request("/api/auth/login", "alice@example.com", "wonderland"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["token_type"], "bearer");
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
}

#[tokio::test]
async fn test_signup_validation() {
    let app = TestApp::new();

    let response = app
        .send(create_json_request(
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({"username": "al", "email": "not-an-email", "password": "123"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_failures() {
    let app = TestApp::new();
    app.create_account("bob", "bob@example.com", "builder1", Role::User)
        .await;

    let response = app
        .send(login_request("/api/auth/login", "nobody@example.com", "builder1"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
    assert_eq!(body_json(response).await["message"], "Invalid email");

    let response = app
        .send(login_request("/api/auth/login", "bob@example.com", "wrong-pass"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid password");

    // Only admins pass the admin login
    let response = app
        .send(login_request(
            "/api/auth/admin_login",
            "bob@example.com",
            "builder1",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Operation forbidden");

    app.create_account("root", "root@example.com", "rootpass", Role::Admin)
        .await;
    let response = app
        .send(login_request(
            "/api/auth/admin_login",
            "root@example.com",
            "rootpass",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_token_rotation_and_reuse() {
    let app = TestApp::new();
    app.create_account("carol", "carol@example.com", "password1", Role::User)
        .await;
    let first = app.login("carol@example.com", "password1").await;

    let refresh = |token: String| create_json_request("GET", "/api/auth/refresh_token", Some(&token), None);

    // R0 -> R1
    let response = app.send(refresh(first.refresh_token.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    let r1 = second["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(r1, first.refresh_token);

    // R1 -> R2
    let response = app.send(refresh(r1.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let r2 = body_json(response).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    // Replaying R1 is a mismatch and clears the stored token
    let response = app.send(refresh(r1)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid refresh token");

    let account = app
        .store
        .find_account_by_email("carol@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.refresh_token, None);

    // So the latest token is dead as well, and so is R0
    let response = app.send(refresh(r2)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = app.send(refresh(first.refresh_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // An access token is not a refresh token
    let response = app.send(refresh(first.access_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["message"],
        "Invalid scope for token"
    );
}

#[tokio::test]
async fn test_logout_clears_refresh_token() {
    let app = TestApp::new();
    app.create_account("dave", "dave@example.com", "password1", Role::User)
        .await;
    let pair = app.login("dave@example.com", "password1").await;

    let response = app
        .send(create_json_request(
            "GET",
            "/api/auth/logout",
            Some(&pair.access_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["detail"], "Logged out");

    let response = app
        .send(create_json_request(
            "GET",
            "/api/auth/refresh_token",
            Some(&pair.refresh_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new();

    let response = app
        .send(create_json_request("GET", "/api/users/me", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["message"],
        "Could not validate credentials"
    );

    let response = app
        .send(create_json_request("GET", "/api/users/me", Some("garbage"), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ban_blocks_login() {
    let app = TestApp::new();
    let (_, admin_token) = app.account_with_token("admin", Role::Admin).await;
    let user = app
        .create_account("erin", "erin@example.com", "secret-pass", Role::User)
        .await;
    let pair = app.login("erin@example.com", "secret-pass").await;

    let response = app
        .send(create_json_request(
            "PATCH",
            &format!("/api/users/ban/{}", user.id),
            Some(&admin_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["active"], false);
    assert_eq!(json["email"], "erin@example.com");

    let stored = app
        .store
        .find_account_by_email("erin@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.active);
    assert_eq!(stored.refresh_token, None);

    // The refresh token issued before the ban is dead
    let response = app
        .send(create_json_request(
            "GET",
            "/api/auth/refresh_token",
            Some(&pair.refresh_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid refresh token");

    let response = app
        .send(login_request("/api/auth/login", "erin@example.com", "secret-pass"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Operation forbidden");

    let response = app
        .send(create_json_request(
            "PATCH",
            "/api/users/ban/9999",
            Some(&admin_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "User not found");
}

// =============================================================================
// Access Table Tests
// =============================================================================

#[tokio::test]
async fn test_moderation_requires_admin() {
    let app = TestApp::new();
    let (_, moderator_token) = app.account_with_token("mod", Role::Moderator).await;
    let (user, user_token) = app.account_with_token("frank", Role::User).await;

    for token in [&moderator_token, &user_token] {
        let response = app
            .send(create_json_request(
                "PATCH",
                &format!("/api/users/{}/role", user.id),
                Some(token),
                Some(json!({"role": "admin"})),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["message"], "Operation forbidden");
    }

    // Moderators may browse the directory, users may not
    let response = app
        .send(create_json_request("GET", "/api/users", Some(&moderator_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .send(create_json_request("GET", "/api/users", Some(&user_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_profile_update_self_override() {
    let app = TestApp::new();
    let (grace, grace_token) = app.account_with_token("grace", Role::User).await;
    let (heidi, _) = app.account_with_token("heidi", Role::User).await;

    let response = app
        .send(create_json_request(
            "PUT",
            &format!("/api/users/{}", grace.id),
            Some(&grace_token),
            Some(json!({"username": "grace_h"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "grace_h");

    let response = app
        .send(create_json_request(
            "PUT",
            &format!("/api/users/{}", heidi.id),
            Some(&grace_token),
            Some(json!({"username": "hacked"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Taking someone else's email is a conflict
    let response = app
        .send(create_json_request(
            "PUT",
            &format!("/api/users/{}", grace.id),
            Some(&grace_token),
            Some(json!({"email": "heidi@example.com"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_staff_update_of_other_accounts() {
    let app = TestApp::new();
    let (admin, admin_token) = app.account_with_token("root", Role::Admin).await;
    let (_, moderator_token) = app.account_with_token("mona", Role::Moderator).await;
    let (user, _) = app.account_with_token("ulla", Role::User).await;
    let user_uri = format!("/api/users/{}", user.id);

    // A moderator cannot touch an admin at all
    for body in [
        json!({"password": "new-secret"}),
        json!({"email": "root2@example.com"}),
        json!({"username": "demoted"}),
    ] {
        let response = app
            .send(create_json_request(
                "PUT",
                &format!("/api/users/{}", admin.id),
                Some(&moderator_token),
                Some(body),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["message"], "Operation forbidden");
    }
    let response = app
        .send(login_request("/api/auth/login", "root@example.com", "secret-pass"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // A moderator may rename a user but not change credentials
    let response = app
        .send(create_json_request(
            "PUT",
            &user_uri,
            Some(&moderator_token),
            Some(json!({"username": "ulla_renamed"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "ulla_renamed");

    for body in [
        json!({"password": "new-secret"}),
        json!({"email": "ulla2@example.com"}),
    ] {
        let response = app
            .send(create_json_request(
                "PUT",
                &user_uri,
                Some(&moderator_token),
                Some(body),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    // An admin may reset a user's password
    let response = app
        .send(create_json_request(
            "PUT",
            &user_uri,
            Some(&admin_token),
            Some(json!({"password": "reset-pass"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    app.login("ulla@example.com", "reset-pass").await;
}

#[tokio::test]
async fn test_password_change_ends_refresh_sessions() {
    let app = TestApp::new();
    let user = app
        .create_account("nina", "nina@example.com", "secret-pass", Role::User)
        .await;
    let pair = app.login("nina@example.com", "secret-pass").await;

    let response = app
        .send(create_json_request(
            "PUT",
            &format!("/api/users/{}", user.id),
            Some(&pair.access_token),
            Some(json!({"password": "fresh-pass"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(create_json_request(
            "GET",
            "/api/auth/refresh_token",
            Some(&pair.refresh_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid refresh token");

    app.login("nina@example.com", "fresh-pass").await;
}

#[tokio::test]
async fn test_email_change_requires_confirmation() {
    let app = TestApp::new();
    let (user, token) = app.account_with_token("otto", Role::User).await;

    let response = app
        .send(create_json_request(
            "PUT",
            &format!("/api/users/{}", user.id),
            Some(&token),
            Some(json!({"email": "otto.new@example.com"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "otto.new@example.com");

    let stored = app
        .store
        .find_account_by_id(user.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.confirmed);

    let response = app
        .send(login_request("/api/auth/login", "otto.new@example.com", "secret-pass"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The mail goes to the new address and confirming it restores login
    let email_token = wait_for_token(&app, "otto.new@example.com").await;
    let response = app
        .send(create_json_request(
            "GET",
            &format!("/api/auth/confirmed_email/{email_token}"),
            None,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    app.login("otto.new@example.com", "secret-pass").await;
}

#[tokio::test]
async fn test_custom_access_table() {
    let app = TestApp::with_state(AppConfig::default(), |state| {
        state.with_access_table(AccessTable::standard().allow(
            Resource::Comment,
            Operation::Delete,
            &[Role::User],
        ))
    });
    let (_, user_token) = app.account_with_token("paul", Role::User).await;
    let (_, moderator_token) = app.account_with_token("quinn", Role::Moderator).await;
    let photo_id = upload_photo(&app, &user_token).await;

    let mut uris = Vec::new();
    for text in ["first", "second"] {
        let response = app
            .send(create_json_request(
                "POST",
                "/api/comments",
                Some(&user_token),
                Some(json!({"photo_id": photo_id, "text": text})),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_i64().unwrap();
        uris.push(format!("/api/comments/{id}"));
    }

    let response = app
        .send(create_json_request("DELETE", &uris[0], Some(&user_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(create_json_request("DELETE", &uris[1], Some(&moderator_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_comment_delete_is_staff_only() {
    let app = TestApp::new();
    let (_, owner_token) = app.account_with_token("ivan", Role::User).await;
    let (_, moderator_token) = app.account_with_token("judy", Role::Moderator).await;
    let photo_id = upload_photo(&app, &owner_token).await;

    let response = app
        .send(create_json_request(
            "POST",
            "/api/comments",
            Some(&owner_token),
            Some(json!({"photo_id": photo_id, "text": "my cat"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let comment_id = body_json(response).await["id"].as_i64().unwrap();
    let uri = format!("/api/comments/{comment_id}");

    // The author cannot delete, only staff can
    let response = app
        .send(create_json_request("DELETE", &uri, Some(&owner_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Only the author may edit, whatever the role
    let response = app
        .send(create_json_request(
            "PUT",
            &uri,
            Some(&moderator_token),
            Some(json!({"text": "edited"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request("DELETE", &uri, Some(&moderator_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(create_json_request("DELETE", &uri, Some(&moderator_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comment_on_missing_photo() {
    let app = TestApp::new();
    let (_, token) = app.account_with_token("ken", Role::User).await;

    let response = app
        .send(create_json_request(
            "POST",
            "/api/comments",
            Some(&token),
            Some(json!({"photo_id": 404, "text": "hello"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Photo and Ownership Tests
// =============================================================================

#[tokio::test]
async fn test_photo_upload_and_tags() {
    let app = TestApp::new();
    let (owner, token) = app.account_with_token("leo", Role::User).await;

    let response = app
        .send(upload_request(
            &token,
            &[("description", "sunset"), ("tags", "Sunset, #sea sea beach")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["owner_id"], owner.id);
    assert_eq!(json["tags"], json!(["#sunset", "#sea", "#beach"]));
    assert_eq!(app.media.len().await, 1);

    let response = app
        .send(upload_request(&token, &[("tags", "a b c d e f")]))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Too many tags");

    let response = app
        .send(create_json_request(
            "GET",
            "/api/photos?tag=sunset",
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .send(create_json_request(
            "GET",
            "/api/photos?tag=nothing",
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(create_json_request(
            "GET",
            "/api/photos?limit=51",
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_photo_ownership() {
    let app = TestApp::new();
    let (_, owner_token) = app.account_with_token("mia", Role::User).await;
    let (_, other_token) = app.account_with_token("ned", Role::User).await;
    let (_, moderator_token) = app.account_with_token("olga", Role::Moderator).await;
    let (_, admin_token) = app.account_with_token("pete", Role::Admin).await;
    let photo_id = upload_photo(&app, &owner_token).await;
    let uri = format!("/api/photos/{photo_id}");

    let response = app
        .send(create_json_request("GET", &uri, Some(&other_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request("GET", &uri, Some(&moderator_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Moderators may read and delete but not edit
    let response = app
        .send(create_json_request(
            "PUT",
            &uri,
            Some(&moderator_token),
            Some(json!({"description": "edited"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request(
            "PUT",
            &uri,
            Some(&admin_token),
            Some(json!({"description": "edited", "tags": "new"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["description"], "edited");
    assert_eq!(json["tags"], json!(["#new"]));

    let response = app
        .send(create_json_request(
            "PATCH",
            &format!("{uri}/untag"),
            Some(&owner_token),
            Some(json!({"tags": "missing"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Tag not found");

    let response = app
        .send(create_json_request("DELETE", &uri, Some(&other_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request("DELETE", &uri, Some(&moderator_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.media.is_empty().await);

    // Missing records are 404 before any ownership decision
    let response = app
        .send(create_json_request("GET", &uri, Some(&other_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_photos_of_another_user() {
    let app = TestApp::new();
    let (owner, owner_token) = app.account_with_token("quinn", Role::User).await;
    let (_, other_token) = app.account_with_token("rita", Role::User).await;
    upload_photo(&app, &owner_token).await;
    let uri = format!("/api/photos?user_id={}", owner.id);

    let response = app
        .send(create_json_request("GET", &uri, Some(&other_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request("GET", &uri, Some(&owner_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_moderator_cannot_upload() {
    let app = TestApp::new();
    let (_, token) = app.account_with_token("sam", Role::Moderator).await;

    let response = app.send(upload_request(&token, &[])).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tag_catalogue() {
    let app = TestApp::new();
    let (_, user_token) = app.account_with_token("gus", Role::User).await;
    let (_, moderator_token) = app.account_with_token("hana", Role::Moderator).await;
    upload_photo(&app, &user_token).await;

    let response = app
        .send(create_json_request("GET", "/api/tags", Some(&user_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let tags = body_json(response).await;
    let tags = tags.as_array().unwrap();
    assert_eq!(tags.len(), 2);
    let cat = tags.iter().find(|tag| tag["name"] == "#cat").unwrap();
    let uri = format!("/api/tags/{}", cat["id"].as_i64().unwrap());

    let response = app
        .send(create_json_request("DELETE", &uri, Some(&user_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request("DELETE", &uri, Some(&moderator_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(create_json_request("DELETE", &uri, Some(&moderator_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Tag not found");
}

// =============================================================================
// Rating Tests
// =============================================================================

#[tokio::test]
async fn test_rating_rules() {
    let app = TestApp::new();
    let (_, owner_token) = app.account_with_token("tina", Role::User).await;
    let (_, rater_token) = app.account_with_token("uma", Role::User).await;
    let (_, admin_token) = app.account_with_token("vic", Role::Admin).await;
    let photo_id = upload_photo(&app, &owner_token).await;

    let rate = |token: &str, rate: i64| {
        create_json_request(
            "POST",
            "/api/ratings",
            Some(token),
            Some(json!({"photo_id": photo_id, "rate": rate})),
        )
    };

    let response = app.send(rate(&owner_token, 5)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.send(rate(&rater_token, 6)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.send(rate(&rater_token, 4)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.send(rate(&rater_token, 2)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["message"], "Rating already exists");

    let response = app.send(rate(&admin_token, 2)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .send(create_json_request(
            "GET",
            &format!("/api/ratings/{photo_id}/summary"),
            Some(&rater_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["average"], 3.0);

    // Individual ratings are staff only
    let response = app
        .send(create_json_request(
            "GET",
            &format!("/api/ratings/{photo_id}"),
            Some(&rater_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request(
            "POST",
            "/api/ratings",
            Some(&rater_token),
            Some(json!({"photo_id": 9999, "rate": 3})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Filter and Transformation Tests
// =============================================================================

#[tokio::test]
async fn test_transformation_from_filter() {
    let app = TestApp::new();
    let (_, owner_token) = app.account_with_token("wade", Role::User).await;
    let (_, admin_token) = app.account_with_token("xena", Role::Admin).await;
    let photo_id = upload_photo(&app, &owner_token).await;

    let response = app
        .send(create_json_request(
            "POST",
            "/api/photos/filters",
            Some(&owner_token),
            Some(json!({
                "name": "thumb",
                "preset": [{"width": 200, "crop": "scale"}, {"radius": "max"}]
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let filter_id = body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .send(create_json_request(
            "POST",
            "/api/photos/filters",
            Some(&owner_token),
            Some(json!({"name": "bad", "preset": [{"sparkle": 1}]})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Creating a transformation is owner only, even for admins
    let request = |token: &str, body: Value| {
        create_json_request("POST", "/api/photos/transformed", Some(token), Some(body))
    };
    let response = app
        .send(request(
            &admin_token,
            json!({"photo_id": photo_id, "filter_id": filter_id}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(request(
            &owner_token,
            json!({"photo_id": photo_id, "filter_id": filter_id, "preset": [{"width": 10}]}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .send(request(
            &owner_token,
            json!({"photo_id": photo_id, "filter_id": filter_id, "description": "small"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert!(json["transformed_url"]
        .as_str()
        .unwrap()
        .contains("c_scale,w_200/r_max"));
    let transformation_id = json["id"].as_i64().unwrap();

    // Admins may manage it afterwards
    let response = app
        .send(create_json_request(
            "PATCH",
            &format!("/api/photos/transformed/{transformation_id}"),
            Some(&admin_token),
            Some(json!({"description": "tiny"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["description"], "tiny");

    let response = app
        .send(create_json_request(
            "GET",
            &format!("/api/photos/transformed/by_photo/{photo_id}"),
            Some(&owner_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .send(create_json_request(
            "DELETE",
            &format!("/api/photos/transformed/{transformation_id}"),
            Some(&owner_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_filter_modification_rights() {
    let app = TestApp::new();
    let (_, owner_token) = app.account_with_token("yuri", Role::User).await;
    let (_, other_token) = app.account_with_token("zoe", Role::User).await;
    let (_, moderator_token) = app.account_with_token("amos", Role::Moderator).await;

    let response = app
        .send(create_json_request(
            "POST",
            "/api/photos/filters",
            Some(&owner_token),
            Some(json!({"name": "gray", "preset": [{"effect": "grayscale"}]})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let filter_id = body_json(response).await["id"].as_i64().unwrap();
    let uri = format!("/api/photos/filters/{filter_id}");

    let response = app
        .send(create_json_request(
            "PUT",
            &uri,
            Some(&other_token),
            Some(json!({"name": "mine now"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request(
            "PUT",
            &uri,
            Some(&moderator_token),
            Some(json!({"name": "grayscale"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "grayscale");

    let response = app
        .send(create_json_request("DELETE", &uri, Some(&owner_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// Session Cache Tests
// =============================================================================

async fn promote_after_first_request(app: &TestApp) -> StatusCode {
    let (_, admin_token) = app.account_with_token("boss", Role::Admin).await;
    let (user, user_token) = app.account_with_token("cleo", Role::User).await;

    // Populates the session cache with the `user` snapshot
    let response = app
        .send(create_json_request("GET", "/api/users", Some(&user_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(create_json_request(
            "PATCH",
            &format!("/api/users/{}/role", user.id),
            Some(&admin_token),
            Some(json!({"role": "moderator"})),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["role"], "moderator");

    app.send(create_json_request("GET", "/api/users", Some(&user_token), None))
        .await
        .status()
}

#[tokio::test]
async fn test_session_snapshot_lags_role_change() {
    let app = TestApp::new();

    // Cached snapshot still says `user` until the TTL runs out
    assert_eq!(
        promote_after_first_request(&app).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_session_invalidated_on_write() {
    let mut config = AppConfig::default();
    config.session.invalidate_on_write = true;
    let app = TestApp::with_config(config);

    assert_eq!(promote_after_first_request(&app).await, StatusCode::OK);
}

#[tokio::test]
async fn test_me_reports_cached_snapshot() {
    let app = TestApp::new();
    let (_, admin_token) = app.account_with_token("dora", Role::Admin).await;
    let (user, user_token) = app.account_with_token("eli", Role::User).await;

    let response = app
        .send(create_json_request("GET", "/api/users/me", Some(&user_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["photo_count"], 0);
    assert_eq!(json["active"], true);

    let response = app
        .send(create_json_request(
            "PATCH",
            &format!("/api/users/ban/{}", user.id),
            Some(&admin_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // The ban is not visible through the cached snapshot
    let response = app
        .send(create_json_request("GET", "/api/users/me", Some(&user_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["active"], true);
}

/// Session backend that never keeps anything
struct NoSessionCache;

#[async_trait]
impl SessionCache for NoSessionCache {
    async fn get(&self, _email: &str) -> Option<Account> {
        None
    }

    async fn put(&self, _email: &str, _account: Account) {}

    async fn invalidate(&self, _email: &str) {}

    fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            name: "none".to_string(),
            hits: 0,
            misses: 0,
            writes: 0,
            invalidations: 0,
            total_requests: 0,
            hit_rate: 0.0,
        }
    }
}

#[tokio::test]
async fn test_custom_session_cache_sees_changes_immediately() {
    let app = TestApp::with_state(AppConfig::default(), |state| {
        state.with_session_cache(Arc::new(NoSessionCache))
    });

    assert_eq!(promote_after_first_request(&app).await, StatusCode::OK);
    assert_eq!(app.state.sessions.stats().name, "none");
}
