mod common;

use std::collections::HashMap;

use chrono::Duration;
use common::TestApp;
use common::ACCESS_TTL_SECONDS;
use common::PASSWORD;
use reqwest::StatusCode;
use serde_json::json;
use serde_json::Value;

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/health")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "UP");
}

#[tokio::test]
async fn test_register_forces_user_role() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/auth/register")
        .json(&json!({
            "name": "Nicola",
            "email": "nicola@example.com",
            "password": PASSWORD,
            "role": "ADMIN"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status_code"], 201);
    assert_eq!(body["data"]["email"], "nicola@example.com");
    assert_eq!(body["data"]["role"], "USER");
    assert!(body["data"]["id"].is_string());
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;

    let response = app
        .post("/auth/register")
        .json(&json!({
            "name": "Other",
            "email": "nicola@example.com",
            "password": PASSWORD
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"]["message"]
        .as_str()
        .unwrap()
        .contains("nicola@example.com"));
}

#[tokio::test]
async fn test_register_invalid_email() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/auth/register")
        .json(&json!({
            "name": "Nicola",
            "email": "not-an-email",
            "password": PASSWORD
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;

    let data = app.login("nicola@example.com").await;

    assert!(data["access_token"].is_string());
    assert!(data["refresh_token"].is_string());
    assert_eq!(data["expires_in"], ACCESS_TTL_SECONDS);
    assert_eq!(data["user"]["email"], "nicola@example.com");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;

    let response = app
        .post("/auth/login")
        .json(&json!({ "email": "nicola@example.com", "password": "wrong" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_unknown_email() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/auth/login")
        .json(&json!({ "email": "ghost@example.com", "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/adminuser/get-profile")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body, json!({ "error": "Unauthorized" }));
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .get_authenticated("/adminuser/get-profile", "invalid-token")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_for_user_and_admin() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;
    app.seed_admin("admin@example.com").await;

    for (email, role) in [("nicola@example.com", "USER"), ("admin@example.com", "ADMIN")] {
        let token = app.access_token(email).await;

        let response = app
            .get_authenticated("/adminuser/get-profile", &token)
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body["data"]["email"], email);
        assert_eq!(body["data"]["role"], role);
    }
}

#[tokio::test]
async fn test_expired_access_token_is_unauthorized() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;
    let token = app.access_token("nicola@example.com").await;

    // Exactly at exp the token is still accepted
    app.clock.advance(Duration::seconds(ACCESS_TTL_SECONDS));
    let response = app
        .get_authenticated("/adminuser/get-profile", &token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    app.clock.advance(Duration::seconds(1));
    let response = app
        .get_authenticated("/adminuser/get-profile", &token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_is_forbidden_on_admin_routes() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;
    let token = app.access_token("nicola@example.com").await;

    let response = app
        .get_authenticated("/admin/get-all-users", &token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body, json!({ "error": "Forbidden" }));
}

#[tokio::test]
async fn test_admin_lists_users() {
    let app = TestApp::spawn().await;
    app.seed_admin("admin@example.com").await;
    app.register("Nicola", "nicola@example.com").await;
    let token = app.access_token("admin@example.com").await;

    let response = app
        .get_authenticated("/admin/get-all-users", &token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_user_maintenance() {
    let app = TestApp::spawn().await;
    app.seed_admin("admin@example.com").await;
    let user = app.register("Nicola", "nicola@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    let token = app.access_token("admin@example.com").await;

    let response = app
        .get_authenticated(&format!("/admin/get-users/{}", user_id), &token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["name"], "Nicola");

    let response = app
        .put_authenticated(&format!("/admin/update/{}", user_id), &token)
        .json(&json!({ "city": "Milan", "role": "ADMIN" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["city"], "Milan");
    assert_eq!(body["data"]["role"], "ADMIN");

    let response = app
        .put_authenticated(&format!("/admin/update/{}", user_id), &token)
        .json(&json!({ "email": "admin@example.com" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .delete_authenticated(&format!("/admin/delete/{}", user_id), &token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get_authenticated(&format!("/admin/get-users/{}", user_id), &token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_get_user_invalid_id() {
    let app = TestApp::spawn().await;
    app.seed_admin("admin@example.com").await;
    let token = app.access_token("admin@example.com").await;

    let response = app
        .get_authenticated("/admin/get-users/not-a-uuid", &token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_change_applies_to_next_request() {
    let app = TestApp::spawn().await;
    app.seed_admin("admin@example.com").await;
    let user = app.register("Nicola", "nicola@example.com").await;
    let user_token = app.access_token("nicola@example.com").await;
    let admin_token = app.access_token("admin@example.com").await;

    let response = app
        .get_authenticated("/admin/get-all-users", &user_token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.put_authenticated(
        &format!("/admin/update/{}", user["id"].as_str().unwrap()),
        &admin_token,
    )
    .json(&json!({ "role": "ADMIN" }))
    .send()
    .await
    .expect("Failed to execute request");

    // Roles come from the store on every request, not from the token
    let response = app
        .get_authenticated("/admin/get-all-users", &user_token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;
    let login = app.login("nicola@example.com").await;
    let refresh_token = login["refresh_token"].as_str().unwrap();

    // Let the original access token expire
    app.clock.advance(Duration::seconds(ACCESS_TTL_SECONDS + 1));

    let response = app
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["refresh_token"], refresh_token);
    assert_eq!(body["data"]["expires_in"], ACCESS_TTL_SECONDS);

    let access_token = body["data"]["access_token"].as_str().unwrap();
    let claims = app.codec.extract_claims(access_token).unwrap();
    assert_eq!(claims.sub.as_deref(), Some("nicola@example.com"));
    assert!(claims.extra.is_empty());

    let response = app
        .get_authenticated("/adminuser/get-profile", access_token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;
    let access_token = app.access_token("nicola@example.com").await;

    let response = app
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": access_token }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_deleted_account() {
    let app = TestApp::spawn().await;
    let refresh_token = app
        .codec
        .issue_refresh_token("ghost@example.com", HashMap::new())
        .unwrap();

    let response = app
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_is_not_a_bearer_token() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;
    let login = app.login("nicola@example.com").await;

    let response = app
        .get_authenticated(
            "/adminuser/get-profile",
            login["refresh_token"].as_str().unwrap(),
        )
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_unknown_subject_is_unauthorized() {
    let app = TestApp::spawn().await;
    let token = app.codec.issue_access_token("ghost@example.com").unwrap();

    let response = app
        .get_authenticated("/adminuser/get-profile", &token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_query_token_disabled_by_default() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;
    let token = app.access_token("nicola@example.com").await;

    let response = app
        .get(&format!("/adminuser/get-profile?token={}", token))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_query_token_when_enabled() {
    let app = TestApp::spawn_with(true).await;
    app.register("Nicola", "nicola@example.com").await;
    let token = app.access_token("nicola@example.com").await;

    let response = app
        .get(&format!("/adminuser/get-profile?token={}", token))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["email"], "nicola@example.com");
}

#[tokio::test]
async fn test_adminuser_prefix_not_matched_by_admin_rule() {
    let app = TestApp::spawn().await;
    app.register("Nicola", "nicola@example.com").await;
    let token = app.access_token("nicola@example.com").await;

    // A USER reaches /adminuser/** even though /admin/** is ADMIN-only
    let response = app
        .get_authenticated("/adminuser/get-profile", &token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
}
