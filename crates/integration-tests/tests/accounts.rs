//! Integration tests for registration, login and account management.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The API server running (cargo run -p atelier-api)
//! - `ATELIER_TEST_ADMIN_EMAIL` / `ATELIER_TEST_ADMIN_PASSWORD` for staff tests

use atelier_integration_tests::{
    TEST_PASSWORD, TestContext, data, error_message, unique_email,
};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_health_endpoints() {
    let ctx = TestContext::new();

    let resp = ctx.client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = ctx
        .client
        .get(ctx.url("/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_register_login_and_profile() {
    let ctx = TestContext::new();
    let (token, email) = ctx.register_customer().await;

    let resp = ctx
        .client
        .get(ctx.url("/api/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let me = data(resp).await;
    assert_eq!(me["email"], email.as_str());
    assert_eq!(me["role"], "customer");
    assert!(me.get("passwordHash").is_none());

    let resp = ctx
        .client
        .put(ctx.url("/api/users/me"))
        .bearer_auth(&token)
        .json(&json!({"firstName": "Renamed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(data(resp).await["firstName"], "Renamed");

    // Emails are case-insensitive
    let token = ctx.login(&email.to_uppercase(), TEST_PASSWORD).await;
    assert!(!token.is_empty());
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_duplicate_registration_conflicts() {
    let ctx = TestContext::new();
    let (_, email) = ctx.register_customer().await;

    let resp = ctx
        .client
        .post(ctx.url("/api/users/register"))
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "firstName": "Again"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_bad_credentials_and_weak_password() {
    let ctx = TestContext::new();
    let (_, email) = ctx.register_customer().await;

    let resp = ctx
        .client
        .post(ctx.url("/api/users/login"))
        .json(&json!({"email": email, "password": "wrong-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(resp).await, "Invalid email or password");

    let resp = ctx
        .client
        .post(ctx.url("/api/users/register"))
        .json(&json!({
            "email": unique_email("weak"),
            "password": "short",
            "firstName": "Weak"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_customer_cannot_reach_staff_routes() {
    let ctx = TestContext::new();
    let (token, _) = ctx.register_customer().await;

    for path in ["/api/users", "/api/admin/stats", "/api/orders"] {
        let resp = ctx
            .client
            .get(ctx.url(path))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running API server and staff credentials"]
async fn test_admin_creates_and_deletes_warehouse_user() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;

    let resp = ctx
        .client
        .post(ctx.url("/api/users"))
        .bearer_auth(&admin)
        .json(&json!({
            "email": unique_email("warehouse"),
            "password": TEST_PASSWORD,
            "firstName": "Stock",
            "role": "warehouse"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user = data(resp).await;
    assert_eq!(user["role"], "warehouse");
    let id = user["id"].as_i64().unwrap();

    let resp = ctx
        .client
        .get(ctx.url("/api/users?role=warehouse&limit=100"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let page = data(resp).await;
    assert!(page["items"].as_array().unwrap().iter().any(|u| u["id"] == id));

    let resp = ctx
        .client
        .delete(ctx.url(&format!("/api/users/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .client
        .get(ctx.url(&format!("/api/users/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

/// One login attempt from a fresh client address, so the per-IP login limit
/// never interferes with the lock-out counters.
async fn attempt_login(email: &str, password: &str) -> StatusCode {
    let ctx = TestContext::new();
    ctx.client
        .post(ctx.url("/api/users/login"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .unwrap()
        .status()
}

#[tokio::test]
#[ignore = "Requires running API server and staff credentials"]
async fn test_lockout_after_five_failures_and_unlock() {
    let ctx = TestContext::new();
    let (token, email) = ctx.register_customer().await;
    let resp = ctx
        .client
        .get(ctx.url("/api/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let id = data(resp).await["id"].as_i64().unwrap();

    for _ in 0..4 {
        assert_eq!(
            attempt_login(&email, "wrong-password").await,
            StatusCode::UNAUTHORIZED
        );
    }
    // The fifth failure is the one that locks
    assert_eq!(
        attempt_login(&email, "wrong-password").await,
        StatusCode::LOCKED
    );
    assert_eq!(attempt_login(&email, TEST_PASSWORD).await, StatusCode::LOCKED);

    let admin_ctx = TestContext::new();
    let admin = admin_ctx.admin_token().await;
    let resp = admin_ctx
        .client
        .get(admin_ctx.url(&format!("/api/users/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let locked = data(resp).await;
    assert_eq!(locked["loginAttempts"], 5);
    assert!(locked["lockUntil"].is_string());

    let resp = admin_ctx
        .client
        .post(admin_ctx.url(&format!("/api/users/{id}/unlock")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let unlocked = data(resp).await;
    assert_eq!(unlocked["loginAttempts"], 0);
    assert!(unlocked["lockUntil"].is_null());

    assert_eq!(attempt_login(&email, TEST_PASSWORD).await, StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_successful_login_resets_failure_count() {
    let ctx = TestContext::new();
    let (_, email) = ctx.register_customer().await;

    for _ in 0..4 {
        assert_eq!(
            attempt_login(&email, "wrong-password").await,
            StatusCode::UNAUTHORIZED
        );
    }
    assert_eq!(attempt_login(&email, TEST_PASSWORD).await, StatusCode::OK);

    // Without the reset the first of these would lock the account
    for _ in 0..4 {
        assert_eq!(
            attempt_login(&email, "wrong-password").await,
            StatusCode::UNAUTHORIZED
        );
    }
    assert_eq!(attempt_login(&email, TEST_PASSWORD).await, StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server and staff credentials"]
async fn test_warehouse_fulfils_orders_but_cannot_manage_users() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token().await;
    let email = unique_email("fulfil");

    let resp = ctx
        .client
        .post(ctx.url("/api/users"))
        .bearer_auth(&admin)
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "firstName": "Packer",
            "role": "warehouse"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let warehouse = ctx.login(&email, TEST_PASSWORD).await;

    let resp = ctx
        .client
        .get(ctx.url("/api/orders?status=confirmed"))
        .bearer_auth(&warehouse)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .client
        .get(ctx.url("/api/users"))
        .bearer_auth(&warehouse)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
