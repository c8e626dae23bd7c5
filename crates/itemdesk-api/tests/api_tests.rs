//! API Integration Tests
//!
//! Every test drives the real router over a fresh in-memory store, so no
//! database is needed.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use itemdesk_api::create_router_for_testing;
use itemdesk_core::config::DEVELOPMENT_SECRET;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Helper to create a request carrying a bearer token
fn create_authed_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let mut request = create_json_request(method, uri, body);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn register(app: &Router, username: &str, email: &str, password: &str) -> Response {
    send(
        app,
        create_json_request(
            "POST",
            "/api/auth/register",
            Some(json!({ "username": username, "email": email, "password": password })),
        ),
    )
    .await
}

/// Form login, returning the token pair body
async fn login(app: &Router, username: &str, password: &str) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={username}&password={password}")))
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn access_token_for(app: &Router, username: &str, email: &str) -> String {
    assert_eq!(register(app, username, email, "pw").await.status(), StatusCode::OK);
    login(app, username, "pw").await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Verify a token with the default development secret and return its claims
fn decode_payload(token: &str) -> Value {
    jsonwebtoken::decode::<Value>(
        token,
        &DecodingKey::from_secret(DEVELOPMENT_SECRET.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .unwrap()
    .claims
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_root() {
    let app = create_router_for_testing();

    let response = send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["msg"].as_str().unwrap().contains("is running"));
}

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/api/auth/login"].is_object());
    assert!(json["paths"]["/api/items/{id}"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_register_returns_public_user() {
    let app = create_router_for_testing();

    let response = register(&app, "alice", "a@x.com", "pw1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["id"].is_i64());
    assert_eq!(json["username"], "alice");
    assert_eq!(json["email"], "a@x.com");
    assert!(json.get("hashed_password").is_none());
    assert!(json.get("password").is_none());
}

#[tokio::test]
async fn test_register_then_login_yields_token_pair() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@x.com", "pw1").await;

    let tokens = login(&app, "alice", "pw1").await;
    assert_eq!(tokens["token_type"], "bearer");

    let access = decode_payload(tokens["access_token"].as_str().unwrap());
    assert_eq!(access["sub"], "alice");
    assert_eq!(access["type"], "access");

    let refresh = decode_payload(tokens["refresh_token"].as_str().unwrap());
    assert_eq!(refresh["sub"], "alice");
    assert_eq!(refresh["type"], "refresh");
    assert!(refresh["exp"].as_u64().unwrap() > access["exp"].as_u64().unwrap());
}

#[tokio::test]
async fn test_login_with_json_body() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@x.com", "pw1").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/auth/login",
            Some(json!({ "username": "alice", "password": "pw1" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@x.com", "pw1").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/auth/login",
            Some(json!({ "username": "alice", "password": "wrong" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );

    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["detail"], "Incorrect username or password");
}

#[tokio::test]
async fn test_login_unknown_user() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/auth/login",
            Some(json!({ "username": "nobody", "password": "pw" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration() {
    let app = create_router_for_testing();

    let first = register(&app, "alice", "a@x.com", "pw1").await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;

    for (username, email) in [("alice", "b@y.com"), ("bob", "a@x.com")] {
        let response = register(&app, username, email, "pw2").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["detail"], "Username or email already registered");
    }

    // First record unaffected: original password still works
    let tokens = login(&app, "alice", "pw1").await;
    let access = tokens["access_token"].as_str().unwrap();
    let response = send(
        &app,
        create_authed_request(
            "POST",
            "/api/items",
            access,
            Some(json!({ "title": "T" })),
        ),
    )
    .await;
    assert_eq!(body_json(response).await["owner_id"], first["id"]);
}

#[tokio::test]
async fn test_register_malformed_body() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        create_json_request("POST", "/api/auth/register", Some(json!({ "username": "alice" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_refresh_with_query_parameter() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@x.com", "pw1").await;
    let tokens = login(&app, "alice", "pw1").await;
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/api/auth/refresh?refresh_token={refresh}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["token_type"], "bearer");
    assert!(json.get("refresh_token").is_none());

    let access = decode_payload(json["access_token"].as_str().unwrap());
    assert_eq!(access["sub"], "alice");
    assert_eq!(access["type"], "access");
}

#[tokio::test]
async fn test_refresh_with_json_body() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@x.com", "pw1").await;
    let tokens = login(&app, "alice", "pw1").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": tokens["refresh_token"] })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@x.com", "pw1").await;
    let tokens = login(&app, "alice", "pw1").await;
    let access = tokens["access_token"].as_str().unwrap();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/api/auth/refresh?refresh_token={access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "Invalid refresh token");
}

#[tokio::test]
async fn test_refresh_requires_token() {
    let app = create_router_for_testing();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/refresh")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_is_stateless() {
    let app = create_router_for_testing();
    let token = access_token_for(&app, "alice", "a@x.com").await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/logout")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["msg"], "Logout successful (client should delete tokens)");

    // Tokens stay valid until they expire
    let response = send(&app, create_authed_request("GET", "/api/items", &token, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Bearer Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_items_require_auth() {
    let app = create_router_for_testing();

    let response = send(&app, create_json_request("GET", "/api/items", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );

    let response = send(
        &app,
        create_authed_request("GET", "/api/items", "not.a.token", None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = create_json_request("GET", "/api/items", None);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Basic YWxpY2U6cHc=".parse().unwrap());
    assert_eq!(send(&app, request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_rejected_as_bearer() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@x.com", "pw1").await;
    let tokens = login(&app, "alice", "pw1").await;
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let response = send(&app, create_authed_request("GET", "/api/items", refresh, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_other_server_rejected() {
    let app = create_router_for_testing();
    let other = create_router_for_testing();

    // Same secret but a different store: the subject is unknown here
    let token = access_token_for(&other, "mallory", "m@x.com").await;

    let response = send(&app, create_authed_request("GET", "/api/items", &token, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "User not found");
}

// =============================================================================
// Item Tests
// =============================================================================

#[tokio::test]
async fn test_create_and_get_item() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@x.com", "pw1").await;
    let tokens = login(&app, "alice", "pw1").await;
    let token = tokens["access_token"].as_str().unwrap();

    let request_time = chrono::Utc::now() - chrono::Duration::seconds(1);
    let response = send(
        &app,
        create_authed_request(
            "POST",
            "/api/items",
            token,
            Some(json!({ "title": "T", "description": "D" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let item = body_json(response).await;
    assert_eq!(item["title"], "T");
    assert_eq!(item["description"], "D");

    let created_at: chrono::DateTime<chrono::Utc> =
        item["created_at"].as_str().unwrap().parse().unwrap();
    assert!(created_at >= request_time);

    let id = item["id"].as_i64().unwrap();
    let response = send(
        &app,
        create_authed_request("GET", &format!("/api/items/{id}"), token, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, item);
}

#[tokio::test]
async fn test_create_item_with_trailing_slash() {
    let app = create_router_for_testing();
    let token = access_token_for(&app, "alice", "a@x.com").await;

    let response = send(
        &app,
        create_authed_request("POST", "/api/items/", &token, Some(json!({ "title": "T" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["description"].is_null());

    let response = send(&app, create_authed_request("GET", "/api/items/", &token, None)).await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ownership_is_enforced_but_listing_is_not_scoped() {
    let app = create_router_for_testing();
    let alice = access_token_for(&app, "alice", "a@x.com").await;
    let bob = access_token_for(&app, "bob", "b@y.com").await;

    let response = send(
        &app,
        create_authed_request("POST", "/api/items", &alice, Some(json!({ "title": "T" }))),
    )
    .await;
    let item = body_json(response).await;
    let uri = format!("/api/items/{}", item["id"]);

    // Bob cannot see or delete Alice's item
    let response = send(&app, create_authed_request("GET", &uri, &bob, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["detail"], "Item not found");

    let response = send(&app, create_authed_request("DELETE", &uri, &bob, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Listing returns every item regardless of owner
    let response = send(&app, create_authed_request("GET", "/api/items", &bob, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let items = body_json(response).await;
    assert_eq!(items.as_array().unwrap(), &vec![item.clone()]);

    // Alice still owns it
    let response = send(&app, create_authed_request("GET", &uri, &alice, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_item() {
    let app = create_router_for_testing();
    let token = access_token_for(&app, "alice", "a@x.com").await;

    let response = send(
        &app,
        create_authed_request("POST", "/api/items", &token, Some(json!({ "title": "T" }))),
    )
    .await;
    let uri = format!("/api/items/{}", body_json(response).await["id"]);

    let response = send(&app, create_authed_request("DELETE", &uri, &token, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["msg"], "Item deleted");

    let response = send(&app, create_authed_request("GET", &uri, &token, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, create_authed_request("DELETE", &uri, &token, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_missing_item() {
    let app = create_router_for_testing();
    let token = access_token_for(&app, "alice", "a@x.com").await;

    let response = send(&app, create_authed_request("GET", "/api/items/999", &token, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, create_authed_request("GET", "/api/items/abc", &token, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
