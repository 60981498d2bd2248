use axum::http::{self, Request, StatusCode};
use axum::routing::get as get_route;
use axum::Router;
use endpoint_core::contract::errors::{ErrorCode, ErrorResponse};
use endpoint_core::contract::users::{DeleteUserResponse, User, UserRole};
use endpoint_server::{app, app_with, catch_panics, ServerConfig};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- root ---

#[tokio::test]
async fn index_greets() {
    let resp = app().oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_bytes(resp).await[..], b"Hello from endpoint-server!");
}

// --- list ---

#[tokio::test]
async fn list_users_returns_seed() {
    let resp = app().oneshot(get("/users")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let users: Vec<User> = body_json(resp).await;
    let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["Alice", "Bob", "Charlie"]);
}

#[tokio::test]
async fn list_users_filters_by_role() {
    let resp = app().oneshot(get("/users?role=guest")).await.unwrap();
    let users: Vec<User> = body_json(resp).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].role, UserRole::Guest);
}

#[tokio::test]
async fn list_users_paginates() {
    let resp = app().oneshot(get("/users?page=2&limit=2")).await.unwrap();
    let users: Vec<User> = body_json(resp).await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "u_3");

    let resp = app().oneshot(get("/users?page=5&limit=2")).await.unwrap();
    let users: Vec<User> = body_json(resp).await;
    assert!(users.is_empty());
}

#[tokio::test]
async fn list_users_rejects_bad_query() {
    let resp = app().oneshot(get("/users?limit=500&role=root")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = body_json(resp).await;
    assert_eq!(error.error.code, ErrorCode::ValidationError);
    let issues = &error.error.details.unwrap()["issues"];
    assert_eq!(issues.as_array().unwrap().len(), 2);
    assert_eq!(issues[0]["path"], "limit");
    assert_eq!(issues[1]["path"], "role");
}

// --- get ---

#[tokio::test]
async fn get_user_found() {
    let resp = app().oneshot(get("/users/u_2")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let user: User = body_json(resp).await;
    assert_eq!(user.name, "Bob");
    assert_eq!(user.email, "bob@example.com");
}

#[tokio::test]
async fn get_user_not_found() {
    let resp = app().oneshot(get("/users/u_404")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "application/json"
    );
    let error: ErrorResponse = body_json(resp).await;
    assert_eq!(error.error.code, ErrorCode::NotFound);
    assert!(error.error.details.is_none());
}

// --- create ---

#[tokio::test]
async fn create_user_returns_201() {
    let resp = app()
        .oneshot(json_request("POST", "/users", r#"{"name":"Dana","email":"dana@example.com"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user: User = body_json(resp).await;
    assert!(user.id.starts_with("u_"));
    assert_eq!(user.name, "Dana");
    assert_eq!(user.role, UserRole::User);
}

#[tokio::test]
async fn create_user_keeps_explicit_role() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/users",
            r#"{"name":"Eve","email":"eve@example.com","role":"admin"}"#,
        ))
        .await
        .unwrap();
    let user: User = body_json(resp).await;
    assert_eq!(user.role, UserRole::Admin);
}

#[tokio::test]
async fn create_user_invalid_body_lists_issues() {
    let resp = app()
        .oneshot(json_request("POST", "/users", r#"{"name":"","email":"invalid-email"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["issues"][0]["path"], "name");
    assert_eq!(body["error"]["details"]["issues"][1]["path"], "email");
}

#[tokio::test]
async fn create_user_malformed_json_is_validation_error() {
    let resp = app()
        .oneshot(json_request("POST", "/users", "{not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = body_json(resp).await;
    assert_eq!(error.error.code, ErrorCode::ValidationError);
}

#[tokio::test]
async fn create_user_duplicate_email_conflicts() {
    let resp = app()
        .oneshot(json_request("POST", "/users", r#"{"name":"Alice 2","email":"alice@example.com"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let error: ErrorResponse = body_json(resp).await;
    assert_eq!(error.error.code, ErrorCode::AlreadyExists);
}

// --- delete ---

#[tokio::test]
async fn delete_user_not_found() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/users/u_404")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- cors ---

#[tokio::test]
async fn preflight_short_circuits() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/users")
                .header(http::header::ORIGIN, "http://localhost:5173")
                .header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert_eq!(headers[http::header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        headers[http::header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET,POST,DELETE,PUT,PATCH,OPTIONS"
    );
    assert_eq!(
        headers[http::header::ACCESS_CONTROL_ALLOW_HEADERS],
        "content-type,authorization"
    );
    assert!(body_bytes(resp).await.is_empty());
}

fn from_origin(origin: &str) -> Request<String> {
    Request::builder()
        .uri("/users")
        .header(http::header::ORIGIN, origin)
        .body(String::new())
        .unwrap()
}

fn varies_on_origin(resp: &axum::response::Response) -> bool {
    resp.headers()
        .get_all(http::header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|name| name.trim().eq_ignore_ascii_case("origin"))
}

#[tokio::test]
async fn configured_origins_are_echoed() {
    let config = ServerConfig {
        cors_origins: vec!["http://localhost:5173".to_string()],
        ..ServerConfig::default()
    };
    let resp = app_with(&config)
        .oneshot(from_origin("http://localhost:5173"))
        .await
        .unwrap();
    assert_eq!(
        resp.headers()[http::header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert!(varies_on_origin(&resp));

    let resp = app_with(&config)
        .oneshot(from_origin("http://evil.test"))
        .await
        .unwrap();
    assert!(resp
        .headers()
        .get(http::header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
    assert!(varies_on_origin(&resp));
}

// --- failures outside the handlers ---

#[tokio::test]
async fn undecodable_path_is_invalid_request() {
    let resp = app().oneshot(get("/users/%FF")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/json");
    let error: ErrorResponse = body_json(resp).await;
    assert_eq!(error.error.code, ErrorCode::InvalidRequest);
    assert!(error.error.message.contains("UTF-8"));
}

async fn explode() -> &'static str {
    panic!("handler blew up")
}

#[tokio::test]
async fn panicking_handler_is_internal() {
    let router = catch_panics(Router::new().route("/explode", get_route(explode)));
    let resp = router.oneshot(get("/explode")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = body_json(resp).await;
    assert_eq!(error.error.code, ErrorCode::Internal);
    assert_eq!(error.error.message, "Internal server error");
}

// --- full lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/users", r#"{"name":"Frank","email":"frank@example.com","role":"guest"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: User = body_json(resp).await;
    let id = created.id.clone();

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&format!("/users/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: User = body_json(resp).await;
    assert_eq!(fetched, created);

    // list: two guests now
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/users?role=guest"))
        .await
        .unwrap();
    let guests: Vec<User> = body_json(resp).await;
    assert_eq!(guests.len(), 2);

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/users/{id}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let deleted: DeleteUserResponse = body_json(resp).await;
    assert!(deleted.success);

    // get after delete: 404
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&format!("/users/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stores_are_independent_per_app() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/users/u_1")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app().oneshot(get("/users/u_1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
