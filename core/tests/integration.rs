//! End-to-end calls against the live endpoint server.
//!
//! # Design
//! Starts the server on a random port, then drives every user operation
//! over real HTTP through a `ureq`-backed [`Transport`]. Both sides use
//! the same descriptors, so this catches drift between the validation the
//! server enforces and the validation the client expects.

use std::time::Duration;

use async_trait::async_trait;
use endpoint_core::api::{create_user, delete_user, get_user, list_users};
use endpoint_core::contract::errors::ErrorCode;
use endpoint_core::contract::users::{CreateUser, ListUsersQuery, UserRole, CREATE_USER, GET_USER};
use endpoint_core::{
    ApiClient, ErrorContext, ErrorKind, HttpMethod, HttpRequest, HttpResponse, Params, Transport, TransportError,
};
use endpoint_server::ServerConfig;
use serde_json::json;
use tokio::net::TcpListener;

/// Blocking `ureq` round trips, moved off the async runtime.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses come back as data and the client does the interpretation.
struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl UreqTransport {
    fn new(base_url: String) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_millis(500)))
            .build()
            .new_agent();
        Self { agent, base_url }
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let url = format!("{}/{}", self.base_url, request.path);
        tokio::task::spawn_blocking(move || round_trip(&agent, &url, request))
            .await
            .map_err(|e| TransportError::Other(Box::new(e)))?
    }
}

fn round_trip(agent: &ureq::Agent, url: &str, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let pairs = request.query_pairs();
    let body = request.body.map(|body| body.to_string());

    let result = match request.method {
        HttpMethod::Get => agent.get(url).query_pairs(pairs).call(),
        HttpMethod::Delete => agent.delete(url).query_pairs(pairs).call(),
        HttpMethod::Head => agent.head(url).query_pairs(pairs).call(),
        HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
            let builder = match request.method {
                HttpMethod::Put => agent.put(url),
                HttpMethod::Patch => agent.patch(url),
                _ => agent.post(url),
            }
            .query_pairs(pairs);
            match body {
                Some(body) => builder.content_type("application/json").send(body.as_bytes()),
                None => builder.send_empty(),
            }
        }
    };

    let mut response = result.map_err(transport_error)?;
    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let body = response.body_mut().read_to_string().unwrap_or_default();

    Ok(HttpResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
    })
}

fn transport_error(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => TransportError::Timeout,
        ureq::Error::Io(e) => TransportError::Connect(e.to_string()),
        e @ (ureq::Error::ConnectionFailed | ureq::Error::HostNotFound) => TransportError::Connect(e.to_string()),
        other => TransportError::Other(other.to_string().into()),
    }
}

/// Start a freshly seeded server on a random port.
async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(endpoint_server::run(listener, ServerConfig::default()));
    format!("http://{addr}")
}

async fn client() -> ApiClient<UreqTransport> {
    ApiClient::new(UreqTransport::new(spawn_server().await))
}

#[tokio::test(flavor = "multi_thread")]
async fn crud_lifecycle() {
    let client = client().await;

    // Step 1: the seeded users are listed.
    let users = list_users(&client, None).await.unwrap();
    assert_eq!(users.len(), 3);

    // Step 2: fetch one.
    let bob = get_user(&client, "u_2").await.unwrap();
    assert_eq!(bob.name, "Bob");
    assert_eq!(bob.role, UserRole::User);

    // Step 3: create.
    let input = CreateUser {
        name: "Integration".to_string(),
        email: "integration@example.com".to_string(),
        role: Some(UserRole::Guest),
    };
    let created = create_user(&client, &input).await.unwrap();
    assert!(created.id.starts_with("u_"));
    assert_eq!(created.email, input.email);

    // Step 4: the same e-mail again is a conflict, surfaced by code.
    let err = create_user(&client, &input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.status(), Some(409));
    assert_eq!(err.code(), Some(ErrorCode::AlreadyExists));
    assert_eq!(err.to_string(), "Email already in use");

    // Step 5: filter and page.
    let query = ListUsersQuery {
        role: Some(UserRole::Guest),
        ..ListUsersQuery::default()
    };
    let guests = list_users(&client, Some(&query)).await.unwrap();
    assert_eq!(guests.len(), 2);

    // Step 6: delete, then the user is gone.
    let deleted = delete_user(&client, &created.id).await.unwrap();
    assert!(deleted.success);
    let err = get_user(&client, &created.id).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
}

#[tokio::test(flavor = "multi_thread")]
async fn get_returns_validated_data() {
    let client = client().await;
    let user = client
        .get(&*GET_USER, &Params::new().path(json!({"id": "u_1"})))
        .await
        .unwrap();
    assert_eq!(user.name, "Alice");
    assert_eq!(user.role, UserRole::Admin);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_user_is_http_not_found() {
    let client = client().await;
    let err = client
        .get(&*GET_USER, &Params::new().path(json!({"id": "u_404"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
    assert_eq!(err.context(), Some(&ErrorContext::new(HttpMethod::Get, "/users/u_404")));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_input_never_reaches_server() {
    let client = client().await;
    let input = CreateUser {
        name: "User".to_string(),
        email: "invalid-email".to_string(),
        role: None,
    };
    let err = create_user(&client, &input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);

    let users = list_users(&client, None).await.unwrap();
    assert_eq!(users.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_port_is_network_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = ApiClient::new(UreqTransport::new(format!("http://{addr}")));
    let err = get_user(&client, "u_1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_server_times_out() {
    // Accepts connections and never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = ApiClient::new(UreqTransport::new(format!("http://{addr}")));
    let err = client
        .send(
            &*CREATE_USER,
            &json!({"name": "User", "email": "user@example.com"}),
            &Params::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.context(), Some(&ErrorContext::new(HttpMethod::Post, "/users")));
}
