//! Demo user service built on the shared endpoint descriptors.
//!
//! Routes are registered at the descriptors' own path templates and every
//! input is validated with the descriptors' schemas, so the server and
//! its clients cannot drift apart.

pub mod config;
pub mod error;

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use endpoint_core::contract::users::{
    DeleteUserResponse, ListUsersQuery, User, UserId, UserRole, CREATE_USER, DELETE_USER, GET_USER, LIST_USERS,
};
use endpoint_core::schema::{Schema, Typed};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
};
use tracing::{debug, warn};
use uuid::Uuid;

pub use config::{ConfigError, ServerConfig};
pub use error::AppError;

pub type Db = Arc<RwLock<Vec<User>>>;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const ALLOW_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::DELETE,
    Method::PUT,
    Method::PATCH,
    Method::OPTIONS,
];
const ALLOW_HEADERS: [header::HeaderName; 2] = [header::CONTENT_TYPE, header::AUTHORIZATION];

/// The users every fresh store starts with.
pub fn seed() -> Vec<User> {
    [
        ("u_1", "Alice", "alice@example.com", UserRole::Admin),
        ("u_2", "Bob", "bob@example.com", UserRole::User),
        ("u_3", "Charlie", "charlie@example.com", UserRole::Guest),
    ]
    .into_iter()
    .map(|(id, name, email, role)| User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
    })
    .collect()
}

pub fn app() -> Router {
    app_with(&ServerConfig::default())
}

/// A router with its own freshly seeded store.
pub fn app_with(config: &ServerConfig) -> Router {
    let db: Db = Arc::new(RwLock::new(seed()));
    let router = Router::new()
        .route("/", get(index))
        .route(&route_path(LIST_USERS.path()), get(list_users))
        .route(&route_path(CREATE_USER.path()), post(create_user))
        .route(&route_path(GET_USER.path()), get(get_user))
        .route(&route_path(DELETE_USER.path()), delete(delete_user))
        .with_state(db);
    catch_panics(router).layer(cors_layer(&config.cors_origins))
}

/// A panicking handler answers `INTERNAL` instead of dropping the
/// connection.
pub fn catch_panics(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    AppError::internal(format!("handler panicked: {detail}")).into_response()
}

/// Any origin when none are configured; otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(ALLOW_METHODS)
        .allow_headers(ALLOW_HEADERS);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring CORS origin that is not a valid header value");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub async fn run(listener: TcpListener, config: ServerConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(&config)).await
}

/// `/users/:id` -> `/users/{id}`
pub fn route_path(template: &str) -> String {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => format!("{{{name}}}"),
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn index() -> &'static str {
    "Hello from endpoint-server!"
}

async fn list_users(
    State(db): State<Db>,
    raw: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Vec<User>>, AppError> {
    let Query(raw) = raw?;
    let query = match LIST_USERS.query() {
        Some(schema) => schema.validate(&json!(raw))?,
        None => ListUsersQuery::default(),
    };
    let page = query.page.unwrap_or(DEFAULT_PAGE) as usize;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT) as usize;

    let users = db.read().await;
    let listed = users
        .iter()
        .filter(|user| query.role.is_none_or(|role| user.role == role))
        .skip(page.saturating_sub(1).saturating_mul(limit))
        .take(limit)
        .cloned()
        .collect();
    Ok(Json(listed))
}

async fn get_user(State(db): State<Db>, id: Result<Path<String>, PathRejection>) -> Result<Json<User>, AppError> {
    let Path(id) = id?;
    let id = user_id(GET_USER.path_params(), id)?;
    let users = db.read().await;
    users
        .iter()
        .find(|user| user.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Malformed JSON reads as `{}` so it fails validation like any other bad
/// body.
async fn create_user(State(db): State<Db>, body: Bytes) -> Result<(StatusCode, Json<User>), AppError> {
    let raw = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}));
    let input = CREATE_USER.request().validate(&raw)?;

    let mut users = db.write().await;
    if users.iter().any(|user| user.email == input.email) {
        return Err(AppError::already_exists("Email already in use"));
    }
    let user = User {
        id: format!("u_{}", Uuid::new_v4().simple()),
        name: input.name,
        email: input.email,
        role: input.role.unwrap_or(UserRole::User),
    };
    users.push(user.clone());
    debug!(id = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn delete_user(
    State(db): State<Db>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<DeleteUserResponse>, AppError> {
    let Path(id) = id?;
    let id = user_id(DELETE_USER.path_params(), id)?;
    let mut users = db.write().await;
    let index = users
        .iter()
        .position(|user| user.id == id)
        .ok_or_else(|| AppError::not_found("User not found"))?;
    users.remove(index);
    Ok(Json(DeleteUserResponse { success: true }))
}

fn user_id(schema: Option<&Typed<UserId>>, raw: String) -> Result<String, AppError> {
    match schema {
        Some(schema) => Ok(schema.validate(&json!({ "id": raw }))?.id),
        None => Ok(raw),
    }
}
