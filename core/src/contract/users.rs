//! User resource: DTOs, schemas and the four endpoint descriptors.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use crate::endpoint::{BodyEndpoint, Endpoint, GetEndpoint, NoBodyEndpoint};
use crate::schema::{is_email, Issues, NoSchema, PathParams, Refine, Schema, Typed, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl Refine for User {
    fn refine(&self, issues: &mut Issues) {
        issues.ensure(is_email(&self.email), "email", "invalid email");
    }
}

/// Path parameters of `/users/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserId {
    pub id: String,
}

impl PathParams for UserId {
    const KEYS: &'static [&'static str] = &["id"];
}

impl Refine for UserId {}

/// Filters and paging for `GET /users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

pub const MAX_PAGE_LIMIT: u32 = 100;

/// Query schema for `GET /users`.
///
/// Query strings reach the server as text, so numeric fields accept either
/// JSON numbers or numeric strings. Unknown keys are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListUsersQuerySchema;

impl Schema for ListUsersQuerySchema {
    type Output = ListUsersQuery;

    fn validate(&self, input: &Value) -> Result<ListUsersQuery, ValidationError> {
        let mut issues = Issues::new();
        let empty = serde_json::Map::new();
        let map = match input {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                issues.push("", "expected an object");
                return issues.finish(ListUsersQuery::default());
            }
        };

        let page = positive_int(map.get("page"), "page", None, &mut issues);
        let limit = positive_int(map.get("limit"), "limit", Some(MAX_PAGE_LIMIT), &mut issues);
        let role = match map.get("role") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => match s.parse::<UserRole>() {
                Ok(role) => Some(role),
                Err(_) => {
                    issues.push("role", "expected one of admin, user, guest");
                    None
                }
            },
            Some(_) => {
                issues.push("role", "expected one of admin, user, guest");
                None
            }
        };

        issues.finish(ListUsersQuery { page, limit, role })
    }
}

fn positive_int(value: Option<&Value>, field: &str, max: Option<u32>, issues: &mut Issues) -> Option<u32> {
    let number = match value {
        None | Some(Value::Null) => return None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    let Some(number) = number.filter(|n| n.is_finite()) else {
        issues.push(field, "expected a number");
        return None;
    };
    if number.fract() != 0.0 {
        issues.push(field, "must be an integer");
        return None;
    }
    if number <= 0.0 {
        issues.push(field, "must be positive");
        return None;
    }
    if let Some(max) = max {
        if number > f64::from(max) {
            issues.push(field, format!("must be at most {max}"));
            return None;
        }
    }
    if number > f64::from(u32::MAX) {
        issues.push(field, "is too large");
        return None;
    }
    Some(number as u32)
}

/// Request body of `POST /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl Refine for CreateUser {
    fn refine(&self, issues: &mut Issues) {
        issues.ensure(!self.name.is_empty(), "name", "must not be empty");
        issues.ensure(is_email(&self.email), "email", "invalid email");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserResponse {
    pub success: bool,
}

impl Refine for DeleteUserResponse {}

pub type GetUser = GetEndpoint<Typed<UserId>, NoSchema, Typed<User>>;
pub type ListUsers = GetEndpoint<NoSchema, ListUsersQuerySchema, Typed<Vec<User>>>;
pub type CreateUserEndpoint = BodyEndpoint<Typed<CreateUser>, NoSchema, NoSchema, Typed<User>>;
pub type DeleteUser = NoBodyEndpoint<Typed<UserId>, NoSchema, Typed<DeleteUserResponse>>;

/// `GET /users/:id`
pub static GET_USER: LazyLock<GetUser> = LazyLock::new(|| {
    Endpoint::get("/users/:id", Typed::<User>::new())
        .path_params(Typed::<UserId>::new())
        .build()
});

/// `GET /users`
pub static LIST_USERS: LazyLock<ListUsers> = LazyLock::new(|| {
    Endpoint::get("/users", Typed::<Vec<User>>::new())
        .query(ListUsersQuerySchema)
        .build()
});

/// `POST /users`
pub static CREATE_USER: LazyLock<CreateUserEndpoint> = LazyLock::new(|| {
    Endpoint::post("/users", Typed::<CreateUser>::new(), Typed::<User>::new()).build()
});

/// `DELETE /users/:id`
pub static DELETE_USER: LazyLock<DeleteUser> = LazyLock::new(|| {
    Endpoint::delete("/users/:id", Typed::<DeleteUserResponse>::new())
        .path_params(Typed::<UserId>::new())
        .build()
});
