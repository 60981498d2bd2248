//! Typed calls for the user resource, in raising mode.

use serde_json::json;

use crate::client::ApiClient;
use crate::contract::users::{
    CreateUser, DeleteUserResponse, ListUsersQuery, User, CREATE_USER, DELETE_USER, GET_USER, LIST_USERS,
};
use crate::http::Transport;
use crate::prepare::Params;
use crate::raise::{raise, ClientError};

pub async fn get_user<T: Transport>(client: &ApiClient<T>, id: &str) -> Result<User, ClientError> {
    raise(client.get(&*GET_USER, &Params::new().path(json!({ "id": id }))).await)
}

/// `None` lists with the server's default paging.
pub async fn list_users<T: Transport>(
    client: &ApiClient<T>,
    query: Option<&ListUsersQuery>,
) -> Result<Vec<User>, ClientError> {
    let params = match query {
        Some(query) => Params::new().query(json!(query)),
        None => Params::new(),
    };
    raise(client.get(&*LIST_USERS, &params).await)
}

pub async fn create_user<T: Transport>(client: &ApiClient<T>, input: &CreateUser) -> Result<User, ClientError> {
    raise(client.send(&*CREATE_USER, input, &Params::new()).await)
}

pub async fn delete_user<T: Transport>(client: &ApiClient<T>, id: &str) -> Result<DeleteUserResponse, ClientError> {
    raise(client.send_empty(&*DELETE_USER, &Params::new().path(json!({ "id": id }))).await)
}
