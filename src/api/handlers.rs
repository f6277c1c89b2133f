use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::error::ChatError;
use crate::models::UserId;
use crate::room::NewRoom;
use crate::server::Server;

fn reject(err: ChatError) -> Rejection {
    warp::reject::custom(err)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    profile_picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    name: String,
    #[serde(default = "default_mime")]
    mime_type: String,
    content: String,
}

fn default_mime() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

fn required(field: Option<String>, name: &str) -> Result<String, Rejection> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(reject(ChatError::InvalidInput(format!("{name} is required")))),
    }
}

pub async fn signup(body: SignupBody, server: Arc<Server>) -> Result<impl Reply, Rejection> {
    let name = required(body.name, "name")?;
    let password = required(body.password, "password")?;
    let (token, user) = server
        .signup(&name, &password, body.profile_picture)
        .await
        .map_err(reject)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "token": token, "user": user })),
        StatusCode::CREATED,
    ))
}

pub async fn login(body: LoginBody, server: Arc<Server>) -> Result<impl Reply, Rejection> {
    let name = required(body.name, "name")?;
    let password = required(body.password, "password")?;
    let (token, user) = server.login(&name, &password).await.map_err(reject)?;
    Ok(warp::reply::json(&json!({ "token": token, "user": user })))
}

pub async fn list_users(_user: UserId, server: Arc<Server>) -> Result<impl Reply, Rejection> {
    let users = server.list_users().await.map_err(reject)?;
    Ok(warp::reply::json(&users))
}

pub async fn list_rooms(user: UserId, server: Arc<Server>) -> Result<impl Reply, Rejection> {
    let rooms = server.list_rooms(&user).await.map_err(reject)?;
    Ok(warp::reply::json(&rooms))
}

pub async fn create_room(
    user: UserId,
    request: NewRoom,
    server: Arc<Server>,
) -> Result<impl Reply, Rejection> {
    let room = server.create_room(&user, request).await.map_err(reject)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&room.summary_for(&user)),
        StatusCode::CREATED,
    ))
}

pub async fn delete_room(
    room_id: String,
    user: UserId,
    server: Arc<Server>,
) -> Result<impl Reply, Rejection> {
    server.delete_room(&user, &room_id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn history(
    room_id: String,
    query: HistoryQuery,
    user: UserId,
    server: Arc<Server>,
) -> Result<impl Reply, Rejection> {
    let messages = server
        .history(&user, &room_id, query.limit)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&messages))
}

pub async fn upload_file(
    _user: UserId,
    body: UploadBody,
    server: Arc<Server>,
) -> Result<impl Reply, Rejection> {
    let content = BASE64
        .decode(body.content)
        .map_err(|_| reject(ChatError::InvalidInput("Invalid file data".to_string())))?;
    let attachment = server
        .files
        .upload_file(body.name, body.mime_type, content)
        .await
        .map_err(reject)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&attachment),
        StatusCode::CREATED,
    ))
}

pub async fn download_file(file_id: String, server: Arc<Server>) -> Result<impl Reply, Rejection> {
    let (attachment, content) = server
        .files
        .get_file(&file_id)
        .await
        .ok_or_else(|| reject(ChatError::NotFound("file")))?;
    Ok(warp::reply::with_header(
        content,
        "content-type",
        attachment.mime_type,
    ))
}

pub async fn ws_upgrade(
    ws: warp::ws::Ws,
    query: WsQuery,
    server: Arc<Server>,
) -> Result<impl Reply, Rejection> {
    let token = query.token.ok_or_else(|| reject(ChatError::Unauthorized))?;
    let user_id = server.authenticate(&token).await.map_err(reject)?;

    Ok(ws.on_upgrade(move |socket| async move {
        server.handle_connection(socket, user_id).await;
    }))
}
