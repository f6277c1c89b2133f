//! HTTP surface: REST endpoints, the `/ws` upgrade and static files.

mod handlers;
mod rejection;

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::error::ChatError;
use crate::files::MAX_FILE_SIZE;
use crate::models::UserId;
use crate::server::Server;

pub use rejection::handle_rejection;

/// Base64 inflates uploads by a third; leave room for the JSON envelope.
const MAX_UPLOAD_BODY: u64 = (MAX_FILE_SIZE as u64) * 4 / 3 + 4096;
const MAX_JSON_BODY: u64 = 64 * 1024;

fn with_server(
    server: Arc<Server>,
) -> impl Filter<Extract = (Arc<Server>,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

/// Resolves `Authorization: Bearer <token>` to the caller's user id.
fn authenticated(
    server: Arc<Server>,
) -> impl Filter<Extract = (UserId,), Error = Rejection> + Clone {
    warp::header::<String>("authorization")
        .and(with_server(server))
        .and_then(|header: String, server: Arc<Server>| async move {
            let token = header
                .strip_prefix("Bearer ")
                .ok_or_else(|| warp::reject::custom(ChatError::Unauthorized))?;
            server
                .authenticate(token.trim())
                .await
                .map_err(warp::reject::custom)
        })
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_JSON_BODY).and(warp::body::json())
}

pub fn routes(
    server: Arc<Server>,
    static_dir: PathBuf,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let signup = warp::path!("api" / "users" / "signup")
        .and(warp::post())
        .and(json_body())
        .and(with_server(server.clone()))
        .and_then(handlers::signup);

    let login = warp::path!("api" / "users" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_server(server.clone()))
        .and_then(handlers::login);

    let users = warp::path!("api" / "users")
        .and(warp::get())
        .and(authenticated(server.clone()))
        .and(with_server(server.clone()))
        .and_then(handlers::list_users);

    let list_rooms = warp::path!("api" / "rooms")
        .and(warp::get())
        .and(authenticated(server.clone()))
        .and(with_server(server.clone()))
        .and_then(handlers::list_rooms);

    let create_room = warp::path!("api" / "rooms")
        .and(warp::post())
        .and(authenticated(server.clone()))
        .and(json_body())
        .and(with_server(server.clone()))
        .and_then(handlers::create_room);

    let delete_room = warp::path!("api" / "rooms" / String)
        .and(warp::delete())
        .and(authenticated(server.clone()))
        .and(with_server(server.clone()))
        .and_then(handlers::delete_room);

    let history = warp::path!("api" / "messages" / String)
        .and(warp::get())
        .and(warp::query::<handlers::HistoryQuery>())
        .and(authenticated(server.clone()))
        .and(with_server(server.clone()))
        .and_then(handlers::history);

    let upload = warp::path!("api" / "files")
        .and(warp::post())
        .and(authenticated(server.clone()))
        .and(warp::body::content_length_limit(MAX_UPLOAD_BODY))
        .and(warp::body::json())
        .and(with_server(server.clone()))
        .and_then(handlers::upload_file);

    let download = warp::path!("api" / "files" / String)
        .and(warp::get())
        .and(with_server(server.clone()))
        .and_then(handlers::download_file);

    let ws = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::query::<handlers::WsQuery>())
        .and(with_server(server))
        .and_then(handlers::ws_upgrade);

    let api = signup
        .or(login)
        .or(users)
        .or(list_rooms)
        .or(create_room)
        .or(delete_room)
        .or(history)
        .or(upload)
        .or(download);

    api.or(ws)
        .or(warp::fs::dir(static_dir))
        .with(
            warp::cors()
                .allow_any_origin()
                .allow_headers(["authorization", "content-type"])
                .allow_methods(["GET", "POST", "DELETE"]),
        )
        .recover(handle_rejection)
}
