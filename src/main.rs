use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use room_chat::auth::Auth;
use room_chat::config::Config;
use room_chat::crypto::random_secret;
use room_chat::files::FileManager;
use room_chat::server::Server;
use room_chat::{api, open_store};

/// Checks that the certificate chain and key parse before handing the paths
/// to warp, so a broken pair falls back to plain HTTP instead of aborting.
fn tls_files_usable(cert_path: &Path, key_path: &Path) -> bool {
    let cert_file = match File::open(cert_path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Failed to open certificate file: {e}");
            return false;
        }
    };
    let key_file = match File::open(key_path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Failed to open private key file: {e}");
            return false;
        }
    };

    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_file)).collect::<Result<Vec<_>, _>>();
    match certs {
        Ok(certs) if !certs.is_empty() => {}
        Ok(_) => {
            warn!("No certificates found in {}", cert_path.display());
            return false;
        }
        Err(e) => {
            warn!("Failed to parse certificate: {e}");
            return false;
        }
    }

    match rustls_pemfile::private_key(&mut BufReader::new(key_file)) {
        Ok(Some(_)) => true,
        Ok(None) => {
            warn!("No private key found in {}", key_path.display());
            false
        }
        Err(e) => {
            warn!("Failed to parse private key: {e}");
            false
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    let store = match open_store(config.database_url.as_deref()).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open store: {e}");
            std::process::exit(1);
        }
    };

    let secret = config.jwt_secret.clone().unwrap_or_else(|| {
        warn!("JWT_SECRET not set; tokens will not survive a restart");
        random_secret(48)
    });

    let files = match FileManager::new(&config.upload_dir, config.file_ttl()).await {
        Ok(files) => Arc::new(files),
        Err(e) => {
            error!("Failed to prepare upload directory {}: {e}", config.upload_dir.display());
            std::process::exit(1);
        }
    };
    files.spawn_cleanup(Duration::from_secs(60));

    let server = Server::new(store, Auth::new(secret), files);
    server.spawn_typing_sweeper(Duration::from_secs(1));

    let routes = api::routes(Arc::new(server), config.static_dir.clone());
    let addr = config.addr();

    match (&config.tls_cert, &config.tls_key) {
        (Some(cert), Some(key)) if tls_files_usable(cert, key) => {
            info!("Starting secure server (HTTPS/WSS) on {addr}");
            warp::serve(routes)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .run(addr)
                .await;
        }
        (Some(_), Some(_)) => {
            warn!("Failed to load TLS config, falling back to HTTP/WS on {addr}");
            warp::serve(routes).run(addr).await;
        }
        _ => {
            info!("Server starting on {addr}");
            warp::serve(routes).run(addr).await;
        }
    }
}
