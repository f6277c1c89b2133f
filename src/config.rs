use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "room_chat", about = "Real-time chat relay with REST history")]
pub struct Config {
    #[arg(long, env = "CHAT_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "CHAT_PORT", default_value_t = 2052)]
    pub port: u16,

    /// postgres:// or mysql:// URL. Without one, state lives in memory.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Signing secret for bearer tokens. A random one is generated if unset.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "CHAT_STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    #[arg(long, env = "CHAT_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "CHAT_FILE_TTL_SECS", default_value_t = 86_400)]
    pub file_ttl_secs: u64,

    #[arg(long, env = "CHAT_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "CHAT_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn file_ttl(&self) -> Duration {
        Duration::from_secs(self.file_ttl_secs)
    }
}
