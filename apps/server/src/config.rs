use std::env;
use std::net::SocketAddr;

pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;
pub const ROOM_COMMAND_CAPACITY: usize = 1024;

/// Server configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub default_room: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms hand out PORT; BIND_ADDR wins when both are set.
        let bind_addr = if let Ok(addr) = env::var("BIND_ADDR") {
            addr
        } else if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{port}")
        } else {
            "0.0.0.0:3001".to_string()
        };

        Ok(Self {
            bind_addr: bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(bind_addr))?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            default_room: env::var("DEFAULT_ROOM").unwrap_or_else(|_| "arena-1".to_string()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address: {0}")]
    InvalidAddress(String),
}
