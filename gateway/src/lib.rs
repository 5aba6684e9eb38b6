pub mod config;
pub mod core;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use crate::core::{Post, PostCatalog, PostLookup, RealtimeError, RealtimeResult, Session, SessionState};
pub use state::AppState;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::{RealtimeSettings, ServerConfig};

    /// Configuration with defaults and no credential, not read from the environment.
    pub fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3001,
            tls: None,
            openai_api_key: None,
            realtime: RealtimeSettings::default(),
            posts_path: None,
            log_payloads: false,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}
