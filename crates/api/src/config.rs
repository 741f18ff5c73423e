use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Seconds between WebSocket heartbeat pings (default: `30`).
    pub ws_heartbeat_interval_secs: u64,
    /// Heartbeat intervals a connection may stay silent before being purged
    /// (default: `3`).
    pub ws_idle_intervals: u32,
    /// Fixed rate-limit window for inbound socket events, in seconds
    /// (default: `60`).
    pub ws_rate_limit_window_secs: u64,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `HOST`                        | `0.0.0.0`               |
    /// | `PORT`                        | `3000`                  |
    /// | `CORS_ORIGINS`                | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                    |
    /// | `WS_HEARTBEAT_INTERVAL_SECS`  | `30`                    |
    /// | `WS_IDLE_INTERVALS`           | `3`                     |
    /// | `WS_RATE_LIMIT_WINDOW_SECS`   | `60`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let ws_heartbeat_interval_secs: u64 = std::env::var("WS_HEARTBEAT_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("WS_HEARTBEAT_INTERVAL_SECS must be a valid u64");

        let ws_idle_intervals: u32 = std::env::var("WS_IDLE_INTERVALS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("WS_IDLE_INTERVALS must be a valid u32");

        let ws_rate_limit_window_secs: u64 = std::env::var("WS_RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("WS_RATE_LIMIT_WINDOW_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            ws_heartbeat_interval_secs,
            ws_idle_intervals,
            ws_rate_limit_window_secs,
            jwt,
        }
    }
}
