//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). [`GatewayConfig`] covers the binary;
//! [`SyncConfig`] is the part injected into the handshake and transports.

use std::net::SocketAddr;
use std::time::Duration;

/// Protocol tag a client must send in the `p` query parameter.
pub const PROTOCOL: &str = "v2";

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Route the sync endpoint is mounted on.
    pub sync_path: String,

    /// WebSocket origins allowed to connect. Empty means any origin.
    pub allowed_origins: Vec<String>,

    /// WebSocket read buffer size in bytes.
    pub ws_read_buffer_size: usize,

    /// WebSocket write buffer size in bytes.
    pub ws_write_buffer_size: usize,

    /// Whether event-stream responses are gzip-compressed.
    pub event_stream_gzip: bool,

    /// Seconds between event-stream keep-alive comments (0 = disabled).
    pub event_stream_keep_alive_secs: u64,

    /// Milliseconds between updates of the demo object.
    pub tick_interval_ms: u64,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let sync_path = std::env::var("SYNC_PATH")
            .map(|p| normalize_path(&p))
            .unwrap_or_else(|_| "/sync".to_string());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        let ws_read_buffer_size = parse_env("WS_READ_BUFFER_SIZE", 1024);
        let ws_write_buffer_size = parse_env("WS_WRITE_BUFFER_SIZE", 1024);

        let event_stream_gzip = parse_env_bool("EVENT_STREAM_GZIP", true);
        let event_stream_keep_alive_secs = parse_env("EVENT_STREAM_KEEPALIVE_SECS", 15);

        let tick_interval_ms = parse_env("TICK_INTERVAL_MS", 1000);

        let log_json = std::env::var("LOG_FORMAT").is_ok_and(|v| is_json_format(&v));

        Ok(Self {
            listen_addr,
            sync_path,
            allowed_origins,
            ws_read_buffer_size,
            ws_write_buffer_size,
            event_stream_gzip,
            event_stream_keep_alive_secs,
            tick_interval_ms,
            log_json,
        })
    }

    /// Derives the transport configuration injected into the handshake.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        let origin = if self.allowed_origins.is_empty() {
            OriginPolicy::Any
        } else {
            OriginPolicy::AllowList(self.allowed_origins.clone())
        };
        let keep_alive = (self.event_stream_keep_alive_secs > 0)
            .then(|| Duration::from_secs(self.event_stream_keep_alive_secs));

        SyncConfig {
            socket: SocketConfig {
                read_buffer_size: self.ws_read_buffer_size,
                write_buffer_size: self.ws_write_buffer_size,
                origin,
            },
            event_stream: EventStreamConfig {
                gzip: self.event_stream_gzip,
                keep_alive,
            },
        }
    }
}

/// Immutable transport configuration, built once and shared by every
/// handshake.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// WebSocket transport settings.
    pub socket: SocketConfig,
    /// Event-stream transport settings.
    pub event_stream: EventStreamConfig,
}

/// WebSocket upgrade settings.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Which `Origin` headers may upgrade.
    pub origin: OriginPolicy,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            origin: OriginPolicy::Any,
        }
    }
}

/// Event-stream response settings.
#[derive(Debug, Clone)]
pub struct EventStreamConfig {
    /// Gzip the stream when the client accepts it.
    pub gzip: bool,
    /// Interval between keep-alive comments; `None` disables them.
    pub keep_alive: Option<Duration>,
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self {
            gzip: true,
            keep_alive: Some(Duration::from_secs(15)),
        }
    }
}

/// Origin check applied to WebSocket upgrades.
///
/// The default accepts everything: origin filtering is not a security
/// boundary of this layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Every origin (and a missing `Origin` header) is accepted.
    #[default]
    Any,
    /// Only the listed origins are accepted, compared case-insensitively.
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Returns `true` if a request with the given `Origin` may upgrade.
    #[must_use]
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::AllowList(allowed) => origin
                .is_some_and(|o| allowed.iter().any(|a| a.eq_ignore_ascii_case(o))),
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}

/// `LOG_FORMAT=json` selects JSON logs; anything else keeps text.
fn is_json_format(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("json")
}

/// Routes must start with a slash.
fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Splits a comma-separated list, dropping empty entries.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
