//! Service configuration.

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/yaks").
    pub data_dir: String,

    /// Master switch for earning and spending. When false the wallet stays
    /// readable but every award is denied and every spend fails.
    pub yaks_enabled: bool,

    /// Yaks granted per dollar in the stubbed purchase flow.
    pub dollar_to_yak_rate: i64,

    /// Service API key for forum-to-service and admin requests.
    pub service_api_key: Option<String>,

    /// Base URL of the forum's internal platform API (optional).
    pub platform_base_url: Option<String>,

    /// API key for the platform API (optional).
    pub platform_api_key: Option<String>,

    /// Sweeper interval in seconds (default: one day).
    pub sweep_interval_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/yaks".into()),
            yaks_enabled: std::env::var("YAKS_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            dollar_to_yak_rate: std::env::var("DOLLAR_TO_YAK_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            platform_base_url: std::env::var("PLATFORM_BASE_URL").ok(),
            platform_api_key: std::env::var("PLATFORM_API_KEY").ok(),
            sweep_interval_seconds: std::env::var("SWEEP_INTERVAL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(24 * 60 * 60),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/yaks".into(),
            yaks_enabled: true,
            dollar_to_yak_rate: 100,
            service_api_key: None,
            platform_base_url: None,
            platform_api_key: None,
            sweep_interval_seconds: 24 * 60 * 60,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
