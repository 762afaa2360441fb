use crate::error::{GatekeeperError, Result};
use crate::rate_limit::RateLimitConfig;
use secrecy::Secret;
use serde::Deserialize;
use std::path::Path;

/// Main gatekeeper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatekeeperConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Per-class rate limit windows
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    /// Route classification policy
    #[serde(default)]
    pub routes: RoutePolicyConfig,
    /// Session resolution (JWT) configuration
    #[serde(default)]
    pub session: Option<SessionConfig>,
    /// Security event monitoring configuration
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Base URL of the application server admitted requests are forwarded to
    pub upstream: String,
}

/// Which store backs the rate limit windows
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Redis,
}

impl Default for StoreKind {
    fn default() -> Self {
        StoreKind::Memory
    }
}

/// Rate limiting configuration: one window per limiter class
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(default)]
    pub store: StoreKind,
    /// Redis connection URL (required when store = redis)
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_auth_limit")]
    pub auth: RateLimitConfig,
    #[serde(default = "default_admin_limit")]
    pub admin: RateLimitConfig,
    #[serde(default = "default_api_limit")]
    pub api: RateLimitConfig,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            redis_url: None,
            auth: default_auth_limit(),
            admin: default_admin_limit(),
            api: default_api_limit(),
        }
    }
}

/// Route classification policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RoutePolicyConfig {
    /// Prefixes exempt from both rate limiting and authentication
    #[serde(default = "default_bypass_prefixes")]
    pub bypass_prefixes: Vec<String>,
    /// Prefixes that require an authenticated principal
    #[serde(default = "default_protected_prefixes")]
    pub protected_prefixes: Vec<String>,
    /// Protected prefixes that additionally require the ADMIN role
    #[serde(default = "default_admin_only_prefixes")]
    pub admin_only_prefixes: Vec<String>,
    /// Protected prefixes that additionally require the BUYER role
    #[serde(default = "default_buyer_only_prefixes")]
    pub buyer_only_prefixes: Vec<String>,
    /// Generic login page
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Admin login page
    #[serde(default = "default_admin_login_path")]
    pub admin_login_path: String,
    /// Buyer login page
    #[serde(default = "default_buyer_login_path")]
    pub buyer_login_path: String,
}

impl Default for RoutePolicyConfig {
    fn default() -> Self {
        Self {
            bypass_prefixes: default_bypass_prefixes(),
            protected_prefixes: default_protected_prefixes(),
            admin_only_prefixes: default_admin_only_prefixes(),
            buyer_only_prefixes: default_buyer_only_prefixes(),
            login_path: default_login_path(),
            admin_login_path: default_admin_login_path(),
            buyer_login_path: default_buyer_login_path(),
        }
    }
}

/// Session resolution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for session token validation
    pub secret: Secret<String>,
    /// Issuer to validate, if any
    #[serde(default)]
    pub issuer: Option<String>,
}

/// Security event monitoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Whether this deployment forwards events to the external sink
    #[serde(default)]
    pub production: bool,
    /// Webhook URL receiving security events
    #[serde(default)]
    pub sink_url: Option<String>,
    /// Sampling rate for non-high severities forwarded to the sink
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    /// Salt for hashing client identities in event payloads
    #[serde(default = "default_log_salt")]
    pub log_salt: String,
    /// Override for the Content-Security-Policy response header
    #[serde(default)]
    pub content_security_policy: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            production: false,
            sink_url: None,
            sample_rate: default_sample_rate(),
            log_salt: default_log_salt(),
            content_security_policy: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

fn default_auth_limit() -> RateLimitConfig {
    RateLimitConfig {
        limit: 5,
        window_ms: 60_000,
    }
}

fn default_admin_limit() -> RateLimitConfig {
    RateLimitConfig {
        limit: 30,
        window_ms: 60_000,
    }
}

fn default_api_limit() -> RateLimitConfig {
    RateLimitConfig {
        limit: 100,
        window_ms: 60_000,
    }
}

fn default_bypass_prefixes() -> Vec<String> {
    ["/_next", "/api/auth", "/favicon.ico", "/public"]
        .map(String::from)
        .to_vec()
}

fn default_protected_prefixes() -> Vec<String> {
    ["/admin", "/dashboard", "/api/admin"].map(String::from).to_vec()
}

fn default_admin_only_prefixes() -> Vec<String> {
    ["/admin", "/api/admin"].map(String::from).to_vec()
}

fn default_buyer_only_prefixes() -> Vec<String> {
    ["/dashboard"].map(String::from).to_vec()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_admin_login_path() -> String {
    "/login/admin".to_string()
}

fn default_buyer_login_path() -> String {
    "/login/buyer".to_string()
}

fn default_sample_rate() -> f64 {
    0.1
}

fn default_log_salt() -> String {
    "gatekeeper".to_string()
}

impl GatekeeperConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatekeeperError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatekeeperError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.server.upstream.starts_with("http://")
            && !self.server.upstream.starts_with("https://")
        {
            return Err(GatekeeperError::Config(
                "Upstream URL must start with http:// or https://".to_string(),
            ));
        }

        for (class, limit) in [
            ("auth", &self.rate_limits.auth),
            ("admin", &self.rate_limits.admin),
            ("api", &self.rate_limits.api),
        ] {
            if limit.limit == 0 {
                return Err(GatekeeperError::Config(format!(
                    "Rate limit must be > 0 for class: {}",
                    class
                )));
            }
            if limit.window_ms == 0 {
                return Err(GatekeeperError::Config(format!(
                    "Rate limit window must be > 0 for class: {}",
                    class
                )));
            }
        }

        if self.rate_limits.store == StoreKind::Redis && self.rate_limits.redis_url.is_none() {
            return Err(GatekeeperError::Config(
                "rate_limits.redis_url is required when store = redis".to_string(),
            ));
        }

        let prefix_sets = [
            ("bypass_prefixes", &self.routes.bypass_prefixes),
            ("protected_prefixes", &self.routes.protected_prefixes),
            ("admin_only_prefixes", &self.routes.admin_only_prefixes),
            ("buyer_only_prefixes", &self.routes.buyer_only_prefixes),
        ];
        for (name, prefixes) in prefix_sets {
            for prefix in prefixes {
                if !prefix.starts_with('/') {
                    return Err(GatekeeperError::Config(format!(
                        "Prefix '{}' in {} must start with '/'",
                        prefix, name
                    )));
                }
            }
        }

        for (name, path) in [
            ("login_path", &self.routes.login_path),
            ("admin_login_path", &self.routes.admin_login_path),
            ("buyer_login_path", &self.routes.buyer_login_path),
        ] {
            if !path.starts_with('/') {
                return Err(GatekeeperError::Config(format!(
                    "{} must start with '/'",
                    name
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.security.sample_rate) {
            return Err(GatekeeperError::Config(
                "security.sample_rate must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                timeout_secs: default_timeout(),
                upstream: "http://localhost:3000".to_string(),
            },
            rate_limits: RateLimitsConfig::default(),
            routes: RoutePolicyConfig::default(),
            session: None,
            security: SecurityConfig::default(),
        }
    }
}
