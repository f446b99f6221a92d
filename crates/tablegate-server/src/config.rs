//! Server configuration.
//!
//! Every value can come from a flag or an environment variable. Nothing
//! below `main` reads the environment; the resolved [`ServerConfig`] is
//! passed into constructors.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tablegate_core::password::{DEFAULT_HASH_COST, DEFAULT_HASH_MEMORY_KIB};
use tablegate_core::{HashConfig, TokenConfig};

/// Default port for HTTP requests.
pub const DEFAULT_PORT: u16 = 3000;

/// Default session token lifetime in seconds (1 hour).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Tablegate command line arguments.
#[derive(Parser)]
#[command(name = "tablegate-server")]
#[command(version, about = "Tablegate authentication service", long_about = None)]
pub struct Args {
    /// Interface to bind to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to the user store directory.
    #[arg(short, long, env = "DATA_PATH", default_value = "./data")]
    pub data_path: PathBuf,

    /// HMAC secret used to sign session tokens.
    #[arg(long, env = "SECRET_JWT_KEY", hide_env_values = true)]
    pub jwt_secret: String,

    /// Password hashing time cost (Argon2 iterations).
    #[arg(long, env = "HASH_COST", default_value_t = DEFAULT_HASH_COST)]
    pub hash_cost: u32,

    /// Password hashing memory cost in KiB.
    #[arg(long, env = "HASH_MEMORY_KIB", default_value_t = DEFAULT_HASH_MEMORY_KIB)]
    pub hash_memory_kib: u32,

    /// Session token lifetime in seconds.
    #[arg(long, env = "TOKEN_TTL_SECS", default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub token_ttl_secs: u64,

    /// Mark the session cookie `Secure` (HTTPS only).
    #[arg(long, env = "COOKIE_SECURE", default_value_t = false)]
    pub cookie_secure: bool,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_path", &self.data_path)
            .field("jwt_secret", &"<redacted>")
            .field("hash_cost", &self.hash_cost)
            .field("hash_memory_kib", &self.hash_memory_kib)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Resolved server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to listen on, `host:port`.
    pub listen_addr: String,
    /// User store directory.
    pub data_path: PathBuf,
    /// Token signing secret.
    pub jwt_secret: String,
    /// Password hashing work factor.
    pub hash: HashConfig,
    /// Session token lifetime.
    pub token_ttl: Duration,
    /// Whether the session cookie carries `Secure`.
    pub cookie_secure: bool,
}

impl ServerConfig {
    /// Configuration with defaults and the given signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            data_path: PathBuf::from("./data"),
            jwt_secret: jwt_secret.into(),
            hash: HashConfig::default(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            cookie_secure: false,
        }
    }

    /// Set the listen address.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the user store directory.
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Set the password hashing work factor.
    pub fn with_hash(mut self, hash: HashConfig) -> Self {
        self.hash = hash;
        self
    }

    /// Set the session token lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the `Secure` cookie flag.
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Token codec settings derived from this configuration.
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(self.jwt_secret.as_bytes()).with_ttl(self.token_ttl)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.is_empty() {
            return Err("signing secret must not be empty (set SECRET_JWT_KEY)".to_string());
        }
        if self.hash.cost == 0 {
            return Err("hash cost must be at least 1".to_string());
        }
        if self.token_ttl.is_zero() {
            return Err("token ttl must be at least one second".to_string());
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("data_path", &self.data_path)
            .field("jwt_secret", &"<redacted>")
            .field("hash", &self.hash)
            .field("token_ttl", &self.token_ttl)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            listen_addr: format!("{}:{}", args.host, args.port),
            data_path: args.data_path,
            jwt_secret: args.jwt_secret,
            hash: HashConfig {
                cost: args.hash_cost,
                memory_kib: args.hash_memory_kib,
            },
            token_ttl: Duration::from_secs(args.token_ttl_secs),
            cookie_secure: args.cookie_secure,
        }
    }
}
