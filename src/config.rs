use log::*;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use std::env;
use std::path::PathBuf;

use crate::error::Error;

const MIN_SECRET_LENGTH: usize = 32;

/**
 * Runtime settings, read from the environment (and `.env` when present)
 */
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub admin_username: String,
    pub admin_password: String,
    pub session_secret: String,
    /**
     * Load templates from this directory instead of the ones built in
     */
    pub templates_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let config = Self {
            database_url: var_or("DATABASE_URL", "sqlite:polls.sqlite3"),
            listen_addr: var_or("LISTEN_ADDR", "127.0.0.1:8000"),
            admin_username: var_or("ADMIN_USERNAME", "admin"),
            admin_password: env::var("ADMIN_PASSWORD").map_err(|_| Error::MissingVar("ADMIN_PASSWORD"))?,
            session_secret: env::var("SESSION_SECRET").map_err(|_| Error::MissingVar("SESSION_SECRET"))?,
            templates_dir: env::var_os("TEMPLATES_DIR").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.session_secret.len() < MIN_SECRET_LENGTH {
            return Err(Error::InvalidVar {
                name: "SESSION_SECRET",
                reason: format!("must be at least {} bytes", MIN_SECRET_LENGTH),
            });
        }
        if self.admin_password.is_empty() {
            return Err(Error::InvalidVar {
                name: "ADMIN_PASSWORD",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /**
     * Whether the database lives only as long as its connection
     */
    pub fn in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /**
     * Check a staff login against the configured credentials.
     *
     * Both fields are always compared, each in constant time.
     */
    pub fn credentials_match(&self, username: &str, password: &str) -> bool {
        let username_ok = constant_time_eq(username.as_bytes(), self.admin_username.as_bytes());
        let password_ok = constant_time_eq(password.as_bytes(), self.admin_password.as_bytes());
        username_ok & password_ok
    }
}

/**
 * Compare the SHA-256 digests of both inputs in constant time
 */
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let hash_a = Sha256::digest(a);
    let hash_b = Sha256::digest(b);
    hash_a.ct_eq(&hash_b).into()
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}
