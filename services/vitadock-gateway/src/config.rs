//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The consumer secret and store key are loaded from env vars or files and
//! never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vitadock_auth::constants::TEMPORARY_CREDENTIAL_TTL_SECS;
use vitadock_auth::{CredentialStoreMode, ProviderConfig};

pub const CONSUMER_KEY_ENV: &str = "VITADOCK_CONSUMER_KEY";
pub const CONSUMER_SECRET_ENV: &str = "VITADOCK_CONSUMER_SECRET";
pub const STORE_KEY_ENV: &str = "VITADOCK_STORE_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// HTTP listener and flow settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default)]
    pub credential_store: CredentialStoreMode,
    #[serde(default = "default_ttl")]
    pub temporary_credential_ttl_secs: u64,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

/// Registered consumer identity
#[derive(Debug, Default, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub key: String,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
    /// Signs client-held temporary credential state
    #[serde(skip)]
    pub store_key: Option<Secret<String>>,
    #[serde(default)]
    pub store_key_file: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

fn default_ttl() -> u64 {
    TEMPORARY_CREDENTIAL_TTL_SECS
}

fn default_session_ttl() -> u64 {
    8 * 60 * 60
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn temporary_credential_ttl(&self) -> Duration {
        Duration::from_secs(self.temporary_credential_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order, for both the consumer secret and the store key:
    /// 1. env var
    /// 2. `*_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(key) = std::env::var(CONSUMER_KEY_ENV) {
            config.consumer.key = key.trim().to_owned();
        }
        config.consumer.secret = resolve_secret(
            CONSUMER_SECRET_ENV,
            config.consumer.secret_file.as_deref(),
            "secret_file",
        )?;
        config.consumer.store_key = resolve_secret(
            STORE_KEY_ENV,
            config.consumer.store_key_file.as_deref(),
            "store_key_file",
        )?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        self.provider
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;

        if self.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.server.temporary_credential_ttl_secs == 0 {
            return Err(common::Error::Config(
                "temporary_credential_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.server.session_ttl_secs == 0 {
            return Err(common::Error::Config(
                "session_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.consumer.key.trim().is_empty() {
            return Err(common::Error::Config(format!(
                "consumer key is required: set [consumer].key or {CONSUMER_KEY_ENV}"
            )));
        }
        if self.consumer.secret.is_none() {
            return Err(common::Error::Config(format!(
                "consumer secret is required: set {CONSUMER_SECRET_ENV} or [consumer].secret_file"
            )));
        }
        if self.server.credential_store == CredentialStoreMode::Client
            && self.consumer.store_key.is_none()
        {
            return Err(common::Error::Config(format!(
                "credential_store = \"client\" needs a store key: \
                 set {STORE_KEY_ENV} or [consumer].store_key_file"
            )));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("vitadock-gateway.toml")
    }
}

/// Env var first, then file. Whitespace-only values count as unset.
fn resolve_secret(
    env: &str,
    file: Option<&Path>,
    field: &str,
) -> common::Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env) {
        let value = value.trim().to_owned();
        if !value.is_empty() {
            return Ok(Some(Secret::new(value)));
        }
    }
    let Some(file) = file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read {field} {}: {e}", file.display()))
    })?;
    let value = value.trim().to_owned();
    Ok((!value.is_empty()).then(|| Secret::new(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_vitadock_env() {
        unsafe {
            remove_env(CONSUMER_KEY_ENV);
            remove_env(CONSUMER_SECRET_ENV);
            remove_env(STORE_KEY_ENV);
        }
    }

    fn write_config(dir: &TempDir, extra_consumer: &str, extra_server: &str) -> PathBuf {
        let secret_path = dir.path().join("consumer_secret");
        std::fs::write(&secret_path, "file-secret\n").unwrap();
        let contents = format!(
            r#"
[server]
listen_addr = "127.0.0.1:8080"
{extra_server}

[consumer]
key = "vitadock-demo"
secret_file = "{}"
{extra_consumer}
"#,
            secret_path.display()
        );
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "", "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.server.max_connections, 256);
        assert_eq!(config.server.credential_store, CredentialStoreMode::Memory);
        assert_eq!(config.server.temporary_credential_ttl_secs, 600);
        assert_eq!(config.server.session_ttl_secs, 8 * 60 * 60);
        assert_eq!(config.consumer.key, "vitadock-demo");
        assert_eq!(config.consumer.secret.as_ref().unwrap().expose(), "file-secret");
        assert!(config.consumer.store_key.is_none());
        assert_eq!(
            config.provider.base_url,
            "https://vitacloud.medisanaspace.com"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{{{ toml").unwrap();
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_consumer_secret_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "", "");

        unsafe { set_env(CONSUMER_SECRET_ENV, "env-secret") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.consumer.secret.as_ref().unwrap().expose(), "env-secret");
        clear_vitadock_env();
    }

    #[test]
    fn test_consumer_key_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "", "");

        unsafe { set_env(CONSUMER_KEY_ENV, "from-env") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.consumer.key, "from-env");
        clear_vitadock_env();
    }

    #[test]
    fn test_missing_consumer_secret_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[consumer]
key = "vitadock-demo"
"#,
        )
        .unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains(CONSUMER_SECRET_ENV), "got: {err}");
    }

    #[test]
    fn test_whitespace_secret_file_counts_as_unset() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "", "");
        std::fs::write(dir.path().join("consumer_secret"), "  \n  ").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_client_store_requires_store_key() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "", r#"credential_store = "client""#);

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("store key"), "got: {err}");

        unsafe { set_env(STORE_KEY_ENV, "store-key-from-env") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.credential_store, CredentialStoreMode::Client);
        assert_eq!(
            config.consumer.store_key.as_ref().unwrap().expose(),
            "store-key-from-env"
        );
        clear_vitadock_env();
    }

    #[test]
    fn test_store_key_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let key_path = dir.path().join("store_key");
        std::fs::write(&key_path, "store-key-from-file\n").unwrap();
        let path = write_config(
            &dir,
            &format!(r#"store_key_file = "{}""#, key_path.display()),
            r#"credential_store = "client""#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.consumer.store_key.as_ref().unwrap().expose(),
            "store-key-from-file"
        );
    }

    #[test]
    fn test_zero_values_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        for extra in [
            "timeout_secs = 0",
            "max_connections = 0",
            "temporary_credential_ttl_secs = 0",
            "session_ttl_secs = 0",
        ] {
            let dir = TempDir::new().unwrap();
            let path = write_config(&dir, "", extra);
            assert!(Config::load(&path).is_err(), "{extra} must be rejected");
        }
    }

    #[test]
    fn test_invalid_provider_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "", "");
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("\n[provider]\nbase_url = \"vitacloud.medisanaspace.com\"\n");
        std::fs::write(&path, contents).unwrap();

        assert!(matches!(Config::load(&path), Err(common::Error::Config(_))));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_vitadock_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "", "");

        let config = Config::load(&path).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("file-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("vitadock-gateway.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }
}
