use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

// `Store` and `Jwt` redact credentials in their Debug output; settings are logged at startup.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub store: Store,
    pub jwt: Jwt,
    pub http: Http,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub backend: String, // "fake" or "real"
}

#[derive(Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "mysql"
    #[serde(default)]
    pub dsn: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend)
            .field("dsn", &self.dsn.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Deserialize)]
pub struct Jwt {
    pub issuer: String,
    pub audience: String,
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

impl Jwt {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

impl std::fmt::Debug for Jwt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwt")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
    #[serde(default)]
    pub tls: Option<Tls>,
}

#[derive(Debug, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_max_connections() -> u32 {
    5
}

fn default_access_ttl_secs() -> u64 {
    15 * 60 // 15 minutes
}

fn default_refresh_ttl_secs() -> u64 {
    10 * 24 * 60 * 60 // 10 days
}

fn default_secure_cookies() -> bool {
    true
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "LATCHKEY";

/// Upper bound for either token lifetime.
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.jwt.access_secret.is_empty() || self.jwt.refresh_secret.is_empty() {
            bail!("jwt secrets must not be empty");
        }
        if self.jwt.access_secret == self.jwt.refresh_secret {
            bail!("jwt access and refresh secrets must differ");
        }
        if self.jwt.access_ttl_secs == 0 || self.jwt.access_ttl_secs >= self.jwt.refresh_ttl_secs {
            bail!("jwt access ttl must be positive and shorter than the refresh ttl");
        }
        if self.jwt.refresh_ttl_secs > MAX_TTL_SECS {
            bail!("jwt refresh ttl must not exceed {MAX_TTL_SECS} seconds");
        }
        if self.store.backend == "mysql" && self.store.dsn.is_none() {
            bail!("store.dsn is required for the mysql backend");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
[auth]
backend = "real"

[store]
backend = "memory"

[jwt]
issuer = "latchkey"
audience = "web"
access_secret = "a-secret"
refresh_secret = "r-secret"

[http]
address = "127.0.0.1:8080"

[log]
filter = "debug"
"#;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn fills_in_defaults() {
        let file = write_toml(VALID);
        let settings = parse_settings(file.path().to_str()).unwrap();

        assert_eq!(settings.jwt.access_ttl(), Duration::from_secs(900));
        assert_eq!(settings.jwt.refresh_ttl(), Duration::from_secs(864_000));
        assert_eq!(settings.store.max_connections, 5);
        assert!(settings.http.secure_cookies);
        assert!(settings.http.tls.is_none());
    }

    #[test]
    fn rejects_shared_jwt_secret() {
        let file = write_toml(&VALID.replace("r-secret", "a-secret"));
        assert!(parse_settings(file.path().to_str()).is_err());
    }

    #[test]
    fn mysql_backend_needs_a_dsn() {
        let file = write_toml(&VALID.replace(
            "backend = \"memory\"",
            "backend = \"mysql\"",
        ));
        assert!(parse_settings(file.path().to_str()).is_err());
    }

    #[test]
    fn rejects_refresh_ttl_beyond_a_year() {
        let file = write_toml(&VALID.replace(
            "refresh_secret = \"r-secret\"",
            "refresh_secret = \"r-secret\"\nrefresh_ttl_secs = 1000000000000000",
        ));
        assert!(parse_settings(file.path().to_str()).is_err());

        let file = write_toml(&VALID.replace(
            "refresh_secret = \"r-secret\"",
            "refresh_secret = \"r-secret\"\nrefresh_ttl_secs = 31536000",
        ));
        assert!(parse_settings(file.path().to_str()).is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }

    #[test]
    fn secrets_are_not_debug_printed() {
        let file = write_toml(VALID);
        let settings = parse_settings(file.path().to_str()).unwrap();
        let printed = format!("{settings:?}");
        assert!(!printed.contains("a-secret"));
        assert!(!printed.contains("r-secret"));
    }
}
