use anyhow::{bail, Context};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::shortcode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    /// Public base for generated links. When unset the request's Host header
    /// is used.
    pub base_url: Option<String>,
    pub shortcode: ShortcodeConfig,
    pub default_validity_minutes: i64,
    pub frontend: FrontendConfig,
    pub client_ip: ClientIpConfig,
    pub sweeper: SweeperConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcodeConfig {
    pub length: usize,
    /// Generation attempts before giving up on collisions.
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Directory holding `index.html` and other static assets
    pub static_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket address only
    None,
    /// Honour `Forwarded` / `X-Forwarded-For` from trusted proxies
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIpConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    /// Proxies allowed to append to forwarding headers. Empty trusts any hop.
    pub trusted_proxies: Vec<IpNet>,
    pub ip_anonymization: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// `None` disables background eviction entirely.
    pub interval_secs: Option<u64>,
    pub retention_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
    #[serde(default)]
    pub remote: Option<RemoteLogConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLogConfig {
    pub url: String,
    pub stack: String,
    /// Minimum level forwarded: debug, info, warn or error
    pub level: String,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            base_url: None,
            shortcode: ShortcodeConfig {
                length: shortcode::DEFAULT_LENGTH,
                max_attempts: 10,
            },
            default_validity_minutes: 30,
            frontend: FrontendConfig {
                static_dir: "static".to_string(),
            },
            client_ip: ClientIpConfig {
                trusted_proxy_mode: TrustedProxyMode::None,
                trusted_proxies: vec![],
                ip_anonymization: false,
            },
            sweeper: SweeperConfig {
                interval_secs: None,
                retention_secs: 3600,
            },
            logging: LoggingConfig {
                format: LogFormat::Text,
                remote: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let host = lookup("HOST").unwrap_or(defaults.server.host);
        let port = parse_or(&lookup, "PORT", defaults.server.port)?;

        let base_url = lookup("BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let default_validity_minutes = parse_or(
            &lookup,
            "DEFAULT_VALIDITY_MINUTES",
            defaults.default_validity_minutes,
        )?;
        if default_validity_minutes <= 0 {
            bail!("DEFAULT_VALIDITY_MINUTES must be positive, got {default_validity_minutes}");
        }

        let length = parse_or(&lookup, "SHORTCODE_LENGTH", defaults.shortcode.length)?;
        if length == 0 || length > shortcode::MAX_LENGTH {
            bail!(
                "SHORTCODE_LENGTH must be between 1 and {}, got {length}",
                shortcode::MAX_LENGTH
            );
        }
        let max_attempts = parse_or(
            &lookup,
            "SHORTCODE_MAX_ATTEMPTS",
            defaults.shortcode.max_attempts,
        )?;
        if max_attempts == 0 {
            bail!("SHORTCODE_MAX_ATTEMPTS must be at least 1");
        }

        let static_dir = lookup("STATIC_DIR").unwrap_or(defaults.frontend.static_dir);

        let trusted_proxy_mode = match lookup("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = lookup("TRUSTED_PROXIES")
            .map(|raw| parse_cidrs(&raw))
            .transpose()?
            .unwrap_or_default();

        let ip_anonymization = lookup("IP_ANONYMIZATION")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let interval_secs = lookup("SWEEP_INTERVAL_SECS")
            .map(|v| {
                v.parse::<u64>()
                    .with_context(|| format!("SWEEP_INTERVAL_SECS is not a number: '{v}'"))
            })
            .transpose()?
            .filter(|secs| *secs > 0);
        let retention_secs = parse_or(
            &lookup,
            "SWEEP_RETENTION_SECS",
            defaults.sweeper.retention_secs,
        )?;

        let format = match lookup("LOG_FORMAT")
            .unwrap_or_else(|| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                tracing::warn!(
                    "Unknown LOG_FORMAT '{other}', falling back to 'text'. Supported values: text, json"
                );
                LogFormat::Text
            }
        };

        let remote = match lookup("REMOTE_LOG_URL").filter(|v| !v.is_empty()) {
            Some(url) => Some(RemoteLogConfig {
                url,
                stack: lookup("REMOTE_LOG_STACK").unwrap_or_else(|| "backend".to_string()),
                level: lookup("REMOTE_LOG_LEVEL")
                    .unwrap_or_else(|| "info".to_string())
                    .to_lowercase(),
                max_retries: parse_or(&lookup, "REMOTE_LOG_MAX_RETRIES", 3)?,
            }),
            None => None,
        };

        Ok(Config {
            server: ServerConfig { host, port },
            base_url,
            shortcode: ShortcodeConfig {
                length,
                max_attempts,
            },
            default_validity_minutes,
            frontend: FrontendConfig { static_dir },
            client_ip: ClientIpConfig {
                trusted_proxy_mode,
                trusted_proxies,
                ip_anonymization,
            },
            sweeper: SweeperConfig {
                interval_secs,
                retention_secs,
            },
            logging: LoggingConfig { format, remote },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_cidrs(raw: &str) -> anyhow::Result<Vec<IpNet>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Ok(net) = s.parse::<IpNet>() {
                return Ok(net);
            }
            // Bare addresses are accepted as single-host networks
            s.parse::<IpAddr>()
                .ok()
                .and_then(|ip| IpNet::new(ip, if ip.is_ipv4() { 32 } else { 128 }).ok())
                .with_context(|| format!("TRUSTED_PROXIES entry is not a CIDR or IP: '{s}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.default_validity_minutes, 30);
        assert_eq!(config.shortcode.length, 6);
        assert_eq!(config.shortcode.max_attempts, 10);
        assert_eq!(config.frontend.static_dir, "static");
        assert_eq!(config.client_ip.trusted_proxy_mode, TrustedProxyMode::None);
        assert!(config.sweeper.interval_secs.is_none());
        assert!(config.logging.remote.is_none());
        assert!(config.base_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("BASE_URL", "https://sho.rt/"),
            ("DEFAULT_VALIDITY_MINUTES", "90"),
            ("SHORTCODE_LENGTH", "8"),
            ("TRUSTED_PROXY_MODE", "Standard"),
            ("TRUSTED_PROXIES", "10.0.0.0/8, 192.168.1.1"),
            ("IP_ANONYMIZATION", "yes"),
            ("SWEEP_INTERVAL_SECS", "60"),
            ("LOG_FORMAT", "json"),
            ("REMOTE_LOG_URL", "http://logs.internal/logs"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.base_url.as_deref(), Some("https://sho.rt"));
        assert_eq!(config.default_validity_minutes, 90);
        assert_eq!(config.shortcode.length, 8);
        assert_eq!(config.client_ip.trusted_proxy_mode, TrustedProxyMode::Standard);
        assert_eq!(config.client_ip.trusted_proxies.len(), 2);
        assert!(config.client_ip.ip_anonymization);
        assert_eq!(config.sweeper.interval_secs, Some(60));
        assert_eq!(config.logging.format, LogFormat::Json);

        let remote = config.logging.remote.unwrap();
        assert_eq!(remote.stack, "backend");
        assert_eq!(remote.level, "info");
        assert_eq!(remote.max_retries, 3);
    }

    #[test]
    fn rejects_out_of_policy_values() {
        assert!(Config::from_lookup(lookup_from(&[("SHORTCODE_LENGTH", "13")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SHORTCODE_LENGTH", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("DEFAULT_VALIDITY_MINUTES", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("TRUSTED_PROXIES", "not-an-ip")])).is_err());
    }

    #[test]
    fn unknown_modes_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("TRUSTED_PROXY_MODE", "cloudflare"),
            ("LOG_FORMAT", "xml"),
        ]))
        .unwrap();

        assert_eq!(config.client_ip.trusted_proxy_mode, TrustedProxyMode::None);
        assert_eq!(config.logging.format, LogFormat::Text);
    }
}
