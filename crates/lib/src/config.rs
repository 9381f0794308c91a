//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.chatrelay/config.json`) and environment.
//! Environment values win over the file; the merged result is resolved once at start-up
//! into [`Settings`], which carries the capability flags (webhook, TLS, direct calls).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config (file shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion provider settings (OpenAI-compatible API).
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Channel settings (e.g. LINE).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Direct-call route settings.
    #[serde(default)]
    pub call: CallConfig,

    /// Console and file logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bind address, port and optional TLS listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Plain HTTP port (default 3000). Overridden by PORT env.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub tls: TlsConfig,
}

/// TLS material. The TLS listener starts only when key, certificate and CA are all set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// HTTPS port (default 3443).
    #[serde(default = "default_tls_port")]
    pub port: u16,
    pub key_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    /// Provider API key. Overridden by OPENAI_API_KEY env.
    pub api_key: Option<String>,
    /// Model name (default "gpt-3.5-turbo").
    pub model: Option<String>,
    /// API base including the version segment (default "https://api.openai.com/v1").
    pub base_url: Option<String>,
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub line: LineChannelConfig,
}

/// LINE Messaging API channel. The webhook route is enabled only when both token and secret are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChannelConfig {
    /// Long-lived channel access token. Overridden by CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// Channel secret used to verify X-Line-Signature. Overridden by CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Messaging API base (default "https://api.line.me"); tests point this at a local server.
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallConfig {
    /// Shared bearer secret for GET /call. Overridden by HTTP_CALL_KEY env.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Directory for dated log files (default "log"). Overridden by LOG_DIR env.
    pub directory: Option<PathBuf>,
    /// env_logger filter (default "info"). Overridden by LOG_LEVEL env; RUST_LOG wins over both.
    pub level: Option<String>,
}

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LINE_API_BASE_URL: &str = "https://api.line.me";
pub const DEFAULT_LOG_DIR: &str = "log";
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_tls_port() -> u16 {
    3443
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            tls: TlsConfig::default(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            port: default_tls_port(),
            key_path: None,
            cert_path: None,
            ca_path: None,
        }
    }
}

/// Resolved runtime settings. Built once at start-up; optional features are `None` when their
/// configuration is incomplete.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub completion: CompletionSettings,
    /// Webhook capability: `Some` only when both LINE token and secret are present.
    pub line: Option<LineSettings>,
    /// Direct-call bearer secret. When `None`, every direct call is rejected.
    pub call_key: Option<String>,
    /// TLS capability: `Some` only when key, certificate and CA are all present.
    pub tls: Option<TlsSettings>,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct LineSettings {
    pub channel_access_token: String,
    pub channel_secret: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub port: u16,
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
    pub ca_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub level: String,
}

impl Settings {
    /// Resolve settings from the config file values and the process environment.
    pub fn resolve(config: &Config) -> Result<Self> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve settings with an explicit variable lookup (used by tests).
    pub fn resolve_with<F>(config: &Config, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(env(name));

        let api_key = var("OPENAI_API_KEY")
            .or_else(|| non_empty(config.completion.api_key.clone()))
            .context("completion API key missing (set OPENAI_API_KEY or completion.apiKey)")?;
        let completion = CompletionSettings {
            api_key,
            model: var("OPENAI_MODEL")
                .or_else(|| non_empty(config.completion.model.clone()))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: var("OPENAI_BASE_URL")
                .or_else(|| non_empty(config.completion.base_url.clone()))
                .unwrap_or_else(|| DEFAULT_COMPLETION_BASE_URL.to_string()),
        };

        let line_cfg = &config.channels.line;
        let token = var("CHANNEL_ACCESS_TOKEN").or_else(|| non_empty(line_cfg.channel_access_token.clone()));
        let secret = var("CHANNEL_SECRET").or_else(|| non_empty(line_cfg.channel_secret.clone()));
        let line = match (token, secret) {
            (Some(channel_access_token), Some(channel_secret)) => Some(LineSettings {
                channel_access_token,
                channel_secret,
                api_base_url: non_empty(line_cfg.api_base_url.clone())
                    .unwrap_or_else(|| DEFAULT_LINE_API_BASE_URL.to_string()),
            }),
            _ => None,
        };

        let call_key = resolve_call_key(config, &var);
        let port = resolve_port(config, &var)?;
        let tls_port = match var("TLS_PORT") {
            Some(p) => p
                .parse::<u16>()
                .with_context(|| format!("invalid TLS_PORT value: {}", p))?,
            None => config.server.tls.port,
        };
        let tls_cfg = &config.server.tls;
        let path_var = |name: &str, fallback: &Option<PathBuf>| {
            var(name)
                .map(PathBuf::from)
                .or_else(|| fallback.clone().filter(|p| !p.as_os_str().is_empty()))
        };
        let tls = match (
            path_var("TLS_KEY_PATH", &tls_cfg.key_path),
            path_var("TLS_CERT_PATH", &tls_cfg.cert_path),
            path_var("TLS_CA_PATH", &tls_cfg.ca_path),
        ) {
            (Some(key_path), Some(cert_path), Some(ca_path)) => Some(TlsSettings {
                port: tls_port,
                key_path,
                cert_path,
                ca_path,
            }),
            _ => None,
        };

        let logging = LoggingSettings {
            directory: path_var("LOG_DIR", &config.logging.directory)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            level: var("LOG_LEVEL")
                .or_else(|| non_empty(config.logging.level.clone()))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        Ok(Self {
            bind: var("HOST").unwrap_or_else(|| config.server.bind.trim().to_string()),
            port,
            completion,
            line,
            call_key,
            tls,
            logging,
        })
    }

    pub fn webhook_enabled(&self) -> bool {
        self.line.is_some()
    }
}

/// What `chatrelay call` needs to reach a running relay. Resolved with the same env-over-file
/// rules as [`Settings`], but without requiring the provider key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub key: Option<String>,
    pub port: u16,
}

impl CallTarget {
    pub fn resolve(config: &Config) -> Result<Self> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(config: &Config, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(env(name));
        Ok(Self {
            key: resolve_call_key(config, &var),
            port: resolve_port(config, &var)?,
        })
    }
}

fn resolve_call_key(config: &Config, var: &impl Fn(&str) -> Option<String>) -> Option<String> {
    var("HTTP_CALL_KEY").or_else(|| non_empty(config.call.key.clone()))
}

fn resolve_port(config: &Config, var: &impl Fn(&str) -> Option<String>) -> Result<u16> {
    match var("PORT") {
        Some(p) => p
            .parse::<u16>()
            .with_context(|| format!("invalid PORT value: {}", p)),
        None => Ok(config.server.port),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CHATRELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".chatrelay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_server_port_and_bind() {
        let s = ServerConfig::default();
        assert_eq!(s.port, 3000);
        assert_eq!(s.bind, "0.0.0.0");
        assert_eq!(s.tls.port, 3443);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = Settings::resolve_with(&Config::default(), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config.completion.api_key = Some("from-file".to_string());
        config.call.key = Some("file-key".to_string());
        config.server.port = 8080;

        let settings = Settings::resolve_with(
            &config,
            env_of(&[("OPENAI_API_KEY", "from-env"), ("HTTP_CALL_KEY", "env-key"), ("PORT", "9000")]),
        )
        .unwrap();
        assert_eq!(settings.completion.api_key, "from-env");
        assert_eq!(settings.completion.model, DEFAULT_MODEL);
        assert_eq!(settings.call_key.as_deref(), Some("env-key"));
        assert_eq!(settings.port, 9000);
    }

    #[test]
    fn blank_env_values_fall_back_to_file() {
        let mut config = Config::default();
        config.completion.api_key = Some("from-file".to_string());
        let settings =
            Settings::resolve_with(&config, env_of(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert_eq!(settings.completion.api_key, "from-file");
    }

    #[test]
    fn webhook_requires_token_and_secret() {
        let only_token = Settings::resolve_with(
            &Config::default(),
            env_of(&[("OPENAI_API_KEY", "k"), ("CHANNEL_ACCESS_TOKEN", "t")]),
        )
        .unwrap();
        assert!(!only_token.webhook_enabled());

        let both = Settings::resolve_with(
            &Config::default(),
            env_of(&[
                ("OPENAI_API_KEY", "k"),
                ("CHANNEL_ACCESS_TOKEN", "t"),
                ("CHANNEL_SECRET", "s"),
            ]),
        )
        .unwrap();
        let line = both.line.expect("line settings");
        assert_eq!(line.channel_access_token, "t");
        assert_eq!(line.channel_secret, "s");
        assert_eq!(line.api_base_url, DEFAULT_LINE_API_BASE_URL);
    }

    #[test]
    fn tls_requires_all_three_paths() {
        let two = Settings::resolve_with(
            &Config::default(),
            env_of(&[
                ("OPENAI_API_KEY", "k"),
                ("TLS_KEY_PATH", "/etc/relay/key.pem"),
                ("TLS_CERT_PATH", "/etc/relay/cert.pem"),
            ]),
        )
        .unwrap();
        assert!(two.tls.is_none());

        let mut config = Config::default();
        config.server.tls.ca_path = Some(PathBuf::from("/etc/relay/ca.pem"));
        let three = Settings::resolve_with(
            &config,
            env_of(&[
                ("OPENAI_API_KEY", "k"),
                ("TLS_KEY_PATH", "/etc/relay/key.pem"),
                ("TLS_CERT_PATH", "/etc/relay/cert.pem"),
                ("TLS_PORT", "8443"),
            ]),
        )
        .unwrap();
        assert_eq!(
            three.tls,
            Some(TlsSettings {
                port: 8443,
                key_path: PathBuf::from("/etc/relay/key.pem"),
                cert_path: PathBuf::from("/etc/relay/cert.pem"),
                ca_path: PathBuf::from("/etc/relay/ca.pem"),
            })
        );
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = Settings::resolve_with(
            &Config::default(),
            env_of(&[("OPENAI_API_KEY", "k"), ("PORT", "http")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn call_target_follows_env_over_file() {
        let mut config = Config::default();
        config.call.key = Some("file-key".to_string());
        config.server.port = 8080;

        let blank_env = CallTarget::resolve_with(&config, env_of(&[("HTTP_CALL_KEY", " ")])).unwrap();
        assert_eq!(
            blank_env,
            CallTarget {
                key: Some("file-key".to_string()),
                port: 8080,
            }
        );

        let from_env = CallTarget::resolve_with(
            &config,
            env_of(&[("HTTP_CALL_KEY", "env-key"), ("PORT", "9100")]),
        )
        .unwrap();
        assert_eq!(from_env.key.as_deref(), Some("env-key"));
        assert_eq!(from_env.port, 9100);
    }

    #[test]
    fn call_target_does_not_need_provider_key() {
        let target = CallTarget::resolve_with(&Config::default(), env_of(&[])).unwrap();
        assert_eq!(target.key, None);
        assert_eq!(target.port, 3000);
    }

    #[test]
    fn parses_camel_case_file() {
        let json = r#"{
            "server": { "port": 4000, "tls": { "keyPath": "k.pem" } },
            "completion": { "apiKey": "sk-test", "model": "gpt-4o-mini" },
            "channels": { "line": { "channelAccessToken": "tok", "channelSecret": "sec" } },
            "call": { "key": "rightsecret" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.tls.key_path, Some(PathBuf::from("k.pem")));
        let settings = Settings::resolve_with(&config, env_of(&[])).unwrap();
        assert_eq!(settings.completion.model, "gpt-4o-mini");
        assert!(settings.webhook_enabled());
        assert_eq!(settings.call_key.as_deref(), Some("rightsecret"));
        assert!(settings.tls.is_none());
    }
}
