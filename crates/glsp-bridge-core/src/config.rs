//! Configuration management for the GLSP bridge.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/glsp-bridge/config.json`
//! 2. Environment variable: `GLSP_BRIDGE_CONFIG_CONTENT`
//! 3. Project config: `glsp-bridge.jsonc` or `glsp-bridge.json` in the project directory
//! 4. Environment overrides: `GLSP_SERVER_PORT`, `GLSP_SERVER_DEBUG`
//!
//! Supports JSONC (JSON with comments) and variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{BridgeResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default port of the GLSP server.
pub const DEFAULT_SERVER_PORT: u16 = 5007;

/// Default application client id sent on `initialize`.
pub const DEFAULT_CLIENT_ID: &str = "glsp.bridge";

/// Static regex for variable substitution, compiled once.
static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

/// Get the variable substitution regex, compiling it once on first use.
fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{(env|file):([^}]+)\}")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Diagram type registered on the server, e.g. `workflow-diagram`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagram_type: Option<String>,

    /// Log every routed message at info level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<bool>,

    /// Log level filter for the bridge binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// GLSP server settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// GLSP server process and connection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Path to the server jar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jar_path: Option<PathBuf>,

    /// TCP port the server listens on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Java executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java: Option<String>,

    /// Extra arguments appended to the server command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_args: Option<Vec<String>>,

    /// Launch the server process. When false, connect to a running server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch: Option<bool>,

    /// Client id sent in the `initialize` arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Human readable client name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Seconds to wait for the server's startup line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_timeout_secs: Option<u64>,
}

impl ServerConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn java(&self) -> &str {
        self.java.as_deref().unwrap_or("java")
    }

    pub fn should_launch(&self) -> bool {
        self.launch.unwrap_or(true)
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID)
    }

    /// Merge another server config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            jar_path: merge_option(self.jar_path, other.jar_path),
            port: merge_option(self.port, other.port),
            java: merge_option(self.java, other.java),
            additional_args: merge_option(self.additional_args, other.additional_args),
            launch: merge_option(self.launch, other.launch),
            client_id: merge_option(self.client_id, other.client_id),
            client_name: merge_option(self.client_name, other.client_name),
            startup_timeout_secs: merge_option(self.startup_timeout_secs, other.startup_timeout_secs),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/glsp-bridge/`
    /// 2. `GLSP_BRIDGE_CONFIG_CONTENT` environment variable
    /// 3. Project config from `project_dir`
    /// 4. `GLSP_SERVER_*` environment overrides
    pub async fn load(project_dir: Option<&Path>) -> BridgeResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        // 1. Load global config
        if let Some(global_dir) = Self::global_config_dir() {
            for name in &["config.json", "glsp-bridge.json", "glsp-bridge.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    let loaded = Self::load_file(&path).await?;
                    config = config.merge(loaded);
                    sources.push(path);
                    break;
                }
            }
        }

        // 2. Load from environment variable
        if let Ok(content) = std::env::var("GLSP_BRIDGE_CONFIG_CONTENT") {
            let loaded = Self::parse_jsonc(&content, "<env>")?;
            config = config.merge(loaded);
        }

        // 3. Load project config
        if let Some(dir) = project_dir {
            for name in &["glsp-bridge.jsonc", "glsp-bridge.json"] {
                let path = dir.join(name);
                if path.exists() {
                    let loaded = Self::load_file(&path).await?;
                    config = config.merge(loaded);
                    sources.push(path);
                    break;
                }
            }
        }

        // 4. Environment overrides
        let overrides = Self::from_env_overrides(
            std::env::var("GLSP_SERVER_PORT").ok().as_deref(),
            std::env::var("GLSP_SERVER_DEBUG").ok().as_deref(),
        )?;
        config = config.merge(overrides);

        tracing::debug!(sources = sources.len(), "Loaded configuration");
        Ok((config, sources))
    }

    /// Build the override layer from `GLSP_SERVER_PORT` and `GLSP_SERVER_DEBUG`.
    ///
    /// A debug server is started by the developer, so `GLSP_SERVER_DEBUG=true`
    /// disables launching.
    pub fn from_env_overrides(port: Option<&str>, debug: Option<&str>) -> BridgeResult<Self> {
        let mut server = ServerConfig::default();

        if let Some(port) = port {
            let parsed = port.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "GLSP_SERVER_PORT".to_string(),
                value: port.to_string(),
            })?;
            server.port = Some(parsed);
        }

        if let Some(debug) = debug {
            if debug.trim().eq_ignore_ascii_case("true") {
                server.launch = Some(false);
            }
        }

        if server == ServerConfig::default() {
            return Ok(Config::default());
        }

        Ok(Config {
            server: Some(server),
            ..Default::default()
        })
    }

    /// Get the global config directory.
    ///
    /// On Unix systems, prefers `~/.config/glsp-bridge` (XDG standard) over
    /// the platform-specific directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                let xdg_config = home.join(".config").join("glsp-bridge");
                if xdg_config.exists() {
                    return Some(xdg_config);
                }
            }
        }

        dirs::config_dir().map(|d| d.join("glsp-bridge"))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> BridgeResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> BridgeResult<Self> {
        let stripped = Self::strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip JSON comments.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }

            if c == '\\' && in_string {
                result.push(c);
                escape_next = true;
                continue;
            }

            if c == '"' {
                in_string = !in_string;
                result.push(c);
                continue;
            }

            if in_string {
                result.push(c);
                continue;
            }

            if c == '/' {
                match chars.peek() {
                    Some('/') => {
                        chars.next();
                        for c in chars.by_ref() {
                            if c == '\n' {
                                result.push('\n');
                                break;
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        chars.next();
                        let mut prev = ' ';
                        for c in chars.by_ref() {
                            if prev == '*' && c == '/' {
                                break;
                            }
                            // Keep line numbers stable for parse errors
                            if c == '\n' {
                                result.push('\n');
                            }
                            prev = c;
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            result.push(c);
        }

        result
    }

    /// Substitute `{env:VAR}` and `{file:path}` references.
    ///
    /// File paths are relative to the config file.
    fn substitute_variables(content: &str, config_path: &Path) -> BridgeResult<String> {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let mut result = content.to_string();

        for cap in var_regex().captures_iter(content) {
            let (Some(full), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2)) else {
                continue;
            };
            let value = value.as_str();

            let replacement = match kind.as_str() {
                "env" => std::env::var(value).map_err(|_| ConfigError::EnvVarNotFound {
                    name: value.to_string(),
                })?,
                "file" => {
                    let file_path = config_dir.join(value);
                    std::fs::read_to_string(&file_path)
                        .map(|v| v.trim().to_string())
                        .map_err(|_| ConfigError::FileRefNotFound {
                            path: file_path.display().to_string(),
                        })?
                }
                _ => continue,
            };

            result = result.replace(full.as_str(), &replacement);
        }

        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        let server = match (self.server, other.server) {
            (Some(base), Some(other)) => Some(base.merge(other)),
            (base, None) => base,
            (None, other) => other,
        };

        Self {
            schema: merge_option(self.schema, other.schema),
            diagram_type: merge_option(self.diagram_type, other.diagram_type),
            logging: merge_option(self.logging, other.logging),
            log_level: merge_option(self.log_level, other.log_level),
            server,
        }
    }

    /// Server settings, defaulted when absent.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }
}

/// Merge two Option values.
fn merge_option<T>(base: Option<T>, other: Option<T>) -> Option<T> {
    match (base, other) {
        (_, Some(o)) => Some(o),
        (b, None) => b,
    }
}
