//! Configuration loading

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::mcp::NAMESPACE_SEPARATOR;

/// Directory name under the platform config dir used as global fallback
const GLOBAL_DIR: &str = "multi-mcp";

/// Default worker config file name
pub const MCP_CONFIG_FILE: &str = ".mcp.json";

/// Default client settings file name
pub const SETTINGS_FILE: &str = ".multi-mcp.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at `<config_dir>/multi-mcp/`
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    let global_path = dirs::config_dir()?.join(GLOBAL_DIR).join(filename);
    global_path.exists().then_some(global_path)
}

// ============================================================================
// Worker configuration (.mcp.json)
// ============================================================================

/// Worker set, keyed by unique worker name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, WorkerConfig>,
}

/// How to launch one worker
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overlay applied on top of the inherited process environment
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl WorkerConfig {
    /// Environment overlay with `$VAR` / `${VAR}` references expanded.
    /// Values that fail to expand are passed through verbatim.
    pub fn expanded_env(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(key, value)| {
                let expanded = shellexpand::env(value).unwrap_or_else(|_| value.clone().into());
                (key.clone(), expanded.into_owned())
            })
            .collect()
    }

    /// Command line for log output
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl McpConfig {
    /// Load from an explicit path, or search for `.mcp.json`.
    ///
    /// Unlike the settings file, a worker config is required: not finding one
    /// is a load error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_config_file(MCP_CONFIG_FILE).ok_or_else(|| Error::ConfigLoad {
                path: MCP_CONFIG_FILE.to_string(),
                reason: "not found in current directory, its parents, or the global config dir"
                    .to_string(),
            })?,
        };
        tracing::debug!("Loading MCP config from: {}", path.display());
        Self::load_from_path(&path)
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let load_err = |reason: String| Error::ConfigLoad {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        Self::parse(&content).map_err(|e| match e {
            Error::ConfigLoad { reason, .. } => load_err(reason),
            other => other,
        })
    }

    /// Parse a JSON config document
    pub fn parse(content: &str) -> Result<Self> {
        let config: McpConfig = serde_json::from_str(content).map_err(|e| Error::ConfigLoad {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;

        if let Some((name, _)) = config
            .mcp_servers
            .iter()
            .find(|(_, worker)| worker.command.trim().is_empty())
        {
            return Err(Error::ConfigLoad {
                path: "<inline>".to_string(),
                reason: format!("worker '{}' has an empty command", name),
            });
        }

        // Worker names form the first half of namespaced tool names
        if let Some(name) = config
            .mcp_servers
            .keys()
            .find(|name| name.is_empty() || name.contains(NAMESPACE_SEPARATOR))
        {
            return Err(Error::ConfigLoad {
                path: "<inline>".to_string(),
                reason: format!(
                    "worker name '{}' must be non-empty and must not contain '{}'",
                    name, NAMESPACE_SEPARATOR
                ),
            });
        }

        Ok(config)
    }
}

// ============================================================================
// Client settings (.multi-mcp.toml)
// ============================================================================

/// Optional settings file
#[derive(Debug, Default, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub timeouts: TimeoutSection,
}

/// Model service section
#[derive(Debug, Default, Deserialize)]
pub struct LlmSection {
    pub url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Conversation section
#[derive(Debug, Default, Deserialize)]
pub struct AgentSection {
    pub system_prompt: Option<String>,
}

/// Timeout section, all values in seconds
#[derive(Debug, Default, Deserialize)]
pub struct TimeoutSection {
    pub connect_secs: Option<u64>,
    pub tool_secs: Option<u64>,
    pub reply_secs: Option<u64>,
}

impl SettingsFile {
    /// Load `.multi-mcp.toml` if present, defaults otherwise
    pub fn load() -> Result<Self> {
        match find_config_file(SETTINGS_FILE) {
            Some(path) => {
                tracing::debug!("Loading settings from: {}", path.display());
                Self::load_from_path(&path)
            }
            None => {
                tracing::debug!("No {} found, using defaults", SETTINGS_FILE);
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let load_err = |reason: String| Error::ConfigLoad {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        toml::from_str(&content).map_err(|e| load_err(e.to_string()))
    }
}

/// Values supplied on the command line; `None` defers to the settings file
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

/// Effective client settings after layering CLI over file over defaults
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub connect_timeout: Duration,
    pub tool_timeout: Duration,
    pub reply_timeout: Duration,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_CONNECT_SECS: u64 = 30;
const DEFAULT_TOOL_SECS: u64 = 60;
const DEFAULT_REPLY_SECS: u64 = 60;

impl Settings {
    /// Layer CLI values over the settings file over built-in defaults
    pub fn resolve(cli: CliOverrides, file: SettingsFile) -> Self {
        Self {
            api_url: cli.api_url.or(file.llm.url).unwrap_or_else(default_api_url),
            api_key: cli.api_key,
            model: cli.model.or(file.llm.model).unwrap_or_else(default_model),
            max_tokens: file.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system_prompt: file.agent.system_prompt,
            connect_timeout: Duration::from_secs(
                cli.connect_timeout_secs
                    .or(file.timeouts.connect_secs)
                    .unwrap_or(DEFAULT_CONNECT_SECS),
            ),
            tool_timeout: Duration::from_secs(file.timeouts.tool_secs.unwrap_or(DEFAULT_TOOL_SECS)),
            reply_timeout: Duration::from_secs(
                file.timeouts.reply_secs.unwrap_or(DEFAULT_REPLY_SECS),
            ),
        }
    }
}
