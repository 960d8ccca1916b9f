//! CLI argument definitions

use std::path::PathBuf;

use clap::Parser;

use crate::config::CliOverrides;

#[derive(Debug, Parser)]
#[command(name = "multi-mcp")]
#[command(about = "Chat with a model that can call tools from several MCP servers")]
pub struct Cli {
    /// Worker configuration file (default: nearest .mcp.json)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible model service
    #[arg(long, env = "LLM_API_URL")]
    pub api_url: Option<String>,

    /// Bearer credential for the model service
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model to use
    #[arg(short, long, env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Per-worker connect timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Debug logging and full tool result previews
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            connect_timeout_secs: self.connect_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_map_to_overrides() {
        let cli = Cli::try_parse_from([
            "multi-mcp",
            "-c",
            "/tmp/workers.json",
            "--api-url",
            "http://localhost:8080/v1",
            "--connect-timeout",
            "5",
            "--debug",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/workers.json")));
        assert!(cli.debug);

        let overrides = cli.overrides();
        assert_eq!(overrides.api_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(overrides.connect_timeout_secs, Some(5));
    }

    #[test]
    fn test_rejects_non_numeric_timeout() {
        assert!(Cli::try_parse_from(["multi-mcp", "--connect-timeout", "soon"]).is_err());
    }
}
