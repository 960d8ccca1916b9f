use std::panic::AssertUnwindSafe;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures_util::FutureExt;

use multi_mcp::cli::{Cli, Repl};
use multi_mcp::config::{McpConfig, Settings, SettingsFile};
use multi_mcp::conversation::Conversation;
use multi_mcp::llm::OpenAiClient;
use multi_mcp::logging::init_tracing;
use multi_mcp::mcp::{HubOptions, RetryPolicy, SessionOptions, ToolHub};
use multi_mcp::output::{default_output, OutputWriter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.debug) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = McpConfig::load(cli.config.as_deref())
        .context("cannot start without worker configuration")?;
    let settings = Settings::resolve(cli.overrides(), SettingsFile::load()?);
    let model = OpenAiClient::new(
        &settings.api_url,
        settings.api_key.clone(),
        &settings.model,
        settings.max_tokens,
    )?;

    tracing::info!(
        "Starting {} worker(s); model {} at {}",
        config.mcp_servers.len(),
        settings.model,
        model.endpoint()
    );

    let output: Arc<dyn OutputWriter> = Arc::from(default_output(cli.debug));
    let options = HubOptions {
        connect_timeout: settings.connect_timeout,
        session: SessionOptions {
            call_timeout: settings.tool_timeout,
            retry: RetryPolicy::default(),
        },
    };

    let mut hub = ToolHub::start(&config, options).await;
    let mut conversation = Conversation::new(Arc::new(model))
        .with_system_prompt(settings.system_prompt.clone())
        .with_reply_timeout(settings.reply_timeout)
        .with_output(output.clone());

    let outcome = AssertUnwindSafe(async {
        Repl::new(&mut hub, &mut conversation, output.as_ref())
            .run()
            .await
    })
    .catch_unwind()
    .await;

    hub.shutdown().await;
    output.flush();

    match outcome {
        Ok(reason) => {
            tracing::debug!("Session ended: {:?}", reason);
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => {
            tracing::error!("Session aborted by an unexpected panic");
            Ok(ExitCode::FAILURE)
        }
    }
}
