//! Tracing setup
//!
//! Logs go to stderr so they never interleave with replies on stdout.
//! `RUST_LOG` refines the filter; `LOG_FORMAT=json` switches to structured
//! output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crate-level directive applied on top of `RUST_LOG`
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "multi_mcp=debug"
    } else {
        "multi_mcp=info"
    }
}

/// Whether `LOG_FORMAT` asks for JSON lines
pub fn json_requested(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("json"))
}

/// Install the global subscriber. Call once, from the binary.
pub fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(default_directive(debug).parse()?);
    let use_json = json_requested(std::env::var("LOG_FORMAT").ok().as_deref());

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()?;
    }

    Ok(())
}
