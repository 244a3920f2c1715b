use std::io::IsTerminal;
use std::sync::OnceLock;

use anyhow::{Result, bail};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber. Filter comes from `RUST_LOG`, default `info`.
/// Logs go to stderr so the session summary on stdout stays clean.
pub fn init_tracing() -> Result<()> {
    if INITIALISED.set(()).is_err() {
        bail!("tracing already initialised");
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}
