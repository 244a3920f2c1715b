mod app;
mod cli;
mod participant;
mod telemetry;

use app::App;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing()?;
    let args = cli::Args::parse();
    let app = App::new(args)?;
    app.run().await?;

    Ok(())
}
