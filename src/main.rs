//! Haggle CLI binary

use anyhow::Context;
use clap::Parser;
use haggle::catalog::CatalogSource;
use haggle::cli::{load_config, write_catalog, write_config, Cli, Commands, HaggleApp, TerminalPresenter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout belongs to the negotiation dialogue
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            session,
            events,
            no_delay,
        } => {
            let app = HaggleApp::from_args(&session)
                .await
                .context("Failed to prepare the negotiation")?;
            let snapshot = app
                .play(events.as_deref(), no_delay)
                .await
                .context("Interactive session failed")?;
            tracing::info!(state = %snapshot.state, "session closed");
        }

        Commands::Simulate { session, offer } => {
            let app = HaggleApp::from_args(&session)
                .await
                .context("Failed to prepare the negotiation")?;
            let mut presenter = TerminalPresenter::new(std::io::stdout());
            app.simulate(&offer, &mut presenter)
                .await
                .context("Simulation failed")?;
        }

        Commands::Catalog { source } => {
            let source: CatalogSource = source.source();
            let catalog = source
                .load()
                .await
                .with_context(|| format!("Failed to load catalog from {}", source))?;
            write_catalog(&catalog, &mut std::io::stdout().lock())
                .context("Failed to print catalog")?;
        }

        Commands::Config { config } => {
            let config = load_config(&config).context("Invalid configuration")?;
            write_config(&config, &mut std::io::stdout().lock())
                .context("Failed to print configuration")?;
        }
    }

    Ok(())
}
