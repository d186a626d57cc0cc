//! CLI command definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::catalog::CatalogSource;
use crate::config::Profile;

#[derive(Parser, Debug)]
#[command(name = "haggle")]
#[command(about = "Haggle - price negotiation against a scripted seller", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Negotiate interactively on the terminal
    Play {
        #[command(flatten)]
        session: SessionArgs,

        /// Append anonymized session events as JSON lines to this file
        #[arg(long, env = "HAGGLE_EVENTS")]
        events: Option<PathBuf>,

        /// Reveal seller counters immediately
        #[arg(long)]
        no_delay: bool,
    },

    /// Run a scripted negotiation and print the outcome
    Simulate {
        #[command(flatten)]
        session: SessionArgs,

        /// Offers in order; `accept` and `decline` are allowed as tokens
        #[arg(short, long, value_delimiter = ',', required = true)]
        offer: Vec<String>,
    },

    /// List the items of a catalog
    Catalog {
        #[command(flatten)]
        source: CatalogArgs,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Named parameter profile (standard, strict, classic)
    #[arg(short, long, env = "HAGGLE_PROFILE")]
    pub profile: Option<Profile>,

    /// JSON file layered over the profile defaults
    #[arg(short, long, env = "HAGGLE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// CSV catalog URL (Google Sheets editor links are accepted)
    #[arg(long, env = "HAGGLE_CATALOG_URL", conflicts_with = "catalog_file")]
    pub catalog_url: Option<String>,

    /// CSV catalog on disk
    #[arg(long)]
    pub catalog_file: Option<PathBuf>,
}

impl CatalogArgs {
    pub fn source(&self) -> CatalogSource {
        match (&self.catalog_url, &self.catalog_file) {
            (Some(url), _) => CatalogSource::Remote(url.clone()),
            (None, Some(path)) => CatalogSource::File(path.clone()),
            (None, None) => CatalogSource::Builtin,
        }
    }

    /// Whether a catalog was asked for explicitly
    pub fn is_configured(&self) -> bool {
        self.catalog_url.is_some() || self.catalog_file.is_some()
    }
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Catalog item to negotiate over; without one the configured prices apply
    #[arg(short, long)]
    pub item: Option<String>,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Seed for reproducible sessions
    #[arg(short, long, env = "HAGGLE_SEED")]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_play() {
        let cli = Cli::try_parse_from([
            "haggle", "play", "--item", "3", "--profile", "strict", "--seed", "42", "--no-delay",
        ])
        .unwrap();

        match cli.command {
            Commands::Play {
                session, no_delay, ..
            } => {
                assert_eq!(session.item.as_deref(), Some("3"));
                assert_eq!(session.config.profile, Some(Profile::Strict));
                assert_eq!(session.seed, Some(42));
                assert!(no_delay);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_simulate_offers() {
        let cli =
            Cli::try_parse_from(["haggle", "simulate", "--offer", "3000,3500", "-o", "accept"])
                .unwrap();

        match cli.command {
            Commands::Simulate { offer, .. } => {
                assert_eq!(offer, vec!["3000", "3500", "accept"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_catalog_sources_conflict() {
        let result = Cli::try_parse_from([
            "haggle",
            "catalog",
            "--catalog-url",
            "https://example.org/items.csv",
            "--catalog-file",
            "items.csv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_profile_rejected() {
        assert!(Cli::try_parse_from(["haggle", "config", "--profile", "lenient"]).is_err());
    }
}
