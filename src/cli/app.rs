//! Haggle application wiring configuration, catalog, engine and terminal

use std::io::Write;
use std::path::Path;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};

use crate::catalog::{Catalog, CatalogItem};
use crate::config::{NegotiationConfig, ThinkDelay};
use crate::error::{HaggleError, Result};
use crate::events::{ChannelSink, EventSink, NullSink};
use crate::negotiation::{
    Decision, NegotiationEngine, NegotiationState, Presenter, RandomStreams, SeededRandom,
    SessionSnapshot,
};

use super::commands::{CatalogArgs, ConfigArgs, SessionArgs};
use super::render::{format_amount, TerminalPresenter};

const MAX_LINE_LENGTH: usize = 256;

/// One line of participant input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Offer(String),
    Decide(Decision),
    Quit,
}

impl Command {
    /// An empty line takes the seller's standing offer
    pub fn parse(line: &str) -> Self {
        match line.trim().to_lowercase().as_str() {
            "" | "accept" | "a" | "yes" | "y" | "ja" | "j" => Command::Decide(Decision::Accept),
            "decline" | "d" | "no" | "n" | "nein" => Command::Decide(Decision::Decline),
            "quit" | "q" | "exit" => Command::Quit,
            _ => Command::Offer(line.trim().to_string()),
        }
    }
}

/// A decoded input line, or the marker for one that exceeded the limit
#[derive(Clone, Debug, PartialEq, Eq)]
enum InputLine {
    Line(String),
    TooLong,
}

/// `LinesCodec` that reports overlong lines as items.
///
/// `FramedRead` ends the stream after any decoder error. Surfacing the
/// overflow as an item keeps the session alive while the inner codec
/// discards the rest of the offending line.
struct InputCodec {
    lines: LinesCodec,
}

impl InputCodec {
    fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }

    fn wrap(
        result: std::result::Result<Option<String>, LinesCodecError>,
    ) -> std::result::Result<Option<InputLine>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(InputLine::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(InputLine::TooLong)),
            Err(e) => Err(e),
        }
    }
}

impl Decoder for InputCodec {
    type Item = InputLine;
    type Error = LinesCodecError;

    fn decode(
        &mut self,
        buf: &mut BytesMut,
    ) -> std::result::Result<Option<InputLine>, LinesCodecError> {
        Self::wrap(self.lines.decode(buf))
    }

    fn decode_eof(
        &mut self,
        buf: &mut BytesMut,
    ) -> std::result::Result<Option<InputLine>, LinesCodecError> {
        Self::wrap(self.lines.decode_eof(buf))
    }
}

fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes" | "j" | "ja")
}

/// Options for one run of the input loop
#[derive(Clone, Debug, Default)]
pub struct PlayOptions {
    /// Pause before revealing each seller counter
    pub think_delay: Option<ThinkDelay>,
    /// Offer a fresh session once one finishes
    pub offer_restart: bool,
}

/// Resolve the effective configuration: profile defaults, then the JSON
/// file, then `HAGGLE_*` environment overrides.
pub fn load_config(args: &ConfigArgs) -> Result<NegotiationConfig> {
    let profile = args.profile.unwrap_or_default();
    let mut config = match &args.config {
        Some(path) => NegotiationConfig::from_json_file_over(path, profile)?,
        None => NegotiationConfig::for_profile(profile),
    };

    if let Some(requested) = args.profile {
        if config.profile != requested {
            return Err(HaggleError::InvalidConfig(format!(
                "--profile {} conflicts with profile {} named in the config file",
                requested, config.profile
            )));
        }
    }

    config.apply_env_overrides()?;
    config.validate()?;
    tracing::debug!(profile = %config.profile, "configuration resolved");
    Ok(config)
}

/// Load the catalog and pick the requested item.
///
/// Without an item id the first item of an explicitly configured catalog
/// is used; with neither, sessions run on the configured prices.
pub async fn resolve_item(
    catalog: &CatalogArgs,
    item_id: Option<&str>,
) -> Result<Option<CatalogItem>> {
    if item_id.is_none() && !catalog.is_configured() {
        return Ok(None);
    }

    let loaded = catalog.source().load().await?;
    let item = match item_id {
        Some(id) => loaded.find(id)?.clone(),
        None => loaded
            .items()
            .first()
            .cloned()
            .ok_or_else(|| HaggleError::CatalogParse("catalog has no items".to_string()))?,
    };
    Ok(Some(item))
}

/// Main Haggle application
pub struct HaggleApp {
    config: NegotiationConfig,
    item: Option<CatalogItem>,
    seed: Option<u64>,
}

impl HaggleApp {
    pub fn new(config: NegotiationConfig, item: Option<CatalogItem>, seed: Option<u64>) -> Self {
        Self { config, item, seed }
    }

    pub async fn from_args(args: &SessionArgs) -> Result<Self> {
        let config = load_config(&args.config)?;
        let item = resolve_item(&args.catalog, args.item.as_deref()).await?;
        Ok(Self::new(config, item, args.seed))
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    pub fn item(&self) -> Option<&CatalogItem> {
        self.item.as_ref()
    }

    fn streams(&self) -> RandomStreams {
        match self.seed {
            Some(seed) => RandomStreams::from_seed(seed),
            None => RandomStreams::from_entropy(),
        }
    }

    fn delay_rng(&self) -> SeededRandom {
        match self.seed {
            Some(seed) => SeededRandom::derive(seed, "delay"),
            None => SeededRandom::from_entropy(),
        }
    }

    /// Create an engine for a fresh session
    pub fn engine(&self, sink: Box<dyn EventSink>) -> Result<NegotiationEngine> {
        let engine =
            NegotiationEngine::start(self.config.clone(), self.item(), self.streams(), sink)?;
        if let Some(seed) = engine.seed() {
            tracing::info!(seed, "session seed");
        }
        Ok(engine)
    }

    /// Drive `engine` from line-based `input` until the participant quits or
    /// the input ends. Returns the last snapshot.
    pub async fn run<R, W>(
        &self,
        engine: &mut NegotiationEngine,
        input: R,
        presenter: &mut TerminalPresenter<W>,
        options: &PlayOptions,
    ) -> Result<SessionSnapshot>
    where
        R: AsyncRead + Unpin,
        W: Write,
    {
        let mut lines = FramedRead::new(input, InputCodec::new());
        let mut delay_rng = self.delay_rng();
        let mut snapshot = engine.snapshot();
        presenter.intro(&snapshot);

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(InputLine::Line(line)) => line,
                Ok(InputLine::TooLong) => {
                    presenter.message("! Input too long, please enter an amount.");
                    continue;
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => continue,
                Err(LinesCodecError::Io(e)) => return Err(e.into()),
            };

            if engine.session().is_finished() {
                if options.offer_restart && is_yes(&line) {
                    snapshot = engine.restart(self.item());
                    presenter.intro(&snapshot);
                    continue;
                }
                break;
            }

            let countered = match Command::parse(&line) {
                Command::Quit => {
                    presenter.message("Left the negotiation.");
                    break;
                }
                Command::Decide(decision) => {
                    snapshot = engine.decide(decision);
                    false
                }
                Command::Offer(raw) => {
                    snapshot = engine.submit_offer(&raw);
                    snapshot.rejection().is_none() && snapshot.state.is_active()
                }
            };

            if countered {
                if let Some(delay) = &options.think_delay {
                    tokio::time::sleep(delay.sample(&mut delay_rng)).await;
                }
            }
            presenter.present(&snapshot);

            if snapshot.is_finished() {
                if !options.offer_restart {
                    break;
                }
                presenter.prompt_restart();
            }
        }

        Ok(snapshot)
    }

    /// Interactive session on stdin/stdout
    pub async fn play(&self, events: Option<&Path>, no_delay: bool) -> Result<SessionSnapshot> {
        let (sink, writer) = match events {
            Some(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                let (sink, handle) = ChannelSink::spawn_json_writer(file);
                tracing::info!(path = %path.display(), "writing session events");
                (Box::new(sink) as Box<dyn EventSink>, Some(handle))
            }
            None => (Box::new(NullSink) as Box<dyn EventSink>, None),
        };

        let mut engine = self.engine(sink)?;
        let options = PlayOptions {
            think_delay: (!no_delay).then(|| self.config.think_delay.clone()),
            offer_restart: true,
        };
        let mut presenter = TerminalPresenter::new(std::io::stdout());
        let snapshot = self
            .run(&mut engine, tokio::io::stdin(), &mut presenter, &options)
            .await?;

        // closing the channel lets the writer drain and exit
        drop(engine);
        if let Some(handle) = writer {
            handle
                .await
                .map_err(|e| HaggleError::SinkDelivery(e.to_string()))?;
        }
        Ok(snapshot)
    }

    /// Scripted session: each token is one line of input
    pub async fn simulate<W: Write>(
        &self,
        offers: &[String],
        presenter: &mut TerminalPresenter<W>,
    ) -> Result<SessionSnapshot> {
        let mut engine = self.engine(Box::new(NullSink))?;
        let mut script = offers.join("\n");
        script.push('\n');

        let snapshot = self
            .run(&mut engine, script.as_bytes(), presenter, &PlayOptions::default())
            .await?;

        if !snapshot.is_finished() {
            presenter.message(match snapshot.state {
                NegotiationState::AwaitingFinalDecision => {
                    "Script ended while the final offer was pending."
                }
                _ => "Script ended with the negotiation still open.",
            });
            presenter.summary(&snapshot);
        }
        Ok(snapshot)
    }
}

/// Print every catalog item on `out`
pub fn write_catalog<W: Write>(catalog: &Catalog, out: &mut W) -> Result<()> {
    let id_width = catalog
        .items()
        .iter()
        .map(|i| i.id.chars().count())
        .max()
        .unwrap_or(2)
        .max(2);
    writeln!(out, "{:<id_width$}  {:>10}  {:>10}  Label", "ID", "Opening", "Floor", id_width = id_width)?;
    for item in catalog.items() {
        writeln!(
            out,
            "{:<id_width$}  {:>10}  {:>10}  {}",
            item.id,
            format_amount(item.initial_offer),
            format_amount(item.min_price),
            item.label,
            id_width = id_width
        )?;
    }
    Ok(())
}

/// Print the effective configuration as pretty JSON on `out`
pub fn write_config<W: Write>(config: &NegotiationConfig, out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, config)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use crate::events::MemorySink;
    use std::io::Write as _;

    fn app(profile: Profile) -> HaggleApp {
        let mut config = NegotiationConfig::for_profile(profile);
        config.rounds.min = 8;
        config.rounds.max = 8;
        config.scale_factors = vec![1.0];
        HaggleApp::new(config, None, Some(7))
    }

    fn output(presenter: TerminalPresenter<Vec<u8>>) -> String {
        String::from_utf8(presenter.into_inner()).unwrap()
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse(""), Command::Decide(Decision::Accept));
        assert_eq!(Command::parse(" Accept "), Command::Decide(Decision::Accept));
        assert_eq!(Command::parse("nein"), Command::Decide(Decision::Decline));
        assert_eq!(Command::parse("q"), Command::Quit);
        assert_eq!(Command::parse(" 4200 "), Command::Offer("4200".to_string()));
    }

    #[tokio::test]
    async fn test_run_accepts_on_empty_line() {
        let app = app(Profile::Standard);
        let mut engine = app.engine(Box::new(NullSink)).unwrap();
        let mut presenter = TerminalPresenter::new(Vec::new());

        let snapshot = app
            .run(&mut engine, &b"3000\n\n"[..], &mut presenter, &PlayOptions::default())
            .await
            .unwrap();

        assert_eq!(snapshot.state, NegotiationState::Accepted);
        assert_eq!(snapshot.deal_price, Some(5000));
        let out = output(presenter);
        assert!(out.contains("Deal reached at 5000 €."));
        assert!(out.contains("History:"));
    }

    #[tokio::test]
    async fn test_run_reports_rejections_and_continues() {
        let app = app(Profile::Standard);
        let mut engine = app.engine(Box::new(NullSink)).unwrap();
        let mut presenter = TerminalPresenter::new(Vec::new());

        let snapshot = app
            .run(&mut engine, &b"abc\n3000\nquit\n"[..], &mut presenter, &PlayOptions::default())
            .await
            .unwrap();

        assert_eq!(snapshot.state, NegotiationState::Negotiating);
        assert_eq!(snapshot.round, 2);
        let out = output(presenter);
        assert!(out.contains("! Invalid offer"));
        assert!(out.contains("Left the negotiation."));
    }

    #[tokio::test]
    async fn test_run_survives_overlong_line() {
        let app = app(Profile::Standard);
        let mut engine = app.engine(Box::new(NullSink)).unwrap();
        let mut presenter = TerminalPresenter::new(Vec::new());

        let mut input = "9".repeat(MAX_LINE_LENGTH + 44);
        input.push_str("\n3000\nquit\n");
        let snapshot = app
            .run(&mut engine, input.as_bytes(), &mut presenter, &PlayOptions::default())
            .await
            .unwrap();

        assert_eq!(snapshot.round, 2);
        assert_eq!(engine.session().history().len(), 1);
        let out = output(presenter);
        assert!(out.contains("! Input too long"));
        assert!(out.contains("Left the negotiation."));
    }

    #[test]
    fn test_input_codec_discards_overflow() {
        let mut codec = InputCodec::new();
        let mut buf = BytesMut::from(format!("{}\n42\n", "x".repeat(300)).as_str());

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(InputLine::TooLong));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(InputLine::Line("42".to_string()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[tokio::test]
    async fn test_run_restarts_after_finish() {
        let app = app(Profile::Standard);
        let sink = MemorySink::new();
        let mut engine = app.engine(Box::new(sink.clone())).unwrap();
        let first = engine.session().participant_id().clone();
        let mut presenter = TerminalPresenter::new(Vec::new());
        let options = PlayOptions {
            think_delay: None,
            offer_restart: true,
        };

        let snapshot = app
            .run(&mut engine, &b"5400\ny\n3000\n"[..], &mut presenter, &options)
            .await
            .unwrap();

        assert_ne!(snapshot.participant_id, first);
        assert_eq!(snapshot.round, 2);
        assert!(output(presenter).contains("Start a new negotiation?"));
        assert!(sink.events().iter().any(|e| e.participant_id == first && e.finished));
    }

    #[tokio::test(start_paused = true)]
    async fn test_think_delay_applies_to_counters() {
        let app = app(Profile::Standard);
        let mut engine = app.engine(Box::new(NullSink)).unwrap();
        let mut presenter = TerminalPresenter::new(Vec::new());
        let options = PlayOptions {
            think_delay: Some(app.config().think_delay.clone()),
            offer_restart: false,
        };

        let started = tokio::time::Instant::now();
        app.run(&mut engine, &b"3000\n"[..], &mut presenter, &options)
            .await
            .unwrap();
        let waited = started.elapsed();

        assert!(waited >= std::time::Duration::from_millis(700));
        assert!(waited <= std::time::Duration::from_millis(1100));
    }

    #[tokio::test]
    async fn test_simulate_to_final_decision() {
        let app = app(Profile::Classic);
        let offers: Vec<String> = (0..8).map(|i| (2000 + i * 50).to_string()).collect();
        let mut presenter = TerminalPresenter::new(Vec::new());

        let snapshot = app.simulate(&offers, &mut presenter).await.unwrap();
        assert_eq!(snapshot.state, NegotiationState::AwaitingFinalDecision);
        assert!(output(presenter).contains("final offer was pending"));

        let mut declined = offers.clone();
        declined.push("decline".to_string());
        let mut presenter = TerminalPresenter::new(Vec::new());
        let snapshot = app.simulate(&declined, &mut presenter).await.unwrap();
        assert_eq!(snapshot.state, NegotiationState::Declined);
        assert!(output(presenter).contains("No deal."));
    }

    #[test]
    fn test_load_config_layers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "profile": "strict", "initial_offer": 6100 }}"#).unwrap();

        let args = ConfigArgs {
            profile: None,
            config: Some(file.path().to_path_buf()),
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.profile, Profile::Strict);
        assert_eq!(config.initial_offer, 6100);

        let conflicting = ConfigArgs {
            profile: Some(Profile::Classic),
            config: Some(file.path().to_path_buf()),
        };
        assert!(matches!(
            load_config(&conflicting),
            Err(HaggleError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_item() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ID,Startpreis,Schmerzgrenze,Fahrzeug\n7,6000,4400,Polo\n8,3000,2200,Roller").unwrap();

        let catalog = CatalogArgs {
            catalog_url: None,
            catalog_file: Some(file.path().to_path_buf()),
        };
        let first = resolve_item(&catalog, None).await.unwrap().unwrap();
        assert_eq!(first.id, "7");
        let chosen = resolve_item(&catalog, Some("8")).await.unwrap().unwrap();
        assert_eq!(chosen.label, "Roller");
        assert!(matches!(
            resolve_item(&catalog, Some("9")).await,
            Err(HaggleError::ItemNotFound(_))
        ));

        let none = CatalogArgs {
            catalog_url: None,
            catalog_file: None,
        };
        assert_eq!(resolve_item(&none, None).await.unwrap(), None);
    }

    #[test]
    fn test_write_catalog_and_config() {
        let mut out = Vec::new();
        write_catalog(&Catalog::builtin(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("ID"));
        assert!(text.contains("Compact hatchback"));

        let mut out = Vec::new();
        write_config(&NegotiationConfig::default(), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["profile"], "standard");
    }
}
