use crate::agent::{AgentDeps, IterationLoop, LoopSettings};
use crate::attachments::{AttachmentSource, HttpRasterizer, NoAttachments};
use crate::canvas::Position;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::llm::{AdapterKind, AdapterSettings, Credentials, create_adapter, resolve_api_key};
use crate::observability::create_observer;
use crate::parser::{Dialect, Extractor, ParseResult};
use crate::prompt::{PromptBuilder, PromptLibrary};
use crate::training::{self, Rule};
use crate::transport::{CanvasTransport, MemoryTransport, WebSocketTransport};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Overrides given on the `run` command line.
#[derive(Debug, Default)]
struct RunOverrides {
    adapter: Option<AdapterKind>,
    model: Option<String>,
    server: Option<String>,
    interval: Option<u64>,
    exercise: Option<String>,
}

impl RunOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(adapter) = self.adapter {
            config.adapter = adapter;
        }
        if self.model.is_some() {
            config.model = self.model;
        }
        if let Some(server) = self.server {
            config.canvas.server_url = server;
        }
        if let Some(interval) = self.interval {
            config.agent.interval_secs = interval;
        }
        if let Some(exercise) = self.exercise {
            config.training.enabled = true;
            config.training.exercise = exercise;
        }
    }
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run {
            adapter,
            model,
            server,
            interval,
            exercise,
            offline,
        } => {
            let mut config = config;
            RunOverrides {
                adapter,
                model,
                server,
                interval,
                exercise,
            }
            .apply(&mut config);
            config.validate()?;
            run_agent(config, offline).await
        }
        Commands::Parse { file, dialect } => parse_file(&file, dialect),
        Commands::Exercises => {
            print!("{}", render_exercises());
            Ok(())
        }
    }
}

/// Wire the collaborators from config and run one agent until it stops.
async fn run_agent(config: Config, offline: bool) -> Result<()> {
    let adapter = create_adapter(
        config.adapter,
        &AdapterSettings {
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: config.base_url.clone(),
        },
    );
    let api_key = resolve_api_key(config.adapter, config.api_key.as_deref());
    if api_key.is_none() && config.adapter != AdapterKind::Ollama {
        tracing::warn!(adapter = %config.adapter, "no API key configured; requests will likely fail");
    }
    let credentials = Credentials::new(api_key.as_deref());

    let library = match config.prompts.fragments_path.as_deref() {
        Some(path) => PromptLibrary::load(path)?,
        None => PromptLibrary::builtin(),
    };
    let prompts = PromptBuilder::new(library)?;

    let transport: Arc<dyn CanvasTransport> = if offline {
        info!("painting an in-process canvas");
        Arc::new(MemoryTransport::new(Position::default()))
    } else {
        let heartbeat = Duration::from_secs(config.canvas.heartbeat_secs);
        Arc::new(
            WebSocketTransport::connect(&config.canvas.server_url, heartbeat)
                .await
                .context("Failed to join the canvas")?,
        )
    };

    let attachments: Arc<dyn AttachmentSource> = match config.attachments.rasterizer_url.as_deref()
    {
        Some(url) => Arc::new(HttpRasterizer::new(url)),
        None => Arc::new(NoAttachments),
    };
    let observer = Arc::from(create_observer(&config.observability));

    let agent = IterationLoop::new(
        AgentDeps {
            adapter,
            credentials,
            transport,
            attachments,
            observer,
            prompts,
        },
        LoopSettings::from_config(&config),
    );

    let handle = agent.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            handle.stop();
        }
    });

    let summary = agent.run().await;
    println!(
        "Stopped: {} ({} iterations painted, {} pixels)",
        summary.reason, summary.completed, summary.painted
    );
    Ok(())
}

#[derive(Serialize)]
struct ParseReport<'a> {
    strategy: Option<String>,
    commands: &'a [crate::canvas::PixelCommand],
    narrative: &'a crate::parser::Narrative,
}

fn parse_file(path: &Path, dialect: Dialect) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let result = Extractor::new(dialect).extract(&raw, &mut rand::rng());
    println!("{}", render_parse(&result)?);
    if result.is_empty() {
        bail!("no pixel commands found in {}", path.display());
    }
    Ok(())
}

fn render_parse(result: &ParseResult) -> Result<String> {
    let report = ParseReport {
        strategy: result.strategy().map(|s| s.to_string()),
        commands: result.commands(),
        narrative: result.narrative(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn render_exercises() -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for spec in training::all() {
        let kind = if matches!(spec.rule, Rule::Open) {
            "free"
        } else {
            "checked"
        };
        let first_line = spec.prompt.lines().next().unwrap_or_default();
        let _ = writeln!(out, "{:<4} {:<8} {}", spec.id, kind, first_line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelCommand;
    use crate::color::HexColor;
    use tempfile::TempDir;

    #[test]
    fn overrides_enable_training() {
        let mut config = Config::default();
        RunOverrides {
            adapter: Some(AdapterKind::Gemini),
            interval: Some(45),
            exercise: Some("A3".into()),
            ..RunOverrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.adapter, AdapterKind::Gemini);
        assert_eq!(config.agent.interval_secs, 45);
        assert!(config.training.enabled);
        assert_eq!(config.training.exercise, "A3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_report_lists_commands() {
        let result = ParseResult::Commands {
            commands: vec![PixelCommand::new(1, 2, HexColor::from_rgb(255, 0, 0))],
            narrative: crate::parser::Narrative::default(),
            strategy: crate::parser::Strategy::Keyword,
        };
        let json: serde_json::Value = serde_json::from_str(&render_parse(&result).unwrap()).unwrap();
        assert_eq!(json["strategy"], "keyword");
        assert_eq!(json["commands"][0]["color"], "#ff0000");
    }

    #[test]
    fn parse_file_fails_on_empty_reply() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reply.txt");
        std::fs::write(&path, "I would paint a sunset.").unwrap();
        assert!(parse_file(&path, Dialect::Text).is_err());

        std::fs::write(&path, "pixels: 1,1#ffffff").unwrap();
        assert!(parse_file(&path, Dialect::Text).is_ok());
    }

    #[test]
    fn exercise_listing_covers_the_programme() {
        let listing = render_exercises();
        assert_eq!(listing.lines().count(), training::all().len());
        assert!(listing.starts_with("A1"));
    }
}
