use crate::llm::AdapterKind;
use crate::parser::Dialect;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `poietic-agent` - autonomous painting agent for a shared pixel canvas.
#[derive(Parser, Debug)]
#[command(name = "poietic-agent")]
#[command(version)]
#[command(about = "Paint a shared pixel canvas with a generative model.", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the canvas and paint until stopped
    Run {
        /// Backend to use (anthropic, openai, gemini, ollama)
        #[arg(short, long)]
        adapter: Option<AdapterKind>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,

        /// Canvas WebSocket URL
        #[arg(long)]
        server: Option<String>,

        /// Seconds between iteration starts
        #[arg(short, long)]
        interval: Option<u64>,

        /// Run in training mode starting at this exercise (e.g. A1)
        #[arg(long)]
        exercise: Option<String>,

        /// Paint an in-process canvas instead of connecting to a server
        #[arg(long)]
        offline: bool,
    },

    /// Parse a saved model reply and print the extracted commands as JSON
    Parse {
        /// File holding the raw reply
        file: PathBuf,

        /// Reply dialect (text, json)
        #[arg(short, long, default_value = "text")]
        dialect: Dialect,
    },

    /// List the training exercises
    Exercises,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "poietic-agent",
            "run",
            "--adapter",
            "llava",
            "--interval",
            "30",
            "--exercise",
            "a2",
            "--offline",
        ])
        .unwrap();
        let Commands::Run {
            adapter,
            interval,
            exercise,
            offline,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(adapter, Some(AdapterKind::Ollama));
        assert_eq!(interval, Some(30));
        assert_eq!(exercise.as_deref(), Some("a2"));
        assert!(offline);
    }

    #[test]
    fn parse_defaults_to_text_dialect() {
        let cli = Cli::try_parse_from(["poietic-agent", "-v", "parse", "reply.txt"]).unwrap();
        assert!(cli.verbose);
        let Commands::Parse { dialect, file } = cli.command else {
            panic!("expected parse");
        };
        assert_eq!(dialect, Dialect::Text);
        assert_eq!(file, PathBuf::from("reply.txt"));
    }

    #[test]
    fn unknown_adapter_is_rejected() {
        assert!(Cli::try_parse_from(["poietic-agent", "run", "--adapter", "nope"]).is_err());
    }
}
