use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcriptor",
    about = "Transcript Fetcher - Get the caption transcript of a YouTube video",
    version,
    long_about = "Extracts the video id from a YouTube URL and fetches the video's captions as a single block of text. Run it once from the command line or serve the web form and JSON API."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the web form and the JSON API
    Serve {
        /// Address to bind (overrides the config file)
        #[arg(long, env = "TRANSCRIPTOR_HOST", value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long, env = "TRANSCRIPTOR_PORT", value_name = "PORT")]
        port: Option<u16>,
    },

    /// Fetch the transcript of a single video
    Fetch {
        /// YouTube URL (watch, youtu.be, embed or shorts link)
        #[arg(value_name = "URL")]
        url: String,

        /// Caption language code (defaults to the configured language)
        #[arg(short, long, env = "TRANSCRIPTOR_LANGUAGE", value_name = "LANG")]
        language: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the video id found in a URL
    Id {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with the video id and language
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
