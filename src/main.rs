use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_fetcher::cli::{Cli, Commands};
use transcript_fetcher::config::Config;
use transcript_fetcher::output::{self, FetchedTranscript};
use transcript_fetcher::transcribe::YoutubeProvider;
use transcript_fetcher::{extract_video_id, fetch_transcript, server, TranscriptorError};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "transcript_fetcher=debug,transcriptor=debug,tower_http=debug"
    } else {
        "transcript_fetcher=info,transcriptor=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = Config::load().await?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;

            let provider = Arc::new(YoutubeProvider::new(&config.provider)?);
            server::serve(&config, provider).await?;
        }
        Commands::Fetch {
            url,
            language,
            format,
            output,
        } => {
            let video_id = extract_video_id(&url).ok_or(TranscriptorError::ExtractionFailure)?;
            let language = language.unwrap_or(config.transcript.default_language);
            let provider = YoutubeProvider::new(&config.provider)?;

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                let progress = ProgressBar::new_spinner();
                progress.set_style(
                    ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
                );
                progress.enable_steady_tick(Duration::from_millis(100));
                progress
            };
            progress.set_message(format!("Fetching {} transcript for {}...", language, video_id));

            let result = fetch_transcript(&provider, &video_id, &language).await;
            progress.finish_and_clear();

            let transcript = match result {
                Ok(transcript) => transcript,
                Err(err) => {
                    eprintln!("{}", style(err).red());
                    std::process::exit(1);
                }
            };

            let fetched = FetchedTranscript::new(video_id, language, transcript);
            match output {
                Some(path) => {
                    output::save_to_file(&fetched, &path, &format).await?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&fetched, &format)?;
                }
            }
        }
        Commands::Id { url } => {
            let video_id = extract_video_id(&url).ok_or(TranscriptorError::ExtractionFailure)?;
            println!("{}", video_id);
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::config_path()?;
                if path.exists() {
                    anyhow::bail!("Configuration file already exists: {}", path.display());
                }
                Config::default().save_to(&path)?;
                println!("Default configuration written to: {}", path.display());
            } else if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Use --show to print it or --init to write the defaults");
            }
        }
    }

    Ok(())
}
