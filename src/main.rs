use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_transcriber::cli::{Cli, Commands, OutputFormat};
use video_transcriber::config::Config;
use video_transcriber::server::{self, AppState};
use video_transcriber::{output, TranscriptionPipeline};

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "video_transcriber=debug"
    } else {
        "video_transcriber=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::load(cli.config.as_deref()).await?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let state = AppState::init(&config)?;

            tracing::info!(
                bucket = %config.google.bucket_name,
                max_concurrent_requests = config.server.max_concurrent_requests,
                max_chars_per_line = config.app.max_chars_per_line,
                "Starting transcription endpoint"
            );

            server::run(state, &config.listen_addr()).await?;
        }
        Commands::Transcribe {
            gcs_path,
            output,
            format,
            max_chars,
        } => {
            let config = Config::load(cli.config.as_deref()).await?;
            let pipeline = TranscriptionPipeline::new(&config)?;
            let video = pipeline.resolve(&gcs_path);

            tracing::info!("Starting transcription for: {}", video);

            let result = pipeline.transcribe(&video, max_chars).await?;
            let format = format.unwrap_or_else(|| {
                OutputFormat::from_str(&config.app.default_output_format, true)
                    .unwrap_or(OutputFormat::Text)
            });

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format).await?;
                    println!("Transcription saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, &format)?;
                }
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save(cli.config.as_deref()).await?;
                println!("Configuration written to: {}", path.display());
            } else {
                let config = Config::load(cli.config.as_deref()).await?;
                if show {
                    config.display();
                } else {
                    println!("Configuration file: {}", Config::config_path()?.display());
                    println!("Use --show to print the effective configuration or --init to write defaults.");
                }
            }
        }
    }

    Ok(())
}
