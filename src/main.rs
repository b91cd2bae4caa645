use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sentinelai::config::{LoggingConfig, SentinelConfig};
use sentinelai::detect::{Explanation, ModelDetection};
use sentinelai::model::train::{self, TrainOptions};
use sentinelai::storage::EventQuery;

#[derive(Parser)]
#[command(
    name = "sentinelai",
    about = "Per-source traffic anomaly detection for HTTP services",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server (request logging + detection endpoints)
    Serve {
        /// Bind address, overrides the config file
        #[arg(long)]
        bind: Option<String>,
    },

    /// Fit a scoring artifact from all stored traffic
    Train {
        /// Output path, overrides the config file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run rate detection over the last lookback window and record alerts
    Detect,

    /// Classify every window in the stored history with the scoring artifact
    MlDetect,

    /// Explain each window the scoring artifact flags
    Explain,

    /// List recorded traffic events
    Logs {
        /// Only events from this source address
        #[arg(long)]
        ip: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List recorded alerts
    Alerts {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Record a single traffic event
    Ingest {
        /// Source address
        #[arg(long)]
        ip: String,

        /// Request path
        #[arg(long, default_value = "/")]
        path: String,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = SentinelConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting SentinelAI");
            sentinelai::serve(&config).await?;
        }
        Commands::Train { output } => {
            let engine = sentinelai::open_engine(&config)?;
            let output = output.unwrap_or_else(|| config.model.artifact_path.clone());
            let artifact = train::train_from_store(
                engine.store().as_ref(),
                engine.rule(),
                &TrainOptions::default(),
            )?;
            artifact.save(&output)?;
            println!(
                "Model {} trained on {} windows and saved to {}",
                artifact.version,
                artifact.samples,
                output.display()
            );
        }
        Commands::Detect => {
            let engine = sentinelai::open_engine(&config)?;
            let flagged = engine.rate_detect()?;
            if flagged.is_empty() {
                println!("No suspicious sources in the last {}s.", config.detection.lookback_secs);
            } else {
                println!("Suspicious sources:");
                for ip in flagged {
                    println!(" - {}", ip);
                }
            }
        }
        Commands::MlDetect => {
            let engine = sentinelai::open_engine(&config)?;
            match engine.model_detect()? {
                ModelDetection::NoLogs => println!("No logs available."),
                ModelDetection::Windows(verdicts) => {
                    println!("{:<40} | {:<20} | {:>6} | Anomaly", "IP", "Window", "Count");
                    println!("{:-<40}-|-{:-<20}-|-{:-<6}-|-{:-<7}", "", "", "", "");
                    for v in verdicts {
                        println!(
                            "{:<40} | {:<20} | {:>6} | {}",
                            v.identity,
                            v.window_start.format("%Y-%m-%d %H:%M"),
                            v.count,
                            if v.is_anomaly { "YES" } else { "no" }
                        );
                    }
                }
            }
        }
        Commands::Explain => {
            let engine = sentinelai::open_engine(&config)?;
            match engine.explain_detect()? {
                Explanation::NoTraffic => println!("No traffic data."),
                Explanation::NoAttacks => println!("No attacks detected."),
                Explanation::Attacks(windows) => {
                    for w in windows {
                        println!("[{}] {}", w.window_start.format("%Y-%m-%d %H:%M"), w.explanation);
                    }
                }
            }
        }
        Commands::Logs { ip, json } => {
            let engine = sentinelai::open_engine(&config)?;
            let query = EventQuery {
                identity: ip,
                ..EventQuery::default()
            };
            let events = engine.list_events(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No traffic recorded.");
            } else {
                for e in events {
                    println!("{} {:<40} {}", e.timestamp.to_rfc3339(), e.identity, e.path);
                }
            }
        }
        Commands::Alerts { json } => {
            let engine = sentinelai::open_engine(&config)?;
            let alerts = engine.list_alerts()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&alerts)?);
            } else if alerts.is_empty() {
                println!("No alerts recorded.");
            } else {
                for a in alerts {
                    println!("{} {:<40} {}", a.timestamp.to_rfc3339(), a.identity, a.reason);
                }
            }
        }
        Commands::Ingest { ip, path } => {
            let engine = sentinelai::open_engine(&config)?;
            engine
                .ingest(&ip, &path, chrono::Utc::now())
                .context("failed to record event")?;
            println!("Recorded {} {}", ip, path);
        }
    }

    Ok(())
}
