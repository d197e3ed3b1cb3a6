//! HealthScore CLI
//!
//! Command-line driver for the check-in core:
//! - Check the cadence and submit check-ins
//! - View the unwell-day calendar and symptom trends
//! - Chat with the assistant
//! - Ask for a one-off analysis of a medical image

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use healthscore::chat::{ChatError, ImagePayload};
use healthscore::config::{generate_default_config, LoggingConfig};
use healthscore::storage::{rating_description, SymptomRating, DEFAULT_SYMPTOMS};
use healthscore::{AppContext, CadenceError, CadenceStatus, Config};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "healthscore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Health check-ins, symptom history and an AI assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory, overriding the config file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show whether a check-in is available
    Status,

    /// Submit a check-in
    CheckIn {
        /// Ratings as name=value (1-10); omitted symptoms default to 5
        ratings: Vec<String>,
    },

    /// Reset the survey cycle
    Reset {
        /// End the current cooldown instead of starting over
        #[arg(long, conflicts_with = "all")]
        skip_cooldown: bool,
        /// Delete all stored health data
        #[arg(long)]
        all: bool,
    },

    /// Show unwell days for a month
    Calendar {
        /// Month as YYYY-MM (default: current month)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Show the weekly trend for a symptom
    Trend {
        /// Symptom name
        #[arg(short, long, default_value = "Overall Health")]
        symptom: String,
    },

    /// Send a message to the assistant
    Chat {
        /// Message text
        message: String,
        /// Image to attach
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Describe a single medical image (not added to the chat)
    Analyze {
        /// Image file
        image: PathBuf,
        /// Question to ask about the image
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// List past check-ins
    History,

    /// Print the check-in countdown until interrupted
    Watch,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_deref());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.to_string_lossy().to_string();
    }

    init_logging(&config.logging);

    let ctx = AppContext::open(config)
        .await
        .context("failed to open health data store")?;

    let result = run(&ctx, cli.command).await;
    ctx.shutdown();
    result
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("healthscore={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn run(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Status => {
            print_status(&ctx.cadence.status().await);
        }

        Commands::CheckIn { ratings } => {
            let symptoms = parse_ratings(&ratings)?;
            match ctx.cadence.submit(symptoms).await {
                Ok(record) => {
                    println!(
                        "Recorded {} check-in at {}",
                        if record.is_morning { "morning" } else { "evening" },
                        record.timestamp.format("%Y-%m-%d %H:%M UTC")
                    );
                    for s in &record.symptoms {
                        println!("  {:<16} {:>2}  {}", s.name, s.rating, s.description());
                    }
                    println!();
                    print_status(&ctx.cadence.status().await);
                }
                Err(e @ CadenceError::NotAvailable { .. }) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Reset { skip_cooldown, all } => {
            if all {
                ctx.repo.clear_all().await?;
                println!("All health data deleted.");
            }
            let status = if skip_cooldown {
                ctx.cadence.skip_cooldown().await?
            } else {
                ctx.cadence.reset().await?
            };
            print_status(&status);
        }

        Commands::Calendar { month } => {
            let (year, month) = parse_month(month.as_deref())?;
            let marking = ctx.history().calendar().await;
            let summary = marking.month_summary(year, month);

            println!("{}-{:02}", year, month);
            for date in marking
                .dates()
                .filter(|d| d.year() == year && d.month() == month)
            {
                if let Some(mark) = marking.get(date) {
                    println!("  {}  unwell ({})", date, mark.source);
                }
            }
            println!("{}", summary);
        }

        Commands::Trend { symptom } => {
            let series = ctx.history().trend(&symptom).await;

            println!("{} (last {} check-ins)", series.symptom, series.points.len());
            for point in &series.points {
                println!(
                    "  {}  {:>2}  {}",
                    point.label,
                    point.rating,
                    "#".repeat(point.rating as usize)
                );
            }
            match series.weekly_average {
                Some(avg) => println!("Weekly average: {:.1}", avg),
                None => println!("Weekly average: -"),
            }
            println!("Trend: {}", series.trend);
        }

        Commands::Chat { message, image } => {
            let mut session = ctx.chat_session().await?;

            let image = match image {
                Some(path) => Some(load_image(&path).await?),
                None => None,
            };

            match session.send(&message, image).await {
                Ok(reply) => {
                    println!("{}", reply.text());
                    for (i, option) in reply.suggestions.iter().enumerate() {
                        println!("  [{}] {}", i + 1, option);
                    }
                }
                Err(e) if e.is_input_error() => return Err(e.into()),
                Err(e) => {
                    tracing::error!(error = %e, "Chat failed");
                    println!("{}", e.apology());
                    std::process::exit(1);
                }
            }
        }

        Commands::Analyze { image, prompt } => {
            let analyzer = ctx.image_analyzer()?;
            let image = load_image(&image).await?;

            match analyzer.analyze_image(&image, prompt.as_deref()).await {
                Ok(analysis) => println!("{}", analysis),
                Err(e) => {
                    tracing::error!(error = %e, "Image analysis failed");
                    println!("Failed to analyze image. Please try again.");
                    std::process::exit(1);
                }
            }
        }

        Commands::History => {
            let history = ctx.repo.survey_history().await;
            if history.is_empty() {
                println!("No check-ins yet.");
                println!();
                println!("Submit your first check-in with:");
                println!("  healthscore check-in \"Overall Health=7\" Mood=6");
            }
            for record in history {
                let average = record
                    .average_rating()
                    .map(|a| format!("{:.1}", a))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<7}  avg {}",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    if record.is_morning { "morning" } else { "evening" },
                    average
                );
            }
        }

        Commands::Watch => {
            let mut rx = ctx
                .cadence
                .start_ticker(ctx.config.cadence.tick_interval())
                .await;
            print_status(&rx.borrow());

            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = rx.borrow().clone();
                        match status.remaining {
                            Some(remaining) => println!("{}  {}", status.headline(), remaining.hhmmss()),
                            None => println!("{}", status.headline()),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        break;
                    }
                }
            }
        }

        Commands::Config { output } => {
            write_default_config(output.as_deref())?;
        }
    }

    Ok(())
}

fn print_status(status: &CadenceStatus) {
    println!("{}", status.headline());
    println!("{}", status.prompt());
    println!("  policy: {}  stage: {}", status.policy, status.stage);
}

/// Parse `name=value` pairs over the default questionnaire
fn parse_ratings(args: &[String]) -> Result<Vec<SymptomRating>> {
    let mut symptoms = SymptomRating::defaults();

    for arg in args {
        let Some((name, value)) = arg.split_once('=') else {
            bail!("expected name=value, got {:?}", arg);
        };
        let name = name.trim();
        let rating: u8 = value
            .trim()
            .parse()
            .with_context(|| format!("invalid rating for {}: {:?}", name, value))?;

        match symptoms
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.rating = rating,
            None => symptoms.push(SymptomRating::new(name, rating)),
        }
    }

    if args.is_empty() {
        println!("No ratings given, using defaults:");
        for name in DEFAULT_SYMPTOMS {
            println!("  {} = 5 ({})", name, rating_description(5));
        }
    }

    Ok(symptoms)
}

fn parse_month(month: Option<&str>) -> Result<(i32, u32)> {
    let Some(month) = month else {
        let today = Utc::now().date_naive();
        return Ok((today.year(), today.month()));
    };

    let date = NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
        .with_context(|| format!("invalid month {:?}, expected YYYY-MM", month))?;
    Ok((date.year(), date.month()))
}

async fn load_image(path: &Path) -> Result<ImagePayload> {
    match ImagePayload::from_path(path).await {
        Ok(image) => Ok(image),
        Err(ChatError::PermissionDenied(path)) => {
            bail!("Permission denied reading {:?}; allow access to attach images", path)
        }
        Err(e) => Err(e.into()),
    }
}

fn write_default_config(output: Option<&Path>) -> Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {:?}", path))?;
            println!("Wrote default config to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}
