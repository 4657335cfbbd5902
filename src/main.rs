use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use price_sheet_tracker::config::{AppConfig, LocaleFormat};
use price_sheet_tracker::models::{PriceEntry, PriceSchedule};
use price_sheet_tracker::pdf::PdfTableParser;
use price_sheet_tracker::pdf::cells::format_price;
use price_sheet_tracker::utils::Timer;
use price_sheet_tracker::{PriceError, PriceService};

#[derive(Parser)]
#[command(name = "price-sheet-tracker", about = "Monthly price sheet scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Download the current price sheet and print every month
    Fetch {
        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the prices for the current month
    Current,

    /// Print the price sheet download link
    Link,

    /// Parse a local price sheet PDF
    Parse {
        /// Path to the PDF file
        file: PathBuf,

        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "price_sheet_tracker=info,warn",
        1 => "price_sheet_tracker=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    let outcome = run(cli.command, &config, &cancel).await;
    match outcome {
        Err(e) if e.downcast_ref::<PriceError>().is_some_and(PriceError::is_cancelled) => {
            println!("Cancelled, no result.");
            Ok(())
        }
        other => other,
    }
}

async fn run(command: Command, config: &AppConfig, cancel: &CancellationToken) -> Result<()> {
    match command {
        Command::Fetch { json } => {
            let _t = Timer::start("Price sheet retrieval");
            let service = PriceService::new(config)?;
            let schedule = service.get_price_schedule(cancel).await?;
            print_schedule(&schedule, &config.locale, json)?;
        }

        Command::Current => {
            let service = PriceService::new(config)?;
            let now = Utc::now();
            match service.get_current_entry(now, cancel).await? {
                Some(entry) => {
                    print_header();
                    print_entry(&entry, &config.locale);
                }
                None => println!("No prices listed for {}.", now.format("%Y-%m")),
            }
        }

        Command::Link => {
            let service = PriceService::new(config)?;
            match service.find_pdf_link(cancel).await? {
                Some(url) => println!("{url}"),
                None => println!("No price sheet link found."),
            }
        }

        Command::Parse { file, json } => {
            let _t = Timer::start(format!("Parsing {}", file.display()));
            config.validate_parsing()?;
            let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let parser = PdfTableParser::new(config.parsing, config.locale);
            let schedule = parser
                .parse_pdf(&bytes)
                .map_err(|e| e.with_document(&file.display().to_string()))?;
            info!("{:?}: {} entries", file, schedule.entries.len());
            print_schedule(&schedule, &config.locale, json)?;
        }
    }

    Ok(())
}

fn print_schedule(schedule: &PriceSchedule, locale: &LocaleFormat, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(schedule)?);
        return Ok(());
    }
    print_header();
    for entry in &schedule.entries {
        print_entry(entry, locale);
    }
    println!("─────────────────────────────────");
    println!("  Retrieved {}", schedule.retrieved_at.format("%Y-%m-%d %H:%M UTC"));
    Ok(())
}

fn print_header() {
    println!("─────────────────────────────────");
    println!("  Month     Gross       Net");
    println!("─────────────────────────────────");
}

fn print_entry(entry: &PriceEntry, locale: &LocaleFormat) {
    println!(
        "  {}   {:>9}   {:>9}",
        entry.month_of.format("%Y-%m"),
        format_price(entry.gross_price_ct_per_unit, locale),
        format_price(entry.net_price_ct_per_unit, locale),
    );
}
