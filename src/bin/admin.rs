//! CLI administration tool for clickstream.
//!
//! Manages the ads catalogue, inspects analytics and the click stream, and
//! performs database checks without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Create an ad (prompts for missing fields)
//! cargo run --bin admin -- ads create
//!
//! # List ads
//! cargo run --bin admin -- ads list --page 1 --limit 20
//!
//! # Top ads by clicks over the last hour
//! cargo run --bin admin -- analytics top --window 1h --limit 10
//!
//! # Stream length and pending entries
//! cargo run --bin admin -- stream info
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! Same as the server: `DATABASE_URL` (or `DB_*`), `REDIS_URL` (or `REDIS_*`),
//! `CLICKS_STREAM`, `CONSUMER_GROUP`.

use clickstream::application::services::AdService;
use clickstream::config::{Config, mask_connection_string};
use clickstream::domain::entities::{AggregateQuery, NewAd};
use clickstream::domain::repositories::AnalyticsRepository;
use clickstream::infrastructure::messaging::{connect, stream_info};
use clickstream::infrastructure::persistence::{PgAdRepository, PgAnalyticsRepository};
use clickstream::utils::duration::parse_duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// CLI tool for managing clickstream.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage the ads catalogue
    Ads {
        #[command(subcommand)]
        action: AdsAction,
    },

    /// Inspect click analytics
    Analytics {
        #[command(subcommand)]
        action: AnalyticsAction,
    },

    /// Inspect the click stream
    Stream {
        #[command(subcommand)]
        action: StreamAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum AdsAction {
    /// Create a new ad
    Create {
        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        image_url: Option<String>,

        #[arg(short = 'u', long)]
        target_url: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List ads, newest first
    List {
        #[arg(short, long, default_value_t = 1)]
        page: i64,

        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum AnalyticsAction {
    /// Ads with the most clicks in a recent window
    Top {
        /// Window ending now, e.g. `15m`, `1h`, `24h`
        #[arg(short, long, default_value = "1h")]
        window: String,

        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum StreamAction {
    /// Show stream length and pending entries of the consumer group
    Info,
}

#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Ads { action } => handle_ads_action(action, &connect_db(&config).await?).await?,
        Commands::Analytics { action } => {
            handle_analytics_action(action, &connect_db(&config).await?).await?
        }
        Commands::Stream { action } => handle_stream_action(action, &config).await?,
        Commands::Db { action } => handle_db_action(action, &connect_db(&config).await?).await?,
    }

    Ok(())
}

async fn connect_db(config: &Config) -> Result<PgPool> {
    PgPool::connect(&config.database_url)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to database {}",
                mask_connection_string(&config.database_url)
            )
        })
}

async fn handle_ads_action(action: AdsAction, pool: &PgPool) -> Result<()> {
    let service = AdService::new(Arc::new(PgAdRepository::new(Arc::new(pool.clone()))));

    match action {
        AdsAction::Create {
            title,
            image_url,
            target_url,
            yes,
        } => create_ad(&service, title, image_url, target_url, yes).await,
        AdsAction::List { page, limit } => list_ads(&service, page, limit).await,
    }
}

fn prompt_or(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::new().with_prompt(prompt).interact_text()?),
    }
}

/// Creates an ad, prompting for every field not given as a flag.
async fn create_ad(
    service: &AdService<PgAdRepository>,
    title: Option<String>,
    image_url: Option<String>,
    target_url: Option<String>,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🎬 Create Ad".bright_blue().bold());
    println!();

    let new_ad = NewAd {
        title: prompt_or(title, "Title")?,
        image_url: prompt_or(image_url, "Image URL")?,
        target_url: prompt_or(target_url, "Target URL")?,
    };

    println!();
    println!("  Title:      {}", new_ad.title.cyan());
    println!("  Image URL:  {}", new_ad.image_url.bright_black());
    println!("  Target URL: {}", new_ad.target_url.bright_black());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Create this ad?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let ad = service
        .create_ad(new_ad)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create ad: {}", e))?;

    println!(
        "{} {}",
        "✅ Ad created with id".green().bold(),
        ad.id.to_string().bright_white().bold()
    );

    Ok(())
}

async fn list_ads(service: &AdService<PgAdRepository>, page: i64, limit: i64) -> Result<()> {
    println!("{}", "📋 Ads".bright_blue().bold());
    println!();

    let (ads, total) = service
        .list_ads(page.max(1), limit.clamp(1, 100))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list ads: {}", e))?;

    if ads.is_empty() {
        println!("{}", "  No ads found".yellow());
        return Ok(());
    }

    println!(
        "  {:<6} {:<30} {:<10} {:<20}",
        "ID".bright_white().bold(),
        "Title".bright_white().bold(),
        "Status".bright_white().bold(),
        "Created".bright_white().bold()
    );
    println!("  {}", "─".repeat(70).bright_black());

    for ad in &ads {
        let status = if ad.status == "active" {
            ad.status.green()
        } else {
            ad.status.yellow()
        };

        println!(
            "  {:<6} {:<30} {:<10} {}",
            ad.id.to_string().bright_black(),
            ad.title.cyan(),
            status,
            ad.created_at
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .bright_black()
        );
    }

    println!();
    println!("  Total: {}", total.to_string().bright_white().bold());
    println!();

    Ok(())
}

async fn handle_analytics_action(action: AnalyticsAction, pool: &PgPool) -> Result<()> {
    match action {
        AnalyticsAction::Top { window, limit } => {
            let window = parse_duration(&window)?;
            let repo = PgAnalyticsRepository::new(Arc::new(pool.clone()));

            let rows = repo
                .aggregate_clicks(AggregateQuery {
                    ad_id: None,
                    since: Some(Utc::now() - window),
                    until: None,
                    limit: limit.clamp(1, 1000),
                    offset: 0,
                })
                .await
                .map_err(|e| anyhow::anyhow!("Aggregation failed: {}", e))?;

            println!("{}", "📊 Top ads".bright_blue().bold());
            println!();

            if rows.is_empty() {
                println!("{}", "  No clicks in this window".yellow());
                return Ok(());
            }

            println!(
                "  {:<6} {:>8} {:>8} {:>10} {:>8}",
                "Ad".bright_white().bold(),
                "Clicks".bright_white().bold(),
                "Unique".bright_white().bold(),
                "Playback".bright_white().bold(),
                "Watched".bright_white().bold()
            );
            println!("  {}", "─".repeat(46).bright_black());

            for row in &rows {
                println!(
                    "  {:<6} {:>8} {:>8} {:>9.1}s {:>7.1}%",
                    row.ad_id.to_string().cyan(),
                    row.click_count.to_string().bright_green().bold(),
                    row.unique_clicks,
                    row.avg_playback_time,
                    row.avg_watch_percent
                );
            }
            println!();
        }
    }

    Ok(())
}

async fn handle_stream_action(action: StreamAction, config: &Config) -> Result<()> {
    match action {
        StreamAction::Info => {
            println!("{}", "📨 Click stream".bright_blue().bold());
            println!();

            let mut conn = connect(&config.redis_url, Duration::from_secs(5)).await?;
            let info = stream_info(&mut conn, &config.clicks_stream, &config.consumer_group).await?;

            println!("  Stream:  {}", config.clicks_stream.cyan());
            println!("  Length:  {}", info.length.to_string().bright_green().bold());
            match info.pending {
                Some(pending) => println!(
                    "  Pending: {} (group {})",
                    pending.to_string().bright_yellow().bold(),
                    config.consumer_group.cyan()
                ),
                None => println!(
                    "  Pending: {}",
                    format!("group {} does not exist", config.consumer_group).yellow()
                ),
            }
            println!();
        }
    }

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            let ads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads")
                .fetch_one(pool)
                .await?;
            let clicks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clicks")
                .fetch_one(pool)
                .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!("  Ads:        {}", ads.to_string().bright_green().bold());
            println!("  Clicks:     {}", clicks.to_string().bright_green().bold());
            println!();
        }
    }

    Ok(())
}
