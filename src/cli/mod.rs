use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use matchfeed::config::AppConfig;
use matchfeed::services::prediction::DEFAULT_FORM_WINDOW;
use matchfeed::services::{
    AggregationPipeline, Freshness, FreshnessCache, PipelineSettings, PredictionClient,
    ServiceSupervisor, SupervisorConfig,
};
use matchfeed::sources::{MatchSource, SourceFetcher};
use matchfeed::types::competition;
use matchfeed::types::{CacheManifest, MatchRecord, MatchfeedError};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Football match aggregator with a daily cache and prediction-service supervision
#[derive(Parser)]
#[command(name = "matchfeed")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./matchfeed.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the prediction service, warm the cache, run until Ctrl+C (default)
    Serve,

    /// Fetch all competitions into the cache
    Refresh {
        /// Ignore today's manifest and fetch again
        #[arg(long)]
        force: bool,
    },

    /// Show cache status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show scheduled fixtures for the next few days
    Fixtures {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the live standings table of a competition
    Standings {
        /// Competition name or code, e.g. "Serie A" or "SA"
        competition: String,
    },

    /// Ask the prediction service about one fixture
    Predict {
        home: String,
        away: String,
        /// Number of recent matches used for form
        #[arg(long, default_value_t = DEFAULT_FORM_WINDOW)]
        window: u32,
    },

    /// List teams known to the prediction service
    Teams,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = AppConfig::load(self.config.as_deref()).context("Failed to load config")?;

        match self.command {
            None | Some(Commands::Serve) => serve(&config).await,
            Some(Commands::Refresh { force }) => refresh(&config, force).await,
            Some(Commands::Status { json }) => status(&config, json),
            Some(Commands::Fixtures { json }) => fixtures(&config, json).await,
            Some(Commands::Standings { competition }) => standings(&config, &competition).await,
            Some(Commands::Predict { home, away, window }) => {
                let client = PredictionClient::from_config(&config.prediction)?;
                let prediction = client.predict(&home, &away, window).await?;
                println!("{}", serde_json::to_string_pretty(&prediction)?);
                Ok(())
            }
            Some(Commands::Teams) => {
                let client = PredictionClient::from_config(&config.prediction)?;
                let teams = client.teams().await?;
                for team in &teams.teams {
                    println!("{}", team);
                }
                Ok(())
            }
        }
    }
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<AggregationPipeline<SourceFetcher>> {
    let source = SourceFetcher::from_config(config)?;
    Ok(AggregationPipeline::new(
        source,
        PipelineSettings::from_config(config),
    ))
}

async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    let cache = FreshnessCache::from_config(&config.cache)?;
    let supervisor = ServiceSupervisor::new(SupervisorConfig::from_config(&config.prediction));

    // Without the subprocess the cache is still worth warming
    if let Err(e) = supervisor.start().await {
        error!("{}", e);
    }

    let startup = supervisor.await_ready_after(
        warm_cache(&cache, &pipeline),
        config.prediction.max_attempts,
        Duration::from_millis(config.prediction.interval_ms),
    );

    tokio::select! {
        ready = startup => {
            if !ready {
                warn!("Prediction service not ready; continuing without it");
            }
            info!("matchfeed is running. Press Ctrl+C to stop.");
            shutdown_signal().await;
        }
        _ = shutdown_signal() => {
            info!("Shutdown requested during startup");
        }
    }

    supervisor.stop().await;
    info!("Shutdown complete");
    Ok(())
}

async fn warm_cache<S: MatchSource>(cache: &FreshnessCache, pipeline: &AggregationPipeline<S>) {
    let (freshness, warning) = cache.get_or_refresh(pipeline).await;
    if let Some(warning) = warning {
        warn!("{}", warning);
    }
    match freshness {
        Freshness::Hit(manifest) => info!(
            "Cache hit: {} matches from {}",
            manifest.total_matches, manifest.last_fetch_date
        ),
        Freshness::Refreshed(collection) => info!(
            "Cache refreshed: {} matches across {} competitions",
            collection.total_matches(),
            collection.competition_count()
        ),
    }
}

async fn refresh(config: &AppConfig, force: bool) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    let cache = FreshnessCache::from_config(&config.cache)?;

    let (freshness, warning) = if force {
        let (collection, warning) = cache.refresh(&pipeline).await;
        (Freshness::Refreshed(collection), warning)
    } else {
        cache.get_or_refresh(&pipeline).await
    };

    if let Some(warning) = &warning {
        warn!("{}", warning);
    }
    match freshness {
        Freshness::Hit(manifest) => println!(
            "Cache already fresh for {} ({} matches)",
            manifest.last_fetch_date, manifest.total_matches
        ),
        Freshness::Refreshed(collection) => {
            for (competition, records) in collection.competitions() {
                println!("{:<20} {:>6}", competition, records.len());
            }
            println!("{:<20} {:>6}", "Total", collection.total_matches());
        }
    }
    Ok(())
}

fn status(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let cache = FreshnessCache::from_config(&config.cache)?;
    let (manifest, warning) = cache.read_manifest();
    if let Some(warning) = warning {
        warn!("{}", warning);
    }

    let today = Utc::now().date_naive();
    if json {
        let value = serde_json::json!({
            "cacheDir": cache.cache_dir(),
            "fresh": manifest.as_ref().is_some_and(|m| m.is_fresh_for(today)),
            "manifest": manifest,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Cache: {}", cache.cache_dir().display());
        println!("{}", format_status(manifest.as_ref(), today));
    }
    Ok(())
}

async fn fixtures(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    let fixtures = pipeline.run_weekly_fixtures().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&fixtures)?);
    } else if fixtures.is_empty() {
        println!("No scheduled fixtures");
    } else {
        for fixture in &fixtures {
            println!("{}", format_fixture(fixture));
        }
    }
    Ok(())
}

async fn standings(config: &AppConfig, competition: &str) -> anyhow::Result<()> {
    let comp = competition::resolve(competition)
        .ok_or_else(|| MatchfeedError::UnknownCompetition(competition.to_string()))?;

    let source = SourceFetcher::from_config(config)?;
    match source.live().fetch_standings(comp.name).await {
        Some(table) => {
            println!("{}", serde_json::to_string_pretty(&table)?);
            Ok(())
        }
        None => anyhow::bail!("No standings available for {}", comp.name),
    }
}

fn format_fixture(record: &MatchRecord) -> String {
    format!(
        "{}  {:<18} {} vs {}",
        record.date, record.competition, record.home_team, record.away_team
    )
}

fn format_status(manifest: Option<&CacheManifest>, today: NaiveDate) -> String {
    match manifest {
        None => "No cached data".to_string(),
        Some(m) => format!(
            "Last fetch: {} ({})\nMatches: {}\nUpdated: {}",
            m.last_fetch_date,
            if m.is_fresh_for(today) { "fresh" } else { "stale" },
            m.total_matches,
            m.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
