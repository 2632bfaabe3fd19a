//! Aggregation pipeline: fetch every competition/season slice, normalize, merge
//!
//! Runs sequentially. A failing slice is skipped; partial results are normal.

use crate::config::AppConfig;
use crate::services::normalizer::{normalize, normalize_all};
use crate::sources::MatchSource;
use crate::types::competition;
use crate::types::{CompetitionRef, MatchCollection, MatchRecord, RawMatch};
use chrono::{Duration as DateSpan, NaiveDate, Utc};
use std::time::Duration;
use tracing::{debug, info};

/// Pipeline inputs that do not come from the competition table
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Archive season tokens, e.g. "2023-24"
    pub historical_seasons: Vec<String>,
    /// Live API season year
    pub current_season: i32,
    /// Pause between competitions (archive politeness, independent of the rate limiter)
    pub pacing: Duration,
    /// Fixtures window: today through today + N days
    pub fixture_window_days: i64,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            historical_seasons: config.archive.seasons.clone(),
            current_season: config.pipeline.current_season,
            pacing: Duration::from_millis(config.pipeline.pacing_ms),
            fixture_window_days: config.pipeline.fixture_window_days.max(0),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Inclusive fixtures window in UTC calendar dates:
/// `[today 00:00:00, today + days 23:59:59]`.
/// An end past the calendar range saturates at `NaiveDate::MAX`.
pub fn fixture_window(today: NaiveDate, days: i64) -> (NaiveDate, NaiveDate) {
    let end = DateSpan::try_days(days)
        .and_then(|span| today.checked_add_signed(span))
        .unwrap_or(NaiveDate::MAX);
    (today, end)
}

fn is_fixture_in_window(raw: &RawMatch, from: NaiveDate, to: NaiveDate) -> bool {
    let date = raw.kickoff.date();
    raw.status.is_scheduled() && date >= from && date <= to
}

/// Orchestrates fetches across the static competition table
pub struct AggregationPipeline<S> {
    source: S,
    settings: PipelineSettings,
    competitions: &'static [CompetitionRef],
}

impl<S: MatchSource> AggregationPipeline<S> {
    pub fn new(source: S, settings: PipelineSettings) -> Self {
        Self {
            source,
            settings,
            competitions: competition::all(),
        }
    }

    /// Restrict the run to a subset of the table
    pub fn with_competitions(mut self, competitions: &'static [CompetitionRef]) -> Self {
        self.competitions = competitions;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Fetch every archive season plus the live season for each competition.
    /// Never fails; an all-failing run yields an empty collection.
    pub async fn run_full_aggregation(&self) -> MatchCollection {
        let mut collection = MatchCollection::new();

        for (index, comp) in self.competitions.iter().enumerate() {
            if index > 0 && !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }

            info!("Fetching {}...", comp.name);
            let records = self.collect_competition(comp).await;
            debug!("{}: {} matches collected", comp.name, records.len());

            if !records.is_empty() {
                collection.extend(comp.name, records);
            }
        }

        info!(
            "Aggregated {} matches across {} competitions",
            collection.total_matches(),
            collection.competition_count()
        );
        collection
    }

    async fn collect_competition(&self, comp: &CompetitionRef) -> Vec<MatchRecord> {
        let mut records = Vec::new();

        for source_id in comp.archive_ids {
            for season in &self.settings.historical_seasons {
                if let Some(raws) = self.source.fetch_historical(source_id, season).await {
                    records.extend(normalize_all(&raws, comp.name));
                }
            }
        }

        if let Some(raws) = self
            .source
            .fetch_current(comp.name, self.settings.current_season)
            .await
        {
            records.extend(normalize_all(&raws, comp.name));
        }

        records
    }

    /// Scheduled fixtures from today (UTC) through the configured window
    pub async fn run_weekly_fixtures(&self) -> Vec<MatchRecord> {
        self.run_fixtures_from(Utc::now().date_naive()).await
    }

    /// Scheduled fixtures for the window starting at `today`, sorted by date.
    /// Equal dates keep competition iteration order.
    pub async fn run_fixtures_from(&self, today: NaiveDate) -> Vec<MatchRecord> {
        let (from, to) = fixture_window(today, self.settings.fixture_window_days);
        info!("Fetching upcoming matches: {} to {}", from, to);

        let mut fixtures = Vec::new();
        for comp in self.competitions {
            if let Some(raws) = self.source.fetch_upcoming(comp.name, from, to).await {
                fixtures.extend(
                    raws.iter()
                        .filter(|raw| is_fixture_in_window(raw, from, to))
                        .map(|raw| normalize(raw, comp.name)),
                );
            }
        }

        // sort_by_key is stable
        fixtures.sort_by_key(|record| record.date);

        info!("Total upcoming matches: {}", fixtures.len());
        fixtures
    }
}
