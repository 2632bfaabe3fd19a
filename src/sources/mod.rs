//! Match sources: historical archive and live API

mod archive;
mod live;

pub use archive::{parse_archive_document, ArchiveClient};
pub use live::{parse_live_matches, LiveApiClient};

use crate::config::AppConfig;
use crate::services::rate_limiter::RateLimiter;
use crate::types::{MatchfeedError, RawMatch, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Best-effort access to raw match data.
///
/// `None` means NotFound: the identifier did not resolve (no request is
/// made) or the fetch failed and was logged.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// One archive document, keyed by archive id (e.g. "en.1") and season
    /// token (e.g. "2023-24")
    async fn fetch_historical(&self, source_id: &str, season: &str) -> Option<Vec<RawMatch>>;

    /// Live season for a competition identifier, rate limited
    async fn fetch_current(&self, competition: &str, season_year: i32) -> Option<Vec<RawMatch>>;

    /// Scheduled matches dated within `[from, to]`, rate limited
    async fn fetch_upcoming(
        &self,
        competition: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Option<Vec<RawMatch>>;
}

/// Production source combining the archive and the live API
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    archive: ArchiveClient,
    live: LiveApiClient,
}

impl SourceFetcher {
    pub fn new(archive: ArchiveClient, live: LiveApiClient) -> Self {
        Self { archive, live }
    }

    /// Build both clients over one shared HTTP client
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.api.timeout())
            .build()
            .map_err(|e| MatchfeedError::Http(format!("HTTP client error: {}", e)))?;

        let limiter = Arc::new(RateLimiter::per_minute(config.api.requests_per_minute));
        let archive = ArchiveClient::new(config.archive.base_url.clone(), http.clone());
        let live = LiveApiClient::new(
            config.api.base_url.clone(),
            config.api.key.clone(),
            http,
            limiter,
        );
        Ok(Self::new(archive, live))
    }

    pub fn live(&self) -> &LiveApiClient {
        &self.live
    }
}

#[async_trait]
impl MatchSource for SourceFetcher {
    async fn fetch_historical(&self, source_id: &str, season: &str) -> Option<Vec<RawMatch>> {
        self.archive.fetch(source_id, season).await
    }

    async fn fetch_current(&self, competition: &str, season_year: i32) -> Option<Vec<RawMatch>> {
        self.live.fetch_current(competition, season_year).await
    }

    async fn fetch_upcoming(
        &self,
        competition: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Option<Vec<RawMatch>> {
        self.live.fetch_upcoming(competition, from, to).await
    }
}

#[async_trait]
impl<S: MatchSource + ?Sized> MatchSource for Arc<S> {
    async fn fetch_historical(&self, source_id: &str, season: &str) -> Option<Vec<RawMatch>> {
        (**self).fetch_historical(source_id, season).await
    }

    async fn fetch_current(&self, competition: &str, season_year: i32) -> Option<Vec<RawMatch>> {
        (**self).fetch_current(competition, season_year).await
    }

    async fn fetch_upcoming(
        &self,
        competition: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Option<Vec<RawMatch>> {
        (**self).fetch_upcoming(competition, from, to).await
    }
}
