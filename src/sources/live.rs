//! Live football API client
//!
//! Every outbound call first takes a slot from the shared [`RateLimiter`].
//! Failures are logged and reported as `None`.

use crate::services::rate_limiter::RateLimiter;
use crate::types::competition;
use crate::types::{CompetitionRef, MatchStatus, MatchfeedError, RawMatch, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Placeholder for knockout slots whose team is not decided yet
const TBD_TEAM: &str = "TBD";

#[derive(Deserialize)]
struct LiveMatchesResponse {
    #[serde(default)]
    matches: Vec<LiveMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveMatch {
    utc_date: DateTime<Utc>,
    #[serde(default)]
    matchday: Option<u32>,
    home_team: LiveTeam,
    away_team: LiveTeam,
    score: LiveScore,
    status: MatchStatus,
    #[serde(default)]
    season: Option<LiveSeason>,
}

#[derive(Deserialize)]
struct LiveTeam {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveScore {
    full_time: LiveGoals,
}

#[derive(Deserialize)]
struct LiveGoals {
    home: Option<u32>,
    away: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveSeason {
    #[serde(default)]
    start_date: Option<NaiveDate>,
}

impl From<LiveMatch> for RawMatch {
    fn from(m: LiveMatch) -> Self {
        RawMatch {
            kickoff: m.utc_date.naive_utc(),
            home_team: m.home_team.name.unwrap_or_else(|| TBD_TEAM.to_string()),
            away_team: m.away_team.name.unwrap_or_else(|| TBD_TEAM.to_string()),
            home_goals: m.score.full_time.home,
            away_goals: m.score.full_time.away,
            status: m.status,
            round: m.matchday.map(|d| format!("Matchday {}", d)),
            season: m
                .season
                .and_then(|s| s.start_date)
                .map(|d| d.format("%Y").to_string()),
        }
    }
}

/// Parse a `/competitions/{code}/matches` response body
pub fn parse_live_matches(body: &[u8]) -> Result<Vec<RawMatch>> {
    let response: LiveMatchesResponse =
        serde_json::from_slice(body).map_err(|e| MatchfeedError::Parse(e.to_string()))?;
    Ok(response.matches.into_iter().map(RawMatch::from).collect())
}

/// Client for the rate-limited live API
#[derive(Debug, Clone)]
pub struct LiveApiClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl LiveApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http: reqwest::Client,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
            limiter,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// All matches of `competition` for the season starting in `season_year`
    pub async fn fetch_current(&self, competition: &str, season_year: i32) -> Option<Vec<RawMatch>> {
        let comp = self.resolve(competition)?;
        let query = [("season", season_year.to_string())];
        self.fetch_matches(comp, &query).await
    }

    /// Scheduled matches of `competition` dated within `[from, to]` inclusive
    pub async fn fetch_upcoming(
        &self,
        competition: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Option<Vec<RawMatch>> {
        let comp = self.resolve(competition)?;
        let query = [
            ("dateFrom", from.format("%Y-%m-%d").to_string()),
            ("dateTo", to.format("%Y-%m-%d").to_string()),
        ];
        let matches = self.fetch_matches(comp, &query).await?;

        let upcoming: Vec<RawMatch> = matches
            .into_iter()
            .filter(|m| {
                let date = m.kickoff.date();
                m.status.is_scheduled() && date >= from && date <= to
            })
            .collect();
        info!("{}: Found {} upcoming matches", comp.name, upcoming.len());
        Some(upcoming)
    }

    /// Standings table as returned by the API (not normalized)
    pub async fn fetch_standings(&self, competition: &str) -> Option<serde_json::Value> {
        let comp = self.resolve(competition)?;
        let path = format!("/competitions/{}/standings", comp.api_code);

        let result = match self.get(&path, &[]).await {
            Ok(body) => serde_json::from_slice(&body).map_err(|e| MatchfeedError::Parse(e.to_string())),
            Err(e) => Err(e),
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Error fetching standings for {}: {}", comp.name, e);
                None
            }
        }
    }

    fn resolve(&self, competition: &str) -> Option<&'static CompetitionRef> {
        let comp = competition::resolve(competition);
        if comp.is_none() {
            info!("{} not available in the live API", competition);
        }
        comp
    }

    async fn fetch_matches(
        &self,
        comp: &CompetitionRef,
        query: &[(&str, String)],
    ) -> Option<Vec<RawMatch>> {
        let path = format!("/competitions/{}/matches", comp.api_code);
        let result = match self.get(&path, query).await {
            Ok(body) => parse_live_matches(&body),
            Err(e) => Err(e),
        };
        match result {
            Ok(matches) => {
                debug!("{}: {} matches from live API", comp.name, matches.len());
                Some(matches)
            }
            Err(e) => {
                warn!("Error fetching {}: {}", comp.name, e);
                None
            }
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        self.limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).header("X-Auth-Token", &self.api_key);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatchfeedError::Http(format!("{} returned {}", url, status)));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
