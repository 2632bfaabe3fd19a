//! Historical archive client (static JSON documents, no rate limit)
//!
//! Documents live at `{base}/{season}/{league}.json`, e.g.
//! `2023-24/en.1.json`.

use crate::types::competition;
use crate::types::{MatchStatus, MatchfeedError, RawMatch, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::{debug, warn};

/// Archive document. Current files carry a flat `matches` array,
/// older ones nest matches under `rounds`.
#[derive(Deserialize)]
struct ArchiveDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    matches: Vec<ArchiveMatch>,
    #[serde(default)]
    rounds: Vec<ArchiveRound>,
}

#[derive(Deserialize)]
struct ArchiveRound {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    matches: Vec<ArchiveMatch>,
}

#[derive(Deserialize)]
struct ArchiveMatch {
    #[serde(default)]
    round: Option<String>,
    date: String,
    #[serde(default)]
    time: Option<String>,
    team1: ArchiveTeam,
    team2: ArchiveTeam,
    #[serde(default)]
    score: Option<ArchiveScore>,
    // Legacy layout
    #[serde(default)]
    score1: Option<u32>,
    #[serde(default)]
    score2: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArchiveTeam {
    Name(String),
    Detailed { name: String },
}

impl ArchiveTeam {
    fn into_name(self) -> String {
        match self {
            ArchiveTeam::Name(name) | ArchiveTeam::Detailed { name } => name,
        }
    }
}

#[derive(Deserialize)]
struct ArchiveScore {
    #[serde(default)]
    ft: Option<Vec<u32>>,
}

impl ArchiveMatch {
    fn full_time(&self) -> (Option<u32>, Option<u32>) {
        match self.score.as_ref().and_then(|s| s.ft.as_deref()) {
            Some([home, away]) => (Some(*home), Some(*away)),
            _ => (self.score1, self.score2),
        }
    }

    fn into_raw(self, season: &str, round_name: Option<&str>) -> Option<RawMatch> {
        let date = match NaiveDate::parse_from_str(&self.date, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                warn!("Invalid archive date '{}', skipping entry", self.date);
                return None;
            }
        };
        // "20:00" or "20:00 UTC+1"; unknown kick-off falls back to midnight
        let time = self
            .time
            .as_deref()
            .and_then(|t| t.split_whitespace().next())
            .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
            .unwrap_or_default();

        let (home_goals, away_goals) = self.full_time();
        let status = if home_goals.is_some() && away_goals.is_some() {
            MatchStatus::Finished
        } else {
            MatchStatus::Scheduled
        };

        Some(RawMatch {
            kickoff: date.and_time(time),
            home_team: self.team1.into_name(),
            away_team: self.team2.into_name(),
            home_goals,
            away_goals,
            status,
            round: self.round.or_else(|| round_name.map(String::from)),
            season: Some(season.to_string()),
        })
    }
}

/// Parse an archive document in place (simd-json mutates the buffer)
pub fn parse_archive_document(bytes: &mut [u8], season: &str) -> Result<Vec<RawMatch>> {
    let doc: ArchiveDocument =
        simd_json::from_slice(bytes).map_err(|e| MatchfeedError::Parse(e.to_string()))?;

    if let Some(name) = &doc.name {
        debug!("Parsing archive document '{}'", name);
    }

    let mut matches: Vec<RawMatch> = doc
        .matches
        .into_iter()
        .filter_map(|m| m.into_raw(season, None))
        .collect();

    for round in doc.rounds {
        let round_name = round.name;
        matches.extend(
            round
                .matches
                .into_iter()
                .filter_map(|m| m.into_raw(season, round_name.as_deref())),
        );
    }

    Ok(matches)
}

/// Client for the historical archive
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    base_url: String,
    http: reqwest::Client,
}

impl ArchiveClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn document_url(&self, source_id: &str, season: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, season, source_id)
    }

    /// Fetch one (league, season) document. `None` when the id is not in the
    /// competition table (no request made) or when the fetch fails.
    pub async fn fetch(&self, source_id: &str, season: &str) -> Option<Vec<RawMatch>> {
        if competition::by_archive_id(source_id).is_none() {
            warn!("{} is not a known archive source", source_id);
            return None;
        }

        let url = self.document_url(source_id, season);
        match self.fetch_document(&url, season).await {
            Ok(matches) => {
                debug!("{} {}: {} matches", source_id, season, matches.len());
                Some(matches)
            }
            Err(e) => {
                warn!("Error fetching data for {} in {}: {}", source_id, season, e);
                None
            }
        }
    }

    async fn fetch_document(&self, url: &str, season: &str) -> Result<Vec<RawMatch>> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatchfeedError::Http(format!("{} returned {}", url, status)));
        }

        let mut body = response.bytes().await?.to_vec();
        parse_archive_document(&mut body, season)
    }
}
