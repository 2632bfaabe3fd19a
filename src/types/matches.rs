//! Match types shared by sources, pipeline and cache

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Literal stored in place of a score for matches without a full-time result
pub const UNSCHEDULED_SENTINEL: &str = "SCHEDULED";

/// Match status as reported by the live API.
/// Archive entries are mapped to `Finished` or `Scheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Timed,
    InPlay,
    Paused,
    Finished,
    Suspended,
    Postponed,
    Cancelled,
    Awarded,
    #[serde(other)]
    Unknown,
}

impl MatchStatus {
    /// Not yet played and still on the calendar
    pub fn is_scheduled(self) -> bool {
        matches!(self, MatchStatus::Scheduled | MatchStatus::Timed)
    }
}

/// Source-specific match as parsed from an archive document or API response.
/// Only lives until normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    /// Kick-off; UTC for live data, archive-local for historical data
    pub kickoff: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
    pub status: MatchStatus,
    /// Round or matchday label, when the source has one
    pub round: Option<String>,
    /// Season label in the source's own dialect
    pub season: Option<String>,
}

/// Full-time score, or the unscheduled sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScoreRepr", into = "ScoreRepr")]
pub enum Score {
    Final { home: u32, away: u32 },
    Unscheduled,
}

impl Score {
    /// Build from a nullable goal pair; both halves must be present
    pub fn from_goals(home: Option<u32>, away: Option<u32>) -> Self {
        match (home, away) {
            (Some(home), Some(away)) => Score::Final { home, away },
            _ => Score::Unscheduled,
        }
    }

    pub fn outcome(self) -> Outcome {
        match self {
            Score::Final { home, away } if home > away => Outcome::HomeWin,
            Score::Final { home, away } if home < away => Outcome::AwayWin,
            Score::Final { .. } => Outcome::Draw,
            Score::Unscheduled => Outcome::Undecided,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Final { home, away } => write!(f, "{}-{}", home, away),
            Score::Unscheduled => write!(f, "-"),
        }
    }
}

/// Wire form: `[home, away]` or `"SCHEDULED"`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ScoreRepr {
    Goals([u32; 2]),
    Sentinel(String),
}

impl TryFrom<ScoreRepr> for Score {
    type Error = String;

    fn try_from(repr: ScoreRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ScoreRepr::Goals([home, away]) => Ok(Score::Final { home, away }),
            ScoreRepr::Sentinel(s) if s == UNSCHEDULED_SENTINEL => Ok(Score::Unscheduled),
            ScoreRepr::Sentinel(s) => Err(format!("unexpected score literal '{}'", s)),
        }
    }
}

impl From<Score> for ScoreRepr {
    fn from(score: Score) -> Self {
        match score {
            Score::Final { home, away } => ScoreRepr::Goals([home, away]),
            Score::Unscheduled => ScoreRepr::Sentinel(UNSCHEDULED_SENTINEL.to_string()),
        }
    }
}

/// Match result from the home side's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
    Undecided,
}

/// Canonical match record.
///
/// `result` is always derived from `score`; the only constructor is
/// [`MatchRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub competition: String,
    pub home_team: String,
    pub away_team: String,
    pub score: Score,
    result: Outcome,
}

impl MatchRecord {
    pub fn new(
        date: NaiveDate,
        competition: impl Into<String>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        score: Score,
    ) -> Self {
        Self {
            date,
            competition: competition.into(),
            home_team: home_team.into(),
            away_team: away_team.into(),
            score,
            result: score.outcome(),
        }
    }

    pub fn result(&self) -> Outcome {
        self.result
    }

    pub fn is_played(&self) -> bool {
        matches!(self.score, Score::Final { .. })
    }
}

/// Persisted data-file entry; competition is the enclosing map key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMatch {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub score: Score,
}

impl From<&MatchRecord> for StoredMatch {
    fn from(record: &MatchRecord) -> Self {
        Self {
            date: record.date,
            home_team: record.home_team.clone(),
            away_team: record.away_team.clone(),
            score: record.score,
        }
    }
}

/// Data-file layout: competition name → ordered matches
pub type StoredCollection = BTreeMap<String, Vec<StoredMatch>>;

/// Competition name → matches in fetch order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCollection {
    competitions: BTreeMap<String, Vec<MatchRecord>>,
}

impl MatchCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record to its competition's sequence
    pub fn push(&mut self, record: MatchRecord) {
        self.competitions
            .entry(record.competition.clone())
            .or_default()
            .push(record);
    }

    /// Append records to `competition`, creating the entry if absent
    pub fn extend(&mut self, competition: &str, records: impl IntoIterator<Item = MatchRecord>) {
        self.competitions
            .entry(competition.to_string())
            .or_default()
            .extend(records);
    }

    pub fn get(&self, competition: &str) -> Option<&[MatchRecord]> {
        self.competitions.get(competition).map(Vec::as_slice)
    }

    pub fn competitions(&self) -> impl Iterator<Item = (&str, &[MatchRecord])> {
        self.competitions
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }

    pub fn competition_count(&self) -> usize {
        self.competitions.len()
    }

    pub fn total_matches(&self) -> usize {
        self.competitions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_matches() == 0
    }

    pub fn to_stored(&self) -> StoredCollection {
        self.competitions
            .iter()
            .map(|(name, records)| (name.clone(), records.iter().map(StoredMatch::from).collect()))
            .collect()
    }

    /// Rebuild from the data-file layout, re-deriving each result from its score
    pub fn from_stored(stored: StoredCollection) -> Self {
        let competitions = stored
            .into_iter()
            .map(|(name, matches)| {
                let records = matches
                    .into_iter()
                    .map(|m| MatchRecord::new(m.date, name.as_str(), m.home_team, m.away_team, m.score))
                    .collect();
                (name, records)
            })
            .collect();
        Self { competitions }
    }
}

/// Sidecar describing the last full fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheManifest {
    pub last_fetch_date: NaiveDate,
    pub total_matches: u64,
    pub last_updated: DateTime<Utc>,
}

impl CacheManifest {
    pub fn is_fresh_for(&self, today: NaiveDate) -> bool {
        self.last_fetch_date == today
    }
}
