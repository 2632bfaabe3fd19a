//! Match normalization service
//!
//! Maps source-specific raw matches into the canonical match record.
//! Pure and stateless: no network, no shared state.

use crate::types::{MatchRecord, RawMatch, Score};

/// Normalize a raw match into a canonical record for `competition`.
///
/// Rules:
/// - Score is `[home, away]` only when both full-time goal counts are present,
///   otherwise the unscheduled sentinel
/// - Result is derived from the score
/// - Kick-off time is dropped; only the calendar date is kept
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use matchfeed::services::normalizer::normalize;
/// use matchfeed::types::{MatchStatus, Outcome, RawMatch};
///
/// let raw = RawMatch {
///     kickoff: NaiveDate::from_ymd_opt(2024, 5, 19).unwrap().and_hms_opt(15, 0, 0).unwrap(),
///     home_team: "Arsenal FC".into(),
///     away_team: "Everton FC".into(),
///     home_goals: Some(2),
///     away_goals: Some(1),
///     status: MatchStatus::Finished,
///     round: None,
///     season: None,
/// };
/// let record = normalize(&raw, "Premier League");
/// assert_eq!(record.result(), Outcome::HomeWin);
/// assert_eq!(record.date.to_string(), "2024-05-19");
/// ```
pub fn normalize(raw: &RawMatch, competition: &str) -> MatchRecord {
    MatchRecord::new(
        raw.kickoff.date(),
        competition,
        raw.home_team.trim(),
        raw.away_team.trim(),
        Score::from_goals(raw.home_goals, raw.away_goals),
    )
}

/// Normalize a batch, preserving order
pub fn normalize_all<'a>(
    raws: impl IntoIterator<Item = &'a RawMatch>,
    competition: &str,
) -> Vec<MatchRecord> {
    raws.into_iter().map(|raw| normalize(raw, competition)).collect()
}
