//! Static competition table shared by every source

/// A league or cup tracked by matchfeed.
///
/// `name` is the canonical display name used as the collection key,
/// `api_code` is the live API identifier, and `archive_ids` lists the
/// historical archive file stems (empty for live-only competitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompetitionRef {
    pub name: &'static str,
    pub api_code: &'static str,
    pub archive_ids: &'static [&'static str],
}

impl CompetitionRef {
    /// Whether the historical archive carries this competition
    pub fn has_archive(&self) -> bool {
        !self.archive_ids.is_empty()
    }
}

const COMPETITIONS: &[CompetitionRef] = &[
    CompetitionRef {
        name: "Premier League",
        api_code: "PL",
        archive_ids: &["en.1"],
    },
    CompetitionRef {
        name: "La Liga",
        api_code: "PD",
        archive_ids: &["es.1"],
    },
    CompetitionRef {
        name: "Serie A",
        api_code: "SA",
        archive_ids: &["it.1"],
    },
    CompetitionRef {
        name: "Bundesliga",
        api_code: "BL1",
        archive_ids: &["de.1"],
    },
    CompetitionRef {
        name: "Ligue 1",
        api_code: "FL1",
        archive_ids: &["fr.1"],
    },
    CompetitionRef {
        name: "Champions League",
        api_code: "CL",
        archive_ids: &["uefa.cl"],
    },
    CompetitionRef {
        name: "Europa League",
        api_code: "EL",
        archive_ids: &[],
    },
];

/// All competitions in table order
pub fn all() -> &'static [CompetitionRef] {
    COMPETITIONS
}

/// Look up a competition by display name (case-insensitive)
pub fn by_name(name: &str) -> Option<&'static CompetitionRef> {
    COMPETITIONS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
}

/// Look up a competition by live API code (e.g. "PL")
pub fn by_api_code(code: &str) -> Option<&'static CompetitionRef> {
    COMPETITIONS
        .iter()
        .find(|c| c.api_code.eq_ignore_ascii_case(code.trim()))
}

/// Look up a competition by archive id (e.g. "en.1")
pub fn by_archive_id(id: &str) -> Option<&'static CompetitionRef> {
    COMPETITIONS
        .iter()
        .find(|c| c.archive_ids.iter().any(|a| *a == id))
}

/// Resolve a user-supplied identifier: display name, API code or archive id
pub fn resolve(key: &str) -> Option<&'static CompetitionRef> {
    by_name(key)
        .or_else(|| by_api_code(key))
        .or_else(|| by_archive_id(key))
}
