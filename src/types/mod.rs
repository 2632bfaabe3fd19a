//! Type definitions for matchfeed

pub mod competition;
mod error;
mod matches;

pub use competition::CompetitionRef;
pub use error::*;
pub use matches::*;

/// Cache loading warning types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWarning {
    /// Failed to open or read a cache file
    LoadFailed(String),
    /// Cache file was corrupted (invalid JSON)
    Corrupted(String),
    /// Fresh data could not be written; manifest left untouched
    PersistFailed(String),
}

impl std::fmt::Display for CacheWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheWarning::LoadFailed(msg) => write!(f, "cache load failed: {}", msg),
            CacheWarning::Corrupted(msg) => write!(f, "cache corrupted: {}", msg),
            CacheWarning::PersistFailed(msg) => write!(f, "cache persist failed: {}", msg),
        }
    }
}
