//! Services for fetching, caching and supervision

pub mod aggregator;
pub mod cache;
pub mod normalizer;
pub mod prediction;
pub mod rate_limiter;
pub mod supervisor;

pub use aggregator::{AggregationPipeline, PipelineSettings};
pub use cache::{Freshness, FreshnessCache};
pub use normalizer::{normalize, normalize_all};
pub use prediction::PredictionClient;
pub use rate_limiter::RateLimiter;
pub use supervisor::{ServiceSupervisor, SupervisorConfig, SupervisorState};
