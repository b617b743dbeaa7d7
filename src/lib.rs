// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod cache;
pub mod ingest;
pub mod metrics;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::cache::NewsCache;
pub use crate::ingest::types::{AggregatePolicy, Article, DedupKey, MissingDatePolicy, NewsPipeline, Source};
pub use crate::ingest::FeedAggregator;
pub use crate::notify::{MailTransport, NotificationGate, NotifiedStore};
