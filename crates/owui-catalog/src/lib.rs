//! owui-catalog: Agent Catalog
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                AgentCatalog                  │
//! │  ┌────────────────┐   ┌───────────────────┐  │
//! │  │  FilterPolicy  │   │   CatalogCache    │  │
//! │  │ whitelist/black│   │ TTL + single-     │  │
//! │  │ list (globs)   │   │ flight refresh    │  │
//! │  └────────────────┘   └─────────┬─────────┘  │
//! └─────────────────────────────────┼────────────┘
//!                                   │
//!                          dyn UpstreamClient
//! ```
//!
//! The cache holds the unfiltered catalog; the policy is applied on every
//! read so a policy check never depends on cache contents.

pub mod cache;
pub mod catalog;
pub mod filter;

// Re-exports
pub use cache::{CacheEntry, CacheSnapshot, CacheStats, CatalogCache};
pub use catalog::AgentCatalog;
pub use filter::FilterPolicy;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{AgentCatalog, CacheStats, CatalogCache, FilterPolicy};
}
