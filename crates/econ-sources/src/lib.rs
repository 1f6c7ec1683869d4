//! Econ-Sources: statistical-agency adapters for the econ aggregator
//!
//! This crate provides the per-source layer of the pipeline: one adapter per
//! agency (World Bank, IMF, OECD, UN), the retry/cache wrapper around them,
//! and the unit normalizer that puts all sources on one magnitude scale.
//!
//! ## Key Components
//!
//! - `SourceAdapter`: fetch raw payload, transform into a `Dataset`
//! - `CachedSource`: TTL cache + exponential-backoff retry of the fetch
//! - `units`: magnitude detection, `UnitSignal`, normalization

pub mod adapter;
pub mod cache;
pub mod client;
pub mod config;
mod error;
pub mod fakes;
pub mod imf;
pub mod oecd;
pub mod retry;
pub mod schema;
mod sdmx;
pub mod un;
pub mod units;
pub mod world_bank;

use std::sync::Arc;

pub use adapter::{CachedSource, IndicatorTable, SourceAdapter};
pub use cache::{cache_key, TtlCache};
pub use config::{SourceConfig, SourceEndpoints};
pub use error::SourceError;
pub use imf::ImfAdapter;
pub use oecd::OecdAdapter;
pub use retry::RetryPolicy;
pub use schema::{ChartSeries, DataPoint, DataSource, Dataset, Metadata, QueryParams};
pub use un::UnAdapter;
pub use units::{Magnitude, UnitSignal};
pub use world_bank::WorldBankAdapter;

/// Result type for econ-sources operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Build the four live agency adapters from `config`.
pub fn default_adapters(config: &SourceConfig) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    Ok(vec![
        Arc::new(WorldBankAdapter::new(config)?),
        Arc::new(ImfAdapter::new(config)?),
        Arc::new(OecdAdapter::new(config)?),
        Arc::new(UnAdapter::new(config)?),
    ])
}
