//! Econ Core Library
//!
//! Runs every statistical-agency adapter concurrently for one query, puts the
//! answers on one magnitude scale, reconciles them into a single series and
//! optionally attaches a narrative analysis.
//!
//! ## Key Components
//!
//! - `Orchestrator`: fan-out with deadline, outer retry, response assembly
//! - `reconcile`: priority-fallback (World Bank, then IMF) merge
//! - `RequestContext`: per-request unit signal and request id
//! - `Analyzer`: pluggable text analysis of the fetched series

pub mod analysis;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod query;
pub mod reconcile;
pub mod response;
pub mod telemetry;

pub use analysis::{build_prompt, Analyzer, ChatAnalyzer};
pub use config::{PipelineConfig, PipelineMode};
pub use context::RequestContext;
pub use error::{AnalysisError, PipelineError, PipelineResult};
pub use orchestrator::Orchestrator;
pub use query::QueryPayload;
pub use reconcile::{merge_datasets, MergePolicy};
pub use response::{AggregatedResponse, ResponseStatus};
pub use telemetry::init_tracing;

pub use econ_sources::{
    DataPoint, DataSource, Dataset, Magnitude, Metadata, QueryParams, SourceConfig, SourceError,
};
