//! Per-request state shared by the concurrently running source tasks.

use chrono::{DateTime, Utc};
use econ_sources::{DataSource, Magnitude, QueryParams, UnitSignal};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Lives for exactly one fan-out; never reused across requests.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub params: QueryParams,
    pub started_at: DateTime<Utc>,
    units: RwLock<UnitSignal>,
}

impl RequestContext {
    pub fn new(params: QueryParams) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            params,
            started_at: Utc::now(),
            units: RwLock::new(UnitSignal::default()),
        }
    }

    /// Publish a detected magnitude. Ignored for sources that do not publish
    /// and for `Unknown`.
    pub async fn publish_unit(&self, source: DataSource, unit: Magnitude) {
        if !source.publishes_unit() || unit == Magnitude::Unknown {
            return;
        }
        let mut signal = self.units.write().await;
        signal.publish(source, unit);
        debug!(request_id = %self.request_id, source = %source, unit = %unit, "Published unit");
    }

    /// Current state of the unit signal.
    pub async fn unit_signal(&self) -> UnitSignal {
        *self.units.read().await
    }
}
