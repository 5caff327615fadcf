//! Boundary to the remote record-keeping service.
//!
//! Flows only ever talk to [`ExternalGateway`]. The HTTP implementation lives
//! in `riego-api`; [`memory::ScriptedGateway`] stands in for it in tests and
//! dry runs.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::alert::OpenAlert;
use crate::domain::catalog::{CatalogEntry, CatalogKind};
use crate::domain::reading::{
    FarmSummary, HeadReading, IncidentReport, MaintenanceRecord, MaintenanceResult, PumpReading,
    SectorReading, SubmissionResult,
};

pub use memory::{RecordedCall, ScriptedGateway};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("service reported an error: {0}")]
    Logical(String),
}

#[async_trait]
pub trait ExternalGateway: Send + Sync {
    async fn fetch_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, GatewayError>;

    async fn fetch_shifts(&self, pump_id: i64) -> Result<Vec<CatalogEntry>, GatewayError>;

    async fn submit_sector_reading(
        &self,
        reading: &SectorReading,
    ) -> Result<SubmissionResult, GatewayError>;

    async fn submit_head_reading(
        &self,
        reading: &HeadReading,
    ) -> Result<SubmissionResult, GatewayError>;

    async fn submit_pump_reading(
        &self,
        reading: &PumpReading,
    ) -> Result<SubmissionResult, GatewayError>;

    async fn submit_maintenance(
        &self,
        record: &MaintenanceRecord,
    ) -> Result<MaintenanceResult, GatewayError>;

    async fn submit_incident(
        &self,
        report: &IncidentReport,
    ) -> Result<SubmissionResult, GatewayError>;

    async fn fetch_open_alerts(&self, limit: usize) -> Result<Vec<OpenAlert>, GatewayError>;

    async fn fetch_farm_summary(&self) -> Result<FarmSummary, GatewayError>;
}

#[async_trait]
impl<T> ExternalGateway for Arc<T>
where
    T: ExternalGateway + ?Sized,
{
    async fn fetch_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, GatewayError> {
        (**self).fetch_catalog(kind).await
    }

    async fn fetch_shifts(&self, pump_id: i64) -> Result<Vec<CatalogEntry>, GatewayError> {
        (**self).fetch_shifts(pump_id).await
    }

    async fn submit_sector_reading(
        &self,
        reading: &SectorReading,
    ) -> Result<SubmissionResult, GatewayError> {
        (**self).submit_sector_reading(reading).await
    }

    async fn submit_head_reading(
        &self,
        reading: &HeadReading,
    ) -> Result<SubmissionResult, GatewayError> {
        (**self).submit_head_reading(reading).await
    }

    async fn submit_pump_reading(
        &self,
        reading: &PumpReading,
    ) -> Result<SubmissionResult, GatewayError> {
        (**self).submit_pump_reading(reading).await
    }

    async fn submit_maintenance(
        &self,
        record: &MaintenanceRecord,
    ) -> Result<MaintenanceResult, GatewayError> {
        (**self).submit_maintenance(record).await
    }

    async fn submit_incident(
        &self,
        report: &IncidentReport,
    ) -> Result<SubmissionResult, GatewayError> {
        (**self).submit_incident(report).await
    }

    async fn fetch_open_alerts(&self, limit: usize) -> Result<Vec<OpenAlert>, GatewayError> {
        (**self).fetch_open_alerts(limit).await
    }

    async fn fetch_farm_summary(&self) -> Result<FarmSummary, GatewayError> {
        (**self).fetch_farm_summary().await
    }
}
