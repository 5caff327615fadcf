use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::alert::OpenAlert;
use crate::domain::catalog::{CatalogEntry, CatalogKind};
use crate::domain::reading::{
    FarmSummary, HeadReading, IncidentReport, MaintenanceRecord, MaintenanceResult, PumpReading,
    SectorReading, SubmissionResult,
};
use crate::gateway::{ExternalGateway, GatewayError};

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCall {
    FetchCatalog(CatalogKind),
    FetchShifts(i64),
    SectorReading(SectorReading),
    HeadReading(HeadReading),
    PumpReading(PumpReading),
    Maintenance(MaintenanceRecord),
    Incident(IncidentReport),
    FetchOpenAlerts(usize),
    FetchFarmSummary,
}

/// Gateway answering from canned responses and recording every call.
///
/// Clones share the call log, so a test can hand one clone to the engine and
/// inspect the other.
#[derive(Clone, Debug)]
pub struct ScriptedGateway {
    catalogs: HashMap<CatalogKind, Result<Vec<CatalogEntry>, GatewayError>>,
    shifts: HashMap<i64, Result<Vec<CatalogEntry>, GatewayError>>,
    submission: Result<SubmissionResult, GatewayError>,
    incident: Result<SubmissionResult, GatewayError>,
    maintenance: Result<MaintenanceResult, GatewayError>,
    alerts: Result<Vec<OpenAlert>, GatewayError>,
    summary: Result<FarmSummary, GatewayError>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            catalogs: HashMap::new(),
            shifts: HashMap::new(),
            submission: Ok(SubmissionResult::ok(None)),
            incident: Ok(SubmissionResult::ok(None)),
            maintenance: Ok(MaintenanceResult::ok()),
            alerts: Ok(Vec::new()),
            summary: Ok(FarmSummary::default()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ScriptedGateway {
    pub fn with_catalog(mut self, kind: CatalogKind, entries: Vec<CatalogEntry>) -> Self {
        self.catalogs.insert(kind, Ok(entries));
        self
    }

    pub fn with_catalog_error(mut self, kind: CatalogKind, error: GatewayError) -> Self {
        self.catalogs.insert(kind, Err(error));
        self
    }

    pub fn with_shifts(mut self, pump_id: i64, entries: Vec<CatalogEntry>) -> Self {
        self.shifts.insert(pump_id, Ok(entries));
        self
    }

    pub fn with_shifts_error(mut self, pump_id: i64, error: GatewayError) -> Self {
        self.shifts.insert(pump_id, Err(error));
        self
    }

    /// Answer for sector, head and pump readings.
    pub fn with_submission_result(
        mut self,
        result: Result<SubmissionResult, GatewayError>,
    ) -> Self {
        self.submission = result;
        self
    }

    pub fn with_incident_result(mut self, result: Result<SubmissionResult, GatewayError>) -> Self {
        self.incident = result;
        self
    }

    pub fn with_maintenance_result(
        mut self,
        result: Result<MaintenanceResult, GatewayError>,
    ) -> Self {
        self.maintenance = result;
        self
    }

    pub fn with_open_alerts(mut self, result: Result<Vec<OpenAlert>, GatewayError>) -> Self {
        self.alerts = result;
        self
    }

    pub fn with_farm_summary(mut self, result: Result<FarmSummary, GatewayError>) -> Self {
        self.summary = result;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Only the write calls, in order.
    pub fn submissions(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    RecordedCall::SectorReading(_)
                        | RecordedCall::HeadReading(_)
                        | RecordedCall::PumpReading(_)
                        | RecordedCall::Maintenance(_)
                        | RecordedCall::Incident(_)
                )
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

#[async_trait]
impl ExternalGateway for ScriptedGateway {
    async fn fetch_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, GatewayError> {
        self.record(RecordedCall::FetchCatalog(kind));
        self.catalogs.get(&kind).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_shifts(&self, pump_id: i64) -> Result<Vec<CatalogEntry>, GatewayError> {
        self.record(RecordedCall::FetchShifts(pump_id));
        self.shifts.get(&pump_id).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn submit_sector_reading(
        &self,
        reading: &SectorReading,
    ) -> Result<SubmissionResult, GatewayError> {
        self.record(RecordedCall::SectorReading(reading.clone()));
        self.submission.clone()
    }

    async fn submit_head_reading(
        &self,
        reading: &HeadReading,
    ) -> Result<SubmissionResult, GatewayError> {
        self.record(RecordedCall::HeadReading(reading.clone()));
        self.submission.clone()
    }

    async fn submit_pump_reading(
        &self,
        reading: &PumpReading,
    ) -> Result<SubmissionResult, GatewayError> {
        self.record(RecordedCall::PumpReading(reading.clone()));
        self.submission.clone()
    }

    async fn submit_maintenance(
        &self,
        record: &MaintenanceRecord,
    ) -> Result<MaintenanceResult, GatewayError> {
        self.record(RecordedCall::Maintenance(record.clone()));
        self.maintenance.clone()
    }

    async fn submit_incident(
        &self,
        report: &IncidentReport,
    ) -> Result<SubmissionResult, GatewayError> {
        self.record(RecordedCall::Incident(report.clone()));
        self.incident.clone()
    }

    async fn fetch_open_alerts(&self, limit: usize) -> Result<Vec<OpenAlert>, GatewayError> {
        self.record(RecordedCall::FetchOpenAlerts(limit));
        self.alerts.clone().map(|alerts| alerts.into_iter().take(limit).collect())
    }

    async fn fetch_farm_summary(&self) -> Result<FarmSummary, GatewayError> {
        self.record(RecordedCall::FetchFarmSummary);
        self.summary.clone()
    }
}
