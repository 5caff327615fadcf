//! HTTP implementation of [`ExternalGateway`] against the record-keeping service.

pub mod wire;

use std::time::Instant;

use async_trait::async_trait;
use chrono::{Local, Utc};
use reqwest::{Client, Response};
use riego_core::config::GatewayConfig;
use riego_core::domain::alert::OpenAlert;
use riego_core::domain::catalog::{CatalogEntry, CatalogKind};
use riego_core::domain::reading::{
    FarmSummary, HeadReading, IncidentReport, MaintenanceRecord, MaintenanceResult, PumpReading,
    SectorReading, SubmissionResult,
};
use riego_core::gateway::{ExternalGateway, GatewayError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::wire::{
    HeadPayload, IncidentPayload, MaintenancePayload, MaintenanceResponse, PumpPayload,
    SectorPayload, SubmissionResponse,
};

/// JSON-over-HTTPS gateway. Every call is bounded by the configured timeout
/// and is never retried.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    site_id: String,
    timeout_secs: u64,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|error| {
                GatewayError::Transport(format!("could not build http client: {error}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            site_id: config.site_id.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_error(&self, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout { secs: self.timeout_secs }
        } else if error.is_decode() {
            GatewayError::Decode(error.to_string())
        } else {
            GatewayError::Transport(error.to_string())
        }
    }

    fn checked(path: &str, started: Instant, response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        debug!(
            event_name = "gateway.response",
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "gateway responded"
        );
        if status.is_success() {
            Ok(response)
        } else {
            warn!(
                event_name = "gateway.http_error",
                path,
                status = status.as_u16(),
                "gateway returned an error status"
            );
            Err(GatewayError::Transport(format!("{path} returned HTTP {status}")))
        }
    }

    /// GET with the site id and a `_ts` cache-buster on top of `query`.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, GatewayError> {
        let mut params: Vec<(&str, String)> = vec![
            ("finca_id", self.site_id.clone()),
            ("_ts", Utc::now().timestamp().to_string()),
        ];
        params.extend(query.iter().cloned());

        let started = Instant::now();
        let response = self
            .client
            .get(self.url(path))
            .query(&params)
            .send()
            .await
            .map_err(|error| self.map_error(error))?;
        let response = Self::checked(path, started, response)?;
        response.json::<Value>().await.map_err(|error| self.map_error(error))
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<Response, GatewayError> {
        let started = Instant::now();
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|error| self.map_error(error))?;
        Self::checked(path, started, response)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, GatewayError> {
        let response = self.post(path, body).await?;
        response.json::<T>().await.map_err(|error| self.map_error(error))
    }

    fn timestamp() -> String {
        wire::format_timestamp(Local::now().naive_local())
    }
}

#[async_trait]
impl ExternalGateway for HttpGateway {
    async fn fetch_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, GatewayError> {
        let body = self.get_json(wire::catalog_path(kind), &[]).await?;
        let entries = wire::decode_catalog(kind, body)?;
        debug!(
            event_name = "gateway.catalog",
            kind = kind.plural(),
            count = entries.len(),
            "catalog loaded"
        );
        Ok(entries)
    }

    async fn fetch_shifts(&self, pump_id: i64) -> Result<Vec<CatalogEntry>, GatewayError> {
        let body = self
            .get_json(wire::catalog_path(CatalogKind::Shift), &[("bomba_id", pump_id.to_string())])
            .await?;
        wire::decode_catalog(CatalogKind::Shift, body)
    }

    async fn submit_sector_reading(
        &self,
        reading: &SectorReading,
    ) -> Result<SubmissionResult, GatewayError> {
        let payload = SectorPayload::new(&self.site_id, reading, Self::timestamp());
        let response: SubmissionResponse = self.post_json("/lectura/sector", &payload).await?;
        Ok(response.into())
    }

    async fn submit_head_reading(
        &self,
        reading: &HeadReading,
    ) -> Result<SubmissionResult, GatewayError> {
        let payload = HeadPayload::new(&self.site_id, reading, Self::timestamp());
        let response: SubmissionResponse = self.post_json("/lectura/cabezal", &payload).await?;
        Ok(response.into())
    }

    /// A 2xx answer whose body is not the usual JSON still counts as recorded.
    async fn submit_pump_reading(
        &self,
        reading: &PumpReading,
    ) -> Result<SubmissionResult, GatewayError> {
        let payload = PumpPayload::new(&self.site_id, reading, Self::timestamp());
        let response = self.post("/lectura/bomba", &payload).await?;
        let text = response.text().await.map_err(|error| self.map_error(error))?;
        match serde_json::from_str::<SubmissionResponse>(&text) {
            Ok(parsed) => Ok(parsed.into()),
            Err(error) => {
                warn!(
                    event_name = "gateway.pump.unparsed_body",
                    error = %error,
                    "pump reading accepted with an unexpected body"
                );
                Ok(SubmissionResult::ok(None))
            }
        }
    }

    async fn submit_maintenance(
        &self,
        record: &MaintenanceRecord,
    ) -> Result<MaintenanceResult, GatewayError> {
        let payload = MaintenancePayload::new(&self.site_id, record, Self::timestamp());
        let response: MaintenanceResponse = self.post_json("/mantenimiento", &payload).await?;
        Ok(response.into())
    }

    async fn submit_incident(
        &self,
        report: &IncidentReport,
    ) -> Result<SubmissionResult, GatewayError> {
        let payload = IncidentPayload::new(&self.site_id, report, Self::timestamp());
        let response: SubmissionResponse = self.post_json("/incidencia", &payload).await?;
        Ok(response.into())
    }

    async fn fetch_open_alerts(&self, limit: usize) -> Result<Vec<OpenAlert>, GatewayError> {
        let body = self
            .get_json(
                "/alertas",
                &[("estado", "abierta".to_owned()), ("limite", limit.to_string())],
            )
            .await?;
        let mut alerts = wire::decode_open_alerts(body)?;
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn fetch_farm_summary(&self) -> Result<FarmSummary, GatewayError> {
        let body = self.get_json("/estado_finca", &[]).await?;
        wire::decode_farm_summary(body)
    }
}
