//! JSON shapes spoken by the record-keeping service.
//!
//! Field names follow the service, which is Spanish. Everything here is a
//! pure conversion so it can be tested without a network.

use chrono::NaiveDateTime;
use riego_core::domain::alert::{AlertTarget, OpenAlert};
use riego_core::domain::catalog::{CatalogEntry, CatalogKind};
use riego_core::domain::reading::{
    FarmSummary, HeadReading, IncidentKind, IncidentReport, MaintenanceKind, MaintenanceRecord,
    MaintenanceResult, PumpReading, SectorReading, SubmissionResult, TrafficLight, UserId,
    ALERT_RESOLUTION_TASK, STATUS_OK,
};
use riego_core::gateway::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATUS_ERROR: &str = "error";

/// Collection key used when the service wraps a catalog in an object.
pub fn catalog_collection(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Sector => "sectores",
        CatalogKind::Head => "cabezales",
        CatalogKind::Pump => "bombas",
        CatalogKind::Shift => "turnos",
    }
}

pub fn catalog_path(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Sector => "/sectores",
        CatalogKind::Head => "/cabezales",
        CatalogKind::Pump => "/bombas",
        CatalogKind::Shift => "/turnos_bomba",
    }
}

/// Numeric-looking identifiers travel as JSON numbers, anything else as text.
pub fn id_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(number) => Value::from(number),
        Err(_) => Value::from(trimmed),
    }
}

fn user_value(user_id: &UserId) -> Value {
    id_value(&user_id.0)
}

/// Timestamp format the service stores readings with.
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Serialize)]
pub struct SectorPayload {
    pub finca_id: Value,
    pub sector_id: i64,
    pub user_id: Value,
    pub fecha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_hidrante: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_final: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q_sector: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_goteros: Option<f64>,
}

impl SectorPayload {
    pub fn new(site_id: &str, reading: &SectorReading, fecha: String) -> Self {
        Self {
            finca_id: id_value(site_id),
            sector_id: reading.sector_id,
            user_id: user_value(&reading.user_id),
            fecha,
            p_hidrante: reading.hydrant_pressure,
            p_final: reading.end_pressure,
            q_sector: reading.flow_rate,
            cv_goteros: reading.dripper_cv,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HeadPayload {
    pub finca_id: Value,
    pub cabezal_id: i64,
    pub user_id: Value,
    pub fecha: String,
    pub p_entrada: f64,
    pub p_salida: f64,
    pub delta_p: f64,
}

impl HeadPayload {
    pub fn new(site_id: &str, reading: &HeadReading, fecha: String) -> Self {
        Self {
            finca_id: id_value(site_id),
            cabezal_id: reading.head_id,
            user_id: user_value(&reading.user_id),
            fecha,
            p_entrada: reading.inlet_pressure,
            p_salida: reading.outlet_pressure,
            delta_p: reading.delta_p(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PumpPayload {
    pub finca_id: Value,
    pub bomba_id: i64,
    pub turno_id: i64,
    pub user_id: Value,
    pub fecha: String,
    pub p_actual: f64,
    pub q_actual: f64,
    pub arranque_ok: bool,
    pub vibraciones: bool,
    pub fugas: bool,
    pub observaciones: Option<String>,
}

impl PumpPayload {
    pub fn new(site_id: &str, reading: &PumpReading, fecha: String) -> Self {
        Self {
            finca_id: id_value(site_id),
            bomba_id: reading.pump_id,
            turno_id: reading.shift_id,
            user_id: user_value(&reading.user_id),
            fecha,
            p_actual: reading.pressure,
            q_actual: reading.flow_rate,
            arranque_ok: reading.startup_ok,
            vibraciones: reading.vibration,
            fugas: reading.leak,
            observaciones: reading.observations.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MaintenancePayload {
    pub finca_id: Value,
    pub user_id: Value,
    pub fecha: String,
    pub tarea_codigo: String,
    pub tarea_descripcion: Option<String>,
    pub tipo: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabezal_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerta_id: Option<i64>,
}

impl MaintenancePayload {
    pub fn new(site_id: &str, record: &MaintenanceRecord, fecha: String) -> Self {
        let task_code = if record.task_code == ALERT_RESOLUTION_TASK {
            "RESOLUCION_ALERTA".to_owned()
        } else {
            record.task_code.clone()
        };
        Self {
            finca_id: id_value(site_id),
            user_id: user_value(&record.user_id),
            fecha,
            tarea_codigo: task_code,
            tarea_descripcion: record.description.clone(),
            tipo: match record.kind {
                MaintenanceKind::Corrective => "correctivo",
            },
            sector_id: record.sector_id,
            cabezal_id: record.head_id,
            alerta_id: record.alert_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IncidentPayload {
    pub finca_id: Value,
    pub user_id: Value,
    pub fecha: String,
    pub descripcion: String,
    pub tipo: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabezal_id: Option<i64>,
}

impl IncidentPayload {
    pub fn new(site_id: &str, report: &IncidentReport, fecha: String) -> Self {
        Self {
            finca_id: id_value(site_id),
            user_id: user_value(&report.user_id),
            fecha,
            descripcion: report.description.clone(),
            tipo: match report.kind {
                IncidentKind::ManualAlert => "alerta_manual",
            },
            sector_id: report.sector_id,
            cabezal_id: report.head_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmissionResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub id_registro: Option<Value>,
    #[serde(default)]
    pub tiene_alerta: Option<bool>,
    #[serde(default)]
    pub alertas: Vec<Value>,
}

impl From<SubmissionResponse> for SubmissionResult {
    fn from(response: SubmissionResponse) -> Self {
        let alerts: Vec<String> = response.alertas.iter().map(value_text).collect();
        Self {
            status: response.status.unwrap_or_default(),
            message: response.mensaje,
            record_id: response.id_registro.as_ref().and_then(value_id),
            has_alert: response.tiene_alerta.unwrap_or(false) && !alerts.is_empty(),
            alerts,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MaintenanceResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
}

impl From<MaintenanceResponse> for MaintenanceResult {
    fn from(response: MaintenanceResponse) -> Self {
        Self { status: response.status.unwrap_or_default(), message: response.mensaje }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Ids arrive as numbers or as numeric strings depending on the endpoint.
fn value_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn str_field<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str).map(str::trim).filter(|text| !text.is_empty())
}

fn logical_error(body: &Value, fallback: &str) -> GatewayError {
    let message = str_field(body, "mensaje").unwrap_or(fallback);
    GatewayError::Logical(message.to_owned())
}

/// Catalogs come back as a bare list or as `{status, <collection>}`.
pub fn decode_catalog(kind: CatalogKind, body: Value) -> Result<Vec<CatalogEntry>, GatewayError> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(ref map) => {
            let status = map.get("status").and_then(Value::as_str);
            if status == Some(STATUS_ERROR) {
                return Err(logical_error(&body, "the service reported an error"));
            }
            match map.get(catalog_collection(kind)) {
                Some(Value::Array(rows)) => rows.clone(),
                Some(Value::Null) | None if status == Some(STATUS_OK) => Vec::new(),
                _ => {
                    return Err(GatewayError::Logical(format!(
                        "expected a list of {}",
                        kind.plural()
                    )))
                }
            }
        }
        _ => return Err(GatewayError::Logical(format!("expected a list of {}", kind.plural()))),
    };

    rows.iter().map(|row| catalog_row(kind, row)).collect()
}

fn catalog_row(kind: CatalogKind, row: &Value) -> Result<CatalogEntry, GatewayError> {
    let id = row
        .get("id")
        .and_then(value_id)
        .ok_or_else(|| GatewayError::Decode(format!("{} row without a numeric id", kind.noun())))?;
    let name = str_field(row, "nombre").or_else(|| str_field(row, "nombre_turno"));
    Ok(CatalogEntry::new(id, str_field(row, "codigo"), name))
}

pub fn decode_open_alerts(body: Value) -> Result<Vec<OpenAlert>, GatewayError> {
    if str_field(&body, "status") != Some(STATUS_OK) {
        return Err(logical_error(&body, "error querying alerts"));
    }
    let rows = match body.get("alertas") {
        Some(Value::Array(rows)) => rows.as_slice(),
        Some(Value::Null) | None => &[],
        Some(_) => return Err(GatewayError::Decode("`alertas` is not a list".to_owned())),
    };

    rows.iter()
        .map(|row| {
            let id = row
                .get("id")
                .and_then(value_id)
                .ok_or_else(|| GatewayError::Decode("alert without a numeric id".to_owned()))?;
            Ok(OpenAlert {
                id,
                target_kind: AlertTarget::parse(str_field(row, "lectura_tipo").unwrap_or_default()),
                target_id: row.get("elemento_id").and_then(value_id),
                level: str_field(row, "nivel").unwrap_or_default().to_owned(),
                reason: str_field(row, "mensaje").unwrap_or_default().to_owned(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct LightCounts {
    #[serde(default)]
    verde: u32,
    #[serde(default)]
    amarillo: u32,
    #[serde(default)]
    rojo: u32,
}

impl From<LightCounts> for TrafficLight {
    fn from(counts: LightCounts) -> Self {
        Self { green: counts.verde, yellow: counts.amarillo, red: counts.rojo }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    sectores: LightCounts,
    #[serde(default)]
    cabezales: LightCounts,
    #[serde(default)]
    bombas: LightCounts,
}

pub fn decode_farm_summary(body: Value) -> Result<FarmSummary, GatewayError> {
    if str_field(&body, "status") != Some(STATUS_OK) {
        return Err(logical_error(&body, "farm status unavailable"));
    }
    let summary = match body.get("resumen") {
        Some(resumen) => serde_json::from_value::<SummaryBody>(resumen.clone())
            .map_err(|error| GatewayError::Decode(error.to_string()))?,
        None => SummaryBody::default(),
    };
    Ok(FarmSummary {
        sectors: summary.sectores.into(),
        heads: summary.cabezales.into(),
        pumps: summary.bombas.into(),
    })
}
