use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::alert::OpenAlert;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hydraulic reading of a sector, or a dripper trial carrying only the CV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorReading {
    pub sector_id: i64,
    pub user_id: UserId,
    pub hydrant_pressure: Option<f64>,
    pub end_pressure: Option<f64>,
    pub flow_rate: Option<f64>,
    pub dripper_cv: Option<f64>,
}

impl SectorReading {
    pub fn hydraulic(
        sector_id: i64,
        user_id: UserId,
        hydrant_pressure: f64,
        end_pressure: f64,
        flow_rate: f64,
    ) -> Self {
        Self {
            sector_id,
            user_id,
            hydrant_pressure: Some(hydrant_pressure),
            end_pressure: Some(end_pressure),
            flow_rate: Some(flow_rate),
            dripper_cv: None,
        }
    }

    pub fn uniformity(sector_id: i64, user_id: UserId, cv: f64) -> Self {
        Self {
            sector_id,
            user_id,
            hydrant_pressure: None,
            end_pressure: None,
            flow_rate: None,
            dripper_cv: Some(cv),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadReading {
    pub head_id: i64,
    pub user_id: UserId,
    pub inlet_pressure: f64,
    pub outlet_pressure: f64,
}

impl HeadReading {
    pub fn delta_p(&self) -> f64 {
        self.inlet_pressure - self.outlet_pressure
    }

    pub fn outlet_exceeds_inlet(&self) -> bool {
        self.outlet_pressure > self.inlet_pressure
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PumpReading {
    pub pump_id: i64,
    pub shift_id: i64,
    pub user_id: UserId,
    pub pressure: f64,
    pub flow_rate: f64,
    pub startup_ok: bool,
    pub vibration: bool,
    pub leak: bool,
    pub observations: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceKind {
    Corrective,
}

pub const ALERT_RESOLUTION_TASK: &str = "ALERT_RESOLUTION";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub user_id: UserId,
    pub task_code: String,
    pub description: Option<String>,
    pub kind: MaintenanceKind,
    pub sector_id: Option<i64>,
    pub head_id: Option<i64>,
    pub alert_id: Option<i64>,
}

impl MaintenanceRecord {
    /// Corrective maintenance closing an open alert on its sector or head.
    pub fn alert_resolution(user_id: UserId, alert: &OpenAlert, comment: Option<String>) -> Self {
        let (sector_id, head_id) = alert.maintenance_target();
        Self {
            user_id,
            task_code: ALERT_RESOLUTION_TASK.to_owned(),
            description: comment,
            kind: MaintenanceKind::Corrective,
            sector_id,
            head_id,
            alert_id: Some(alert.id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentKind {
    ManualAlert,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub user_id: UserId,
    pub description: String,
    pub kind: IncidentKind,
    pub sector_id: Option<i64>,
    pub head_id: Option<i64>,
}

impl IncidentReport {
    pub fn manual(user_id: UserId, description: impl Into<String>) -> Self {
        Self {
            user_id,
            description: description.into(),
            kind: IncidentKind::ManualAlert,
            sector_id: None,
            head_id: None,
        }
    }
}

pub const STATUS_OK: &str = "ok";

/// Answer of the record-keeping service to any write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub status: String,
    pub message: Option<String>,
    pub record_id: Option<i64>,
    pub has_alert: bool,
    pub alerts: Vec<String>,
}

impl SubmissionResult {
    pub fn ok(record_id: Option<i64>) -> Self {
        Self {
            status: STATUS_OK.to_owned(),
            message: None,
            record_id,
            has_alert: false,
            alerts: Vec::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_owned(),
            message: Some(message.into()),
            record_id: None,
            has_alert: false,
            alerts: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_alerts(mut self, alerts: Vec<String>) -> Self {
        self.has_alert = !alerts.is_empty();
        self.alerts = alerts;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceResult {
    pub status: String,
    pub message: Option<String>,
}

impl MaintenanceResult {
    pub fn ok() -> Self {
        Self { status: STATUS_OK.to_owned(), message: None }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { status: "error".to_owned(), message: Some(message.into()) }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficLight {
    pub green: u32,
    pub yellow: u32,
    pub red: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmSummary {
    pub sectors: TrafficLight,
    pub heads: TrafficLight,
    pub pumps: TrafficLight,
}
