pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod gateway;
pub mod session;
pub mod uniformity;
pub mod validation;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::{AppConfig, ConfigError, GatewayConfig, LoadOptions};
pub use domain::alert::{AlertTarget, OpenAlert};
pub use domain::catalog::{CatalogEntry, CatalogKind, LabelLookup};
pub use domain::reading::{
    FarmSummary, HeadReading, IncidentReport, MaintenanceRecord, MaintenanceResult, PumpReading,
    SectorReading, SubmissionResult, TrafficLight, UserId,
};
pub use errors::DomainError;
pub use flows::{ConversationEngine, EngineSettings, Keyboard, Links, Reply, TransitionOutcome};
pub use gateway::{ExternalGateway, GatewayError};
pub use session::{InMemorySessionStore, RootMenu, Session, SessionState};
pub use uniformity::{DerivedStat, TrialSample, UniformityBand};
