use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use riego_core::gateway::ExternalGateway;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    gateway: Arc<dyn ExternalGateway>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub gateway: HealthCheck,
    pub checked_at: String,
}

pub fn router(gateway: Arc<dyn ExternalGateway>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { gateway })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    gateway: Arc<dyn ExternalGateway>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(gateway)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Probes the record-keeping service with the cheapest read it offers.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let gateway = match state.gateway.fetch_farm_summary().await {
        Ok(_) => HealthCheck { status: "ready", detail: "farm summary fetched".to_owned() },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("record-keeping service unreachable: {error}"),
        },
    };
    let ready = gateway.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "riego-server runtime initialized".to_owned(),
        },
        gateway,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use riego_core::domain::reading::FarmSummary;
    use riego_core::gateway::{GatewayError, ScriptedGateway};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_is_ready_when_the_gateway_answers() {
        let gateway = ScriptedGateway::default().with_farm_summary(Ok(FarmSummary::default()));

        let state = HealthState { gateway: Arc::new(gateway) };
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.gateway.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_degrades_when_the_gateway_times_out() {
        let gateway = ScriptedGateway::default()
            .with_farm_summary(Err(GatewayError::Timeout { secs: 10 }));

        let state = HealthState { gateway: Arc::new(gateway) };
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert!(payload.gateway.detail.contains("10"), "{}", payload.gateway.detail);
        assert_eq!(payload.service.status, "ready");
    }
}
