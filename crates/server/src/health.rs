use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use nudge_schedule::ScheduleSpec;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    schedule: ScheduleSpec,
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
    pub announcer: HealthCheck,
    pub checked_at: String,
}

pub fn router(schedule: ScheduleSpec) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { schedule })
}

pub async fn spawn(bind_address: &str, port: u16, schedule: ScheduleSpec) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(schedule)).await {
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

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let announcer = announcer_check(&state.schedule);
    let ready = announcer.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "nudge-server runtime initialized".to_string(),
        },
        announcer,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn announcer_check(schedule: &ScheduleSpec) -> HealthCheck {
    match schedule.next_occurrence(Utc::now()) {
        Some(next) => HealthCheck {
            status: "ready",
            detail: format!("next update at {}", next.to_rfc3339()),
        },
        None => HealthCheck {
            status: "degraded",
            detail: "configured schedule has no future occurrence".to_string(),
        },
    }
}
