use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AppState, WebError};
use crate::models::CycleScope;
use crate::pipeline::{verdict, CycleError, CycleOutcome, CycleReport, ExitStatus, StatusReport, Trigger};

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub caller_id: String,
    #[serde(default)]
    pub scope: CycleScope,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub status: ExitStatus,
    pub message: String,
    pub report: CycleReport,
}

pub async fn trigger_check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<ApiResponse<CheckResponse>>, WebError> {
    let caller = request.caller_id.trim();
    if caller.is_empty() {
        return Err(WebError::bad_request("caller_id is required"));
    }

    if !state.config.allowed_callers().iter().any(|id| id == caller) {
        tracing::warn!(caller = %caller, "Check requested by a caller outside the allow-list");
        return Err(WebError::Forbidden);
    }

    tracing::info!(caller = %caller, scope = %request.scope, "On-demand check requested");
    let result = state
        .monitor
        .run_cycle(
            request.scope,
            Trigger::OnDemand {
                caller: caller.to_string(),
            },
        )
        .await;

    let (status, message) = verdict(&result);
    match result {
        Ok(CycleOutcome::Completed(report)) => Ok(Json(ApiResponse::success(CheckResponse {
            status,
            message,
            report,
        }))),
        Ok(CycleOutcome::AuthFailed) => Err(WebError::BadGateway(message)),
        Err(CycleError::Busy) => Err(WebError::Conflict(message)),
        Err(_) => Err(WebError::InternalServerError(message)),
    }
}

pub async fn monitor_status(State(state): State<AppState>) -> Json<ApiResponse<StatusReport>> {
    Json(ApiResponse::success(state.monitor.status().await))
}
