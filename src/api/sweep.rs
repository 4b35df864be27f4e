//! Manual trigger for the delinquency sweep

use axum::{extract::State, Json};

use crate::{error::AppResult, services::sweep::SweepReport, AppState};

use super::Caller;

/// Run the delinquency sweep now
#[utoipa::path(
    post,
    path = "/sweep",
    tag = "sweep",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn run_sweep(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<SweepReport>> {
    caller.require_admin()?;

    let report = state.services.sweep.run().await?;
    Ok(Json(report))
}
