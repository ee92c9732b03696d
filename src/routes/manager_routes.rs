use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::controllers::ShiftController;
use crate::dto::{ApiResponse, AssignShiftRequest, CancelShiftResponse, ShiftDetailsResponse};
use crate::models::AuthenticatedUser;
use crate::routes::json_body;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_manager_router() -> Router<AppState> {
    Router::new()
        .route("/shifts", post(assign_shift))
        .route("/shifts/:id", get(get_shift))
        .route("/shifts/:id/cancel", post(cancel_shift))
}

async fn assign_shift(
    State(state): State<AppState>,
    Extension(manager): Extension<AuthenticatedUser>,
    payload: Result<Json<AssignShiftRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ShiftDetailsResponse>>, AppError> {
    let request = json_body(payload)?;
    let controller = ShiftController::new(&state);
    Ok(Json(controller.assign(&manager, request).await?))
}

async fn get_shift(
    State(state): State<AppState>,
    Extension(manager): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ShiftDetailsResponse>>, AppError> {
    let controller = ShiftController::new(&state);
    Ok(Json(controller.details(&manager, id).await?))
}

async fn cancel_shift(
    State(state): State<AppState>,
    Extension(manager): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CancelShiftResponse>>, AppError> {
    let controller = ShiftController::new(&state);
    Ok(Json(controller.cancel(&manager, id).await?))
}
