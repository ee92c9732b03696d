use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::controllers::ShiftController;
use crate::dto::{
    ApiResponse, CompleteWaypointRequest, CompleteWaypointResponse, EndShiftResponse,
    LocationUpdateRequest, ShiftDetailsResponse, StartShiftResponse,
};
use crate::models::{AuthenticatedUser, DriverLocation, Shift};
use crate::routes::json_body;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_driver_router() -> Router<AppState> {
    Router::new()
        .route("/shift", get(current_shift))
        .route("/shift/start", post(start_shift))
        .route("/shift/pause", post(pause_shift))
        .route("/shift/resume", post(resume_shift))
        .route("/shift/end", post(end_shift))
        .route("/shift/complete", post(complete_waypoint))
        .route("/shift/:id", get(get_shift))
        .route("/location", post(update_location))
}

async fn current_shift(
    State(state): State<AppState>,
    Extension(driver): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Option<ShiftDetailsResponse>>>, AppError> {
    let controller = ShiftController::new(&state);
    Ok(Json(controller.current(&driver).await?))
}

async fn get_shift(
    State(state): State<AppState>,
    Extension(driver): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ShiftDetailsResponse>>, AppError> {
    let controller = ShiftController::new(&state);
    Ok(Json(controller.details(&driver, id).await?))
}

async fn start_shift(
    State(state): State<AppState>,
    Extension(driver): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<StartShiftResponse>>, AppError> {
    let controller = ShiftController::new(&state);
    Ok(Json(controller.start(&driver).await?))
}

async fn pause_shift(
    State(state): State<AppState>,
    Extension(driver): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let controller = ShiftController::new(&state);
    Ok(Json(controller.pause(&driver).await?))
}

async fn resume_shift(
    State(state): State<AppState>,
    Extension(driver): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let controller = ShiftController::new(&state);
    Ok(Json(controller.resume(&driver).await?))
}

async fn end_shift(
    State(state): State<AppState>,
    Extension(driver): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<EndShiftResponse>>, AppError> {
    let controller = ShiftController::new(&state);
    Ok(Json(controller.end(&driver).await?))
}

async fn complete_waypoint(
    State(state): State<AppState>,
    Extension(driver): Extension<AuthenticatedUser>,
    payload: Result<Json<CompleteWaypointRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CompleteWaypointResponse>>, AppError> {
    let request = json_body(payload)?;
    let controller = ShiftController::new(&state);
    Ok(Json(controller.complete(&driver, request).await?))
}

async fn update_location(
    State(state): State<AppState>,
    Extension(driver): Extension<AuthenticatedUser>,
    payload: Result<Json<LocationUpdateRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DriverLocation>>, AppError> {
    let request = json_body(payload)?;
    let controller = ShiftController::new(&state);
    Ok(Json(controller.update_location(&driver, request).await?))
}
