//! Rutas HTTP
//!
//! `/api/driver/*` requiere un JWT válido; `/api/manager/*` además exige rol
//! manager o admin.

pub mod driver_routes;
pub mod manager_routes;

use axum::{
    extract::rejection::JsonRejection,
    middleware::{from_fn, from_fn_with_state},
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::{auth_middleware, cors_for, require_manager};
use crate::state::AppState;
use crate::utils::errors::{invalid_input_error, AppError};

pub use driver_routes::create_driver_router;
pub use manager_routes::create_manager_router;

/// Router completo de la aplicación
pub fn create_router(state: AppState) -> Router {
    let driver = create_driver_router()
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    // La última capa se ejecuta primero: auth antes del chequeo de rol
    let manager = create_manager_router()
        .route_layer(from_fn(require_manager))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/api/driver", driver)
        .nest("/api/manager", manager)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_for(&state.config.cors_origins))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "bin_dispatch",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Los cuerpos JSON mal formados se reportan como `InvalidInput`
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| invalid_input_error(&rejection.body_text()))
}
