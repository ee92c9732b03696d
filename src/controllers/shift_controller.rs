//! Controller de turnos
//!
//! Traduce las operaciones del motor de despacho a respuestas
//! `ApiResponse` de la API. La lógica vive en los servicios.

use std::sync::Arc;

use uuid::Uuid;

use crate::dto::{
    ApiResponse, AssignShiftRequest, CancelShiftResponse, CompleteWaypointRequest,
    CompleteWaypointResponse, EndShiftResponse, LocationUpdateRequest, ShiftDetailsResponse,
    StartShiftResponse,
};
use crate::models::{AuthenticatedUser, DriverLocation, Shift};
use crate::services::{BinCompletionService, LocationService, ShiftService};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct ShiftController {
    shifts: Arc<ShiftService>,
    completions: Arc<BinCompletionService>,
    locations: Arc<LocationService>,
}

impl ShiftController {
    pub fn new(state: &AppState) -> Self {
        Self {
            shifts: state.shifts.clone(),
            completions: state.completions.clone(),
            locations: state.locations.clone(),
        }
    }

    pub async fn assign(
        &self,
        manager: &AuthenticatedUser,
        request: AssignShiftRequest,
    ) -> Result<ApiResponse<ShiftDetailsResponse>, AppError> {
        let details = self.shifts.assign(manager, request).await?;
        Ok(ApiResponse::success_with_message(
            details,
            "Turno asignado exitosamente",
        ))
    }

    pub async fn current(
        &self,
        driver: &AuthenticatedUser,
    ) -> Result<ApiResponse<Option<ShiftDetailsResponse>>, AppError> {
        let current = self.shifts.current_shift(driver).await?;
        let message = if current.is_some() {
            "Turno actual"
        } else {
            "Sin turno asignado"
        };
        Ok(ApiResponse::success_with_message(current, message))
    }

    pub async fn details(
        &self,
        user: &AuthenticatedUser,
        shift_id: Uuid,
    ) -> Result<ApiResponse<ShiftDetailsResponse>, AppError> {
        let details = self.shifts.shift_details(user, shift_id).await?;
        Ok(ApiResponse::success(details))
    }

    pub async fn start(
        &self,
        driver: &AuthenticatedUser,
    ) -> Result<ApiResponse<StartShiftResponse>, AppError> {
        let started = self.shifts.start(driver).await?;
        let message = if started.previous_shift.is_some() {
            "Turno iniciado; el turno anterior fue cerrado"
        } else {
            "Turno iniciado"
        };
        Ok(ApiResponse::success_with_message(started, message))
    }

    pub async fn pause(&self, driver: &AuthenticatedUser) -> Result<ApiResponse<Shift>, AppError> {
        let shift = self.shifts.pause(driver).await?;
        Ok(ApiResponse::success_with_message(shift, "Turno pausado"))
    }

    pub async fn resume(&self, driver: &AuthenticatedUser) -> Result<ApiResponse<Shift>, AppError> {
        let shift = self.shifts.resume(driver).await?;
        Ok(ApiResponse::success_with_message(shift, "Turno reanudado"))
    }

    pub async fn end(
        &self,
        driver: &AuthenticatedUser,
    ) -> Result<ApiResponse<EndShiftResponse>, AppError> {
        let ended = self.shifts.end(driver).await?;
        Ok(ApiResponse::success_with_message(ended, "Turno finalizado"))
    }

    pub async fn cancel(
        &self,
        manager: &AuthenticatedUser,
        shift_id: Uuid,
    ) -> Result<ApiResponse<CancelShiftResponse>, AppError> {
        let cancelled = self.shifts.cancel(manager, shift_id).await?;
        Ok(ApiResponse::success_with_message(cancelled, "Turno cancelado"))
    }

    pub async fn complete(
        &self,
        driver: &AuthenticatedUser,
        request: CompleteWaypointRequest,
    ) -> Result<ApiResponse<CompleteWaypointResponse>, AppError> {
        let completed = self.completions.complete(driver, request).await?;
        Ok(ApiResponse::success_with_message(completed, "Parada completada"))
    }

    pub async fn update_location(
        &self,
        driver: &AuthenticatedUser,
        request: LocationUpdateRequest,
    ) -> Result<ApiResponse<DriverLocation>, AppError> {
        let location = self.locations.update(driver, request).await?;
        Ok(ApiResponse::success(location))
    }
}
