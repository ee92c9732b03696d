//! Procesador de paradas completadas
//!
//! Valida y registra la finalización de un waypoint del turno activo:
//! marca el waypoint, el contador físico del turno, la revisión del
//! contenedor y el check inmutable en una sola unidad; después finaliza la
//! move request si la parada es un dropoff, lanza el incidente si lo hay y
//! publica el progreso lógico al conductor.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{CompleteWaypointRequest, CompleteWaypointResponse};
use crate::models::{
    AuthenticatedUser, Check, CheckSource, IncidentType, MoveRequest, MoveRequestStatus,
    ShiftStatus, StopType, UserRole, Waypoint,
};
use crate::repositories::{CompletedWaypoint, DispatchRepository, WaypointCompletion};
use crate::services::driver_locks::DriverLocks;
use crate::services::incident_service::{IncidentReport, IncidentReporter};
use crate::services::move_request_finalizer::MoveRequestFinalizer;
use crate::services::notification_service::{DispatchMessage, Notifier};
use crate::services::progress::LogicalProgress;
use crate::services::side_effects::SideEffectRunner;
use crate::utils::errors::{invalid_input_error, precondition_error, AppError, AppResult};

/// Incidente ya validado
#[derive(Debug, Clone)]
struct ValidatedIncident {
    incident_type: IncidentType,
    description: Option<String>,
    photo_url: Option<String>,
}

pub struct BinCompletionService {
    repository: Arc<dyn DispatchRepository>,
    finalizer: MoveRequestFinalizer,
    notifier: Arc<dyn Notifier>,
    incidents: Arc<dyn IncidentReporter>,
    side_effects: Arc<SideEffectRunner>,
    locks: Arc<DriverLocks>,
}

impl BinCompletionService {
    pub fn new(
        repository: Arc<dyn DispatchRepository>,
        notifier: Arc<dyn Notifier>,
        incidents: Arc<dyn IncidentReporter>,
        side_effects: Arc<SideEffectRunner>,
        locks: Arc<DriverLocks>,
    ) -> Self {
        Self {
            finalizer: MoveRequestFinalizer::new(repository.clone()),
            repository,
            notifier,
            incidents,
            side_effects,
            locks,
        }
    }

    /// Reglas de entrada previas a cualquier escritura
    fn validate(request: &CompleteWaypointRequest) -> AppResult<Option<ValidatedIncident>> {
        request.validate()?;

        if request.shift_bin_id.is_none() && request.bin_id.is_none() {
            return Err(invalid_input_error("shift_bin_id is required"));
        }

        let incident = match &request.incident {
            Some(incident) => {
                let incident_type = IncidentType::parse(&incident.incident_type).ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "Unknown incident type '{}'",
                        incident.incident_type
                    ))
                })?;
                let description = incident
                    .description
                    .as_ref()
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty());
                let photo_url = incident.photo_url.clone().or_else(|| request.photo_url.clone());
                if description.is_none() && photo_url.is_none() {
                    return Err(invalid_input_error(
                        "An incident needs a photo or a description",
                    ));
                }
                Some(ValidatedIncident {
                    incident_type,
                    description,
                    photo_url,
                })
            }
            None => None,
        };

        if incident.is_none()
            && request.photo_url.is_none()
            && request.updated_fill_percentage.is_none()
        {
            return Err(invalid_input_error(
                "A photo or a fill percentage is required to complete a stop",
            ));
        }

        Ok(incident)
    }

    /// Resuelve el waypoint objetivo dentro del turno
    fn resolve_target(
        waypoints: &[Waypoint],
        request: &CompleteWaypointRequest,
    ) -> AppResult<Waypoint> {
        if let Some(waypoint_id) = request.shift_bin_id {
            return waypoints
                .iter()
                .find(|w| w.id == waypoint_id)
                .cloned()
                .ok_or_else(|| AppError::Conflict("Waypoint not found in this shift".to_string()));
        }

        // Ruta heredada por bin_id: solo válida si no hay ambigüedad
        let bin_id = request
            .bin_id
            .ok_or_else(|| invalid_input_error("shift_bin_id is required"))?;
        let mut candidates: Vec<&Waypoint> = waypoints
            .iter()
            .filter(|w| w.bin_id == bin_id && !w.is_completed)
            .collect();

        match candidates.len() {
            0 => Err(AppError::Conflict(
                "Waypoint already completed or not found".to_string(),
            )),
            1 => Ok(candidates.remove(0).clone()),
            _ => Err(AppError::Conflict(
                "Bin appears more than once in this shift; use shift_bin_id".to_string(),
            )),
        }
    }

    pub async fn complete(
        &self,
        driver: &AuthenticatedUser,
        request: CompleteWaypointRequest,
    ) -> AppResult<CompleteWaypointResponse> {
        let incident = Self::validate(&request)?;
        let _guard = self.locks.acquire(driver.user_id).await;

        let shift = self
            .repository
            .find_driver_shift(driver.user_id, &[ShiftStatus::Active])
            .await?
            .ok_or_else(|| precondition_error("No active shift"))?;

        let waypoints = self.repository.shift_waypoints(shift.id).await?;
        let target = Self::resolve_target(&waypoints, &request)?;

        let move_request = match target.move_request_id {
            Some(id) => self
                .repository
                .find_move_request(id)
                .await?
                .filter(|mr| {
                    mr.status == MoveRequestStatus::InProgress
                        && mr.assigned_shift_id == Some(shift.id)
                }),
            None => None,
        };

        let now = Utc::now();
        let check = Check {
            id: Uuid::new_v4(),
            bin_id: target.bin_id,
            shift_id: Some(shift.id),
            shift_bin_id: Some(target.id),
            source: CheckSource::Shift,
            fill_percentage: request.updated_fill_percentage,
            photo_url: request.photo_url.clone(),
            checked_by: driver.user_id,
            checked_at: now,
            incident_type: incident.as_ref().map(|i| i.incident_type.as_str().to_string()),
            field_observation: incident.is_some()
                && request.photo_url.is_none()
                && request.updated_fill_percentage.is_none(),
        };
        let completed = self
            .repository
            .complete_waypoint(WaypointCompletion {
                waypoint_id: target.id,
                fill_percentage: request.updated_fill_percentage,
                record_bin_check: move_request.is_none(),
                check,
                at: now,
            })
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Waypoint already completed or not found".to_string())
            })?;
        let CompletedWaypoint {
            waypoint, check, ..
        } = completed;

        tracing::info!(
            "✅ Waypoint {} ({}) completed on shift {} by driver {}",
            waypoint.id,
            waypoint.stop_type.as_str(),
            shift.id,
            driver.user_id
        );

        let finalized = match &move_request {
            Some(mr) => self.handle_move_stop(mr, &waypoint, shift.id, driver.user_id).await,
            None => None,
        };

        let incident_reported = match incident {
            Some(incident) => {
                self.spawn_incident(incident, waypoint.bin_id, check.id, driver.user_id)
                    .await
            }
            None => false,
        };

        // Sin lecturas tras el commit: el progreso sale de la lista ya cargada
        let mut refreshed = waypoints;
        if let Some(slot) = refreshed.iter_mut().find(|w| w.id == waypoint.id) {
            *slot = waypoint.clone();
        }
        let progress = LogicalProgress::from_waypoints(&refreshed);
        self.notifier
            .deliver_to_user(
                driver.user_id,
                DispatchMessage::ShiftProgress {
                    shift_id: shift.id,
                    completed_bins: progress.completed,
                    total_bins: progress.total,
                    percentage: progress.percentage,
                },
            )
            .await;

        Ok(CompleteWaypointResponse {
            waypoint,
            check_id: check.id,
            progress,
            move_request: finalized.or(move_request),
            incident_reported,
        })
    }

    /// Pickup: nada que finalizar. Dropoff: delega en el finalizador; un
    /// fallo se registra sin deshacer la parada ya completada.
    async fn handle_move_stop(
        &self,
        request: &MoveRequest,
        waypoint: &Waypoint,
        shift_id: Uuid,
        driver_id: Uuid,
    ) -> Option<MoveRequest> {
        if waypoint.stop_type != StopType::Dropoff {
            return None;
        }

        match self
            .finalizer
            .finalize(request, shift_id, driver_id, waypoint.completed_at.unwrap_or_else(Utc::now))
            .await
        {
            Ok(completed) => {
                self.notifier
                    .deliver_to_role(
                        UserRole::Manager,
                        DispatchMessage::MoveRequestStatusUpdated {
                            move_request_id: completed.id,
                            bin_id: completed.bin_id,
                            status: completed.status,
                            shift_id: Some(shift_id),
                        },
                    )
                    .await;
                Some(completed)
            }
            Err(e) => {
                tracing::error!(
                    "❌ Failed to finalize move request {} on shift {}: {}",
                    request.id,
                    shift_id,
                    e
                );
                None
            }
        }
    }

    async fn spawn_incident(
        &self,
        incident: ValidatedIncident,
        bin_id: Uuid,
        check_id: Uuid,
        reported_by: Uuid,
    ) -> bool {
        let bin = match self.repository.find_bin(bin_id).await {
            Ok(Some(bin)) => bin,
            Ok(None) => {
                tracing::warn!("⚠️ Bin {} missing, incident for check {} skipped", bin_id, check_id);
                return false;
            }
            Err(e) => {
                tracing::warn!("⚠️ Could not load bin {} for incident: {}", bin_id, e);
                return false;
            }
        };

        let report = IncidentReport {
            latitude: bin.latitude,
            longitude: bin.longitude,
            incident_type: incident.incident_type,
            check_id,
            description: incident.description,
            photo_url: incident.photo_url,
            reported_by,
        };
        let reporter = self.incidents.clone();
        self.side_effects
            .spawn("incident report", move || {
                let reporter = reporter.clone();
                let report = report.clone();
                async move { reporter.report(&report).await }
            })
            .await;
        true
    }
}
