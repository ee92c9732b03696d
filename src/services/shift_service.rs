//! Máquina de estados de turnos
//!
//! `ready -> active <-> paused -> ended`, con `ready|active|paused -> cancelled`.
//! Cada transición toma el lock del conductor, valida precondiciones antes
//! de escribir y delega la escritura en una unidad transaccional del
//! repositorio con guarda sobre el estado esperado.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::config::EnvironmentConfig;
use crate::dto::{
    AssignShiftRequest, CancelShiftResponse, EndShiftResponse, ShiftDetailsResponse,
    StartShiftResponse,
};
use crate::models::{
    AuthenticatedUser, GeoPoint, MoveRequest, MoveRequestStatus, MoveType, Shift, ShiftStatus,
    StopType, UserRole, Waypoint,
};
use crate::repositories::{DispatchRepository, NewShiftPlan, StartShiftUpdate};
use crate::services::driver_locks::DriverLocks;
use crate::services::notification_service::{DispatchMessage, Notifier};
use crate::services::progress::LogicalProgress;
use crate::services::push_service::{PushMessage, PushSender};
use crate::services::route_sequencer::{RouteSequencer, SequencerStop};
use crate::services::shift_history_recorder::{
    ShiftHistoryRecorder, ShiftTermination, TerminationTrigger,
};
use crate::services::side_effects::SideEffectRunner;
use crate::utils::errors::{
    internal_error, invalid_input_error, not_found_error, precondition_error, AppError, AppResult,
};

/// Parámetros de la máquina de estados
#[derive(Debug, Clone)]
pub struct ShiftSettings {
    pub gps_fix_max_age_secs: i64,
    /// Destino de los dropoffs de `pickup_only`
    pub depot_location: Option<GeoPoint>,
}

impl From<&EnvironmentConfig> for ShiftSettings {
    fn from(config: &EnvironmentConfig) -> Self {
        Self {
            gps_fix_max_age_secs: config.gps_fix_max_age_secs,
            depot_location: config.depot_location,
        }
    }
}

pub struct ShiftService {
    repository: Arc<dyn DispatchRepository>,
    sequencer: RouteSequencer,
    recorder: ShiftHistoryRecorder,
    notifier: Arc<dyn Notifier>,
    push: Arc<dyn PushSender>,
    side_effects: Arc<SideEffectRunner>,
    locks: Arc<DriverLocks>,
    settings: ShiftSettings,
}

impl ShiftService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn DispatchRepository>,
        sequencer: RouteSequencer,
        notifier: Arc<dyn Notifier>,
        push: Arc<dyn PushSender>,
        side_effects: Arc<SideEffectRunner>,
        locks: Arc<DriverLocks>,
        settings: ShiftSettings,
    ) -> Self {
        Self {
            recorder: ShiftHistoryRecorder::new(repository.clone()),
            repository,
            sequencer,
            notifier,
            push,
            side_effects,
            locks,
            settings,
        }
    }

    /// Crea un turno `ready` para un conductor
    pub async fn assign(
        &self,
        actor: &AuthenticatedUser,
        request: AssignShiftRequest,
    ) -> AppResult<ShiftDetailsResponse> {
        if !actor.role.is_manager() {
            return Err(AppError::Forbidden("Only managers can assign shifts".to_string()));
        }
        request.validate()?;

        let route_order = match request.route_id {
            Some(route_id) => Some(
                self.repository
                    .route_bin_order(route_id)
                    .await?
                    .ok_or_else(|| not_found_error("Route", &route_id.to_string()))?,
            ),
            None => None,
        };

        let bin_ids = if request.bin_ids.is_empty() {
            route_order.clone().unwrap_or_default()
        } else {
            request.bin_ids.clone()
        };
        if bin_ids.is_empty() {
            return Err(invalid_input_error("At least one bin is required"));
        }
        if bin_ids.iter().collect::<HashSet<_>>().len() != bin_ids.len() {
            return Err(invalid_input_error("Bin list contains duplicates"));
        }

        let bins = self.repository.find_bins(&bin_ids).await?;
        if bins.len() != bin_ids.len() {
            let known: HashSet<Uuid> = bins.iter().map(|b| b.id).collect();
            let unknown: Vec<String> = bin_ids
                .iter()
                .filter(|id| !known.contains(id))
                .map(|id| id.to_string())
                .collect();
            return Err(AppError::InvalidInput(format!(
                "Unknown bins: {}",
                unknown.join(", ")
            )));
        }

        let move_requests = self.load_pending_move_requests(&request.move_request_ids).await?;
        let requested_bins: HashSet<Uuid> = bin_ids.iter().copied().collect();
        if let Some(overlap) = move_requests.iter().find(|mr| requested_bins.contains(&mr.bin_id)) {
            return Err(AppError::InvalidInput(format!(
                "Bin {} is both a regular stop and the subject of move request {}",
                overlap.bin_id, overlap.id
            )));
        }

        let _guard = self.locks.acquire(request.driver_id).await;

        if self
            .repository
            .find_driver_shift(request.driver_id, &[ShiftStatus::Ready])
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Driver already has a ready shift".to_string()));
        }

        let now = Utc::now();
        let mut shift = Shift::new_ready(request.driver_id, request.route_id, 0, now);

        let positions: HashMap<Uuid, i32> = route_order
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, bin_id)| (bin_id, index as i32 + 1))
            .collect();

        let mut waypoints: Vec<Waypoint> = bin_ids
            .iter()
            .map(|bin_id| {
                let sequence = positions.get(bin_id).copied().unwrap_or(0);
                Waypoint::new(shift.id, *bin_id, sequence, StopType::Regular, None, now)
            })
            .collect();
        for mr in &move_requests {
            waypoints.push(Waypoint::new(shift.id, mr.bin_id, 0, StopType::Pickup, Some(mr.id), now));
            waypoints.push(Waypoint::new(shift.id, mr.bin_id, 0, StopType::Dropoff, Some(mr.id), now));
        }
        shift.total_bins = waypoints.len() as i32;

        let created = self
            .repository
            .create_shift(NewShiftPlan {
                shift,
                waypoints,
                move_request_ids: move_requests.iter().map(|mr| mr.id).collect(),
            })
            .await?;

        tracing::info!(
            "🗓️ Shift {} assigned to driver {} by {} ({} waypoints, {} move requests)",
            created.id,
            created.driver_id,
            actor.user_id,
            created.total_bins,
            move_requests.len()
        );

        let details = self.details(created).await?;

        self.notifier
            .deliver_to_user(
                details.shift.driver_id,
                DispatchMessage::RouteAssigned {
                    shift_id: details.shift.id,
                    route_id: details.shift.route_id,
                    total_bins: details.progress.total,
                },
            )
            .await;
        self.announce_status(&details.shift).await;
        for mr in &move_requests {
            self.announce_move_request(mr.id, mr.bin_id, MoveRequestStatus::Assigned, Some(details.shift.id))
                .await;
        }
        self.push_to(
            details.shift.driver_id,
            "New route assigned",
            format!("You have a new route with {} stops", details.progress.total),
        )
        .await;

        Ok(details)
    }

    async fn load_pending_move_requests(&self, ids: &[Uuid]) -> AppResult<Vec<MoveRequest>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.iter().collect::<HashSet<_>>().len() != ids.len() {
            return Err(invalid_input_error("Move request list contains duplicates"));
        }

        let found = self.repository.find_move_requests(ids).await?;
        let mut by_id: HashMap<Uuid, MoveRequest> = found.into_iter().map(|r| (r.id, r)).collect();

        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            let request = by_id
                .remove(id)
                .ok_or_else(|| not_found_error("Move request", &id.to_string()))?;
            if request.status != MoveRequestStatus::Pending {
                return Err(AppError::Conflict(format!(
                    "Move request {} is {}, expected pending",
                    id,
                    request.status.as_str()
                )));
            }
            requests.push(request);
        }
        Ok(requests)
    }

    /// Inicia el turno `ready` del conductor, cerrando antes el que siga en curso
    pub async fn start(&self, driver: &AuthenticatedUser) -> AppResult<StartShiftResponse> {
        let _guard = self.locks.acquire(driver.user_id).await;

        let ready = self
            .repository
            .find_driver_shift(driver.user_id, &[ShiftStatus::Ready])
            .await?
            .ok_or_else(|| precondition_error("No ready shift to start"))?;

        let now = Utc::now();
        let location = self
            .repository
            .driver_location(driver.user_id)
            .await?
            .filter(|fix| fix.is_fresh(now, self.settings.gps_fix_max_age_secs))
            .ok_or_else(|| precondition_error("No current GPS location; enable GPS and retry"))?;

        // Todo lo que puede fallar se resuelve antes de cerrar el turno anterior
        let waypoints = self.repository.shift_waypoints(ready.id).await?;
        let stops = self.sequencer_stops(&waypoints).await?;
        let plan = self.sequencer.sequence(location.point(), &stops);

        let previous_shift = match self
            .repository
            .find_driver_shift(driver.user_id, &ShiftStatus::RUNNING)
            .await?
        {
            Some(running) => {
                tracing::info!(
                    "⏹️ Auto-ending shift {} of driver {} before starting {}",
                    running.id,
                    driver.user_id,
                    ready.id
                );
                let termination = self
                    .recorder
                    .record_termination(
                        &running,
                        Some(driver.user_id),
                        TerminationTrigger::SupersededByStart,
                        now,
                    )
                    .await?;
                self.after_termination(&termination).await;
                Some(end_response(termination))
            }
            None => None,
        };

        let started = self
            .repository
            .start_shift(StartShiftUpdate {
                shift_id: ready.id,
                positions: plan.positions(),
                started_at: now,
            })
            .await?;

        tracing::info!(
            "▶️ Shift {} of driver {}: ready -> active ({:?}, {} stops)",
            started.id,
            driver.user_id,
            plan.mode,
            plan.order.len()
        );

        let details = self.details(started).await?;
        self.notifier
            .deliver_to_user(
                driver.user_id,
                DispatchMessage::ShiftUpdate {
                    shift: details.shift.clone(),
                    waypoints: details.waypoints.clone(),
                    progress: details.progress,
                },
            )
            .await;
        self.announce_status(&details.shift).await;

        Ok(StartShiftResponse {
            details,
            sequencing_mode: plan.mode,
            previous_shift,
        })
    }

    /// Ubicación de cada waypoint para el secuenciador
    async fn sequencer_stops(&self, waypoints: &[Waypoint]) -> AppResult<Vec<SequencerStop>> {
        let bin_ids: Vec<Uuid> = waypoints
            .iter()
            .map(|w| w.bin_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let bins: HashMap<Uuid, _> = self
            .repository
            .find_bins(&bin_ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        let request_ids: Vec<Uuid> = waypoints
            .iter()
            .filter_map(|w| w.move_request_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let requests: HashMap<Uuid, MoveRequest> = if request_ids.is_empty() {
            HashMap::new()
        } else {
            self.repository
                .find_move_requests(&request_ids)
                .await?
                .into_iter()
                .map(|r| (r.id, r))
                .collect()
        };

        let pickups: HashMap<Uuid, Uuid> = waypoints
            .iter()
            .filter(|w| w.stop_type == StopType::Pickup)
            .filter_map(|w| w.move_request_id.map(|mr| (mr, w.id)))
            .collect();

        let mut stops = Vec::with_capacity(waypoints.len());
        for waypoint in waypoints {
            let bin = bins
                .get(&waypoint.bin_id)
                .ok_or_else(|| internal_error("Waypoint references a missing bin"))?;
            let request = waypoint.move_request_id.and_then(|id| requests.get(&id));

            let (location, fill_percentage, after) = match (waypoint.stop_type, request) {
                (StopType::Pickup, Some(request)) => {
                    (request.original_location(), bin.fill_percentage, None)
                }
                (StopType::Dropoff, Some(request)) => {
                    let destination = match request.move_type {
                        MoveType::Relocation => request.new_location(),
                        MoveType::PickupOnly => self.settings.depot_location,
                    }
                    .unwrap_or_else(|| request.original_location());
                    let after = pickups.get(&request.id).copied();
                    (destination, None, after)
                }
                _ => (bin.location(), bin.fill_percentage, None),
            };

            stops.push(SequencerStop {
                waypoint_id: waypoint.id,
                location,
                fill_percentage,
                sequence_order: waypoint.sequence_order,
                after,
            });
        }
        Ok(stops)
    }

    pub async fn pause(&self, driver: &AuthenticatedUser) -> AppResult<Shift> {
        let _guard = self.locks.acquire(driver.user_id).await;

        let shift = self
            .repository
            .find_driver_shift(driver.user_id, &[ShiftStatus::Active])
            .await?
            .ok_or_else(|| precondition_error("No active shift to pause"))?;

        let paused = self.repository.pause_shift(shift.id, Utc::now()).await?;
        tracing::info!("⏸️ Shift {} of driver {}: active -> paused", paused.id, driver.user_id);

        self.announce_status(&paused).await;
        Ok(paused)
    }

    pub async fn resume(&self, driver: &AuthenticatedUser) -> AppResult<Shift> {
        let _guard = self.locks.acquire(driver.user_id).await;

        let shift = self
            .repository
            .find_driver_shift(driver.user_id, &[ShiftStatus::Paused])
            .await?
            .ok_or_else(|| precondition_error("No paused shift to resume"))?;

        let now = Utc::now();
        let added = shift
            .pause_started_at
            .map(|started| (now - started).num_seconds().max(0))
            .unwrap_or(0);

        let resumed = self.repository.resume_shift(shift.id, added, now).await?;
        tracing::info!(
            "▶️ Shift {} of driver {}: paused -> active (+{}s pause, {}s total)",
            resumed.id,
            driver.user_id,
            added,
            resumed.total_pause_seconds
        );

        self.announce_status(&resumed).await;
        Ok(resumed)
    }

    /// Termina el turno en curso; falla sin cambios si el historial no se escribe
    pub async fn end(&self, driver: &AuthenticatedUser) -> AppResult<EndShiftResponse> {
        let _guard = self.locks.acquire(driver.user_id).await;

        let running = self
            .repository
            .find_driver_shift(driver.user_id, &ShiftStatus::RUNNING)
            .await?
            .ok_or_else(|| precondition_error("No active shift to end"))?;

        let termination = self
            .recorder
            .record_termination(
                &running,
                Some(driver.user_id),
                TerminationTrigger::DriverEnded,
                Utc::now(),
            )
            .await?;

        tracing::info!(
            "⏹️ Shift {} of driver {}: {} -> ended ({:?})",
            running.id,
            driver.user_id,
            running.status,
            termination.history.end_reason
        );

        self.after_termination(&termination).await;
        Ok(end_response(termination))
    }

    /// Cancelación por un manager; no escribe historial
    pub async fn cancel(
        &self,
        actor: &AuthenticatedUser,
        shift_id: Uuid,
    ) -> AppResult<CancelShiftResponse> {
        if !actor.role.is_manager() {
            return Err(AppError::Forbidden("Only managers can cancel shifts".to_string()));
        }

        let shift = self
            .repository
            .find_shift(shift_id)
            .await?
            .ok_or_else(|| not_found_error("Shift", &shift_id.to_string()))?;

        let _guard = self.locks.acquire(shift.driver_id).await;

        // Releer bajo el lock del conductor
        let shift = self
            .repository
            .find_shift(shift_id)
            .await?
            .ok_or_else(|| not_found_error("Shift", &shift_id.to_string()))?;
        if !shift.status.can_transition_to(ShiftStatus::Cancelled) {
            return Err(AppError::Conflict(format!(
                "Shift is already {}",
                shift.status
            )));
        }

        let outcome = self.repository.cancel_shift(shift_id, Utc::now()).await?;
        tracing::info!(
            "🛑 Shift {} of driver {}: {} -> cancelled by {} ({} move requests reverted, {} waypoints removed)",
            shift_id,
            shift.driver_id,
            shift.status,
            actor.user_id,
            outcome.reverted_move_requests.len(),
            outcome.removed_waypoints
        );

        self.notifier
            .deliver_to_user(
                shift.driver_id,
                DispatchMessage::ShiftCancelled {
                    shift_id,
                    cancelled_by: actor.user_id,
                },
            )
            .await;
        self.announce_status(&outcome.shift).await;
        self.announce_reverted(&outcome.reverted_move_requests).await;
        self.push_to(
            shift.driver_id,
            "Shift cancelled",
            "Your current shift was cancelled by a manager".to_string(),
        )
        .await;

        Ok(CancelShiftResponse {
            shift: outcome.shift,
            reverted_move_requests: outcome.reverted_move_requests,
            removed_waypoints: outcome.removed_waypoints,
        })
    }

    /// Turno listo, activo o pausado del conductor (el que está en curso primero)
    pub async fn current_shift(
        &self,
        driver: &AuthenticatedUser,
    ) -> AppResult<Option<ShiftDetailsResponse>> {
        match self
            .repository
            .find_driver_shift(driver.user_id, &ShiftStatus::OPEN)
            .await?
        {
            Some(shift) => Ok(Some(self.details(shift).await?)),
            None => Ok(None),
        }
    }

    pub async fn shift_details(
        &self,
        user: &AuthenticatedUser,
        shift_id: Uuid,
    ) -> AppResult<ShiftDetailsResponse> {
        let shift = self
            .repository
            .find_shift(shift_id)
            .await?
            .ok_or_else(|| not_found_error("Shift", &shift_id.to_string()))?;

        if !user.role.is_manager() && shift.driver_id != user.user_id {
            return Err(AppError::Forbidden("Shift belongs to another driver".to_string()));
        }
        self.details(shift).await
    }

    async fn details(&self, shift: Shift) -> AppResult<ShiftDetailsResponse> {
        let waypoints = self.repository.shift_waypoints(shift.id).await?;
        let progress = LogicalProgress::from_waypoints(&waypoints);
        Ok(ShiftDetailsResponse {
            shift,
            waypoints,
            progress,
        })
    }

    async fn after_termination(&self, termination: &ShiftTermination) {
        self.announce_status(&termination.outcome.shift).await;
        self.announce_reverted(&termination.outcome.reverted_move_requests)
            .await;
    }

    async fn announce_status(&self, shift: &Shift) {
        self.notifier
            .deliver_to_role(
                UserRole::Manager,
                DispatchMessage::DriverShiftChange {
                    driver_id: shift.driver_id,
                    shift_id: shift.id,
                    status: shift.status,
                },
            )
            .await;
    }

    async fn announce_reverted(&self, request_ids: &[Uuid]) {
        if request_ids.is_empty() {
            return;
        }
        let requests = match self.repository.find_move_requests(request_ids).await {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!("⚠️ Could not load reverted move requests: {}", e);
                return;
            }
        };
        for request in requests {
            self.announce_move_request(request.id, request.bin_id, request.status, None)
                .await;
        }
    }

    async fn announce_move_request(
        &self,
        move_request_id: Uuid,
        bin_id: Uuid,
        status: MoveRequestStatus,
        shift_id: Option<Uuid>,
    ) {
        self.notifier
            .deliver_to_role(
                UserRole::Manager,
                DispatchMessage::MoveRequestStatusUpdated {
                    move_request_id,
                    bin_id,
                    status,
                    shift_id,
                },
            )
            .await;
    }

    /// Push best-effort al dispositivo registrado del usuario
    async fn push_to(&self, user_id: Uuid, title: &str, body: String) {
        let token = match self.repository.device_token(user_id).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!("📲 No device token for user {}", user_id);
                return;
            }
            Err(e) => {
                tracing::warn!("⚠️ Could not load device token for {}: {}", user_id, e);
                return;
            }
        };

        let message = PushMessage {
            to: token,
            title: title.to_string(),
            body,
        };
        let push = self.push.clone();
        self.side_effects
            .spawn("push notification", move || {
                let push = push.clone();
                let message = message.clone();
                async move { push.send(&message).await }
            })
            .await;
    }
}

fn end_response(termination: ShiftTermination) -> EndShiftResponse {
    EndShiftResponse {
        end_reason: termination.history.end_reason,
        total_duration_seconds: termination.durations.total_seconds,
        active_duration_seconds: termination.durations.active_seconds,
        total_pause_seconds: termination.durations.pause_seconds,
        completion_rate: termination.history.completion_rate,
        shift: termination.outcome.shift,
        reverted_move_requests: termination.outcome.reverted_move_requests,
        removed_waypoints: termination.outcome.removed_waypoints,
        history: termination.history,
    }
}
