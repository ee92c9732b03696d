//! Implementación en memoria del repositorio de despacho
//!
//! Reproduce las garantías de la implementación PostgreSQL: cada método se
//! aplica completo bajo un único `RwLock` de escritura, las transiciones
//! usan guardas sobre el estado esperado y se respetan los mismos índices
//! únicos (un turno listo y un turno en curso por conductor).
//! Se usa en los tests y con `STORAGE=memory`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::dispatch_repository::{
    CompletedWaypoint, DispatchRepository, EndShiftUpdate, MoveFinalization, NewShiftPlan,
    StartShiftUpdate, TerminationOutcome, WaypointCompletion,
};
use crate::models::{
    Bin, BinStatus, Check, CheckRecommendation, DriverLocation, IncidentStats, MoveHistory,
    MoveRequest, MoveRequestStatus, Shift, ShiftHistory, ShiftStatus, Waypoint,
};
use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Default)]
struct MemoryState {
    bins: HashMap<Uuid, Bin>,
    routes: HashMap<Uuid, Vec<Uuid>>,
    move_requests: HashMap<Uuid, MoveRequest>,
    shifts: HashMap<Uuid, Shift>,
    waypoints: HashMap<Uuid, Waypoint>,
    history: Vec<ShiftHistory>,
    checks: Vec<Check>,
    recommendations: Vec<CheckRecommendation>,
    move_history: Vec<MoveHistory>,
    locations: HashMap<Uuid, DriverLocation>,
    device_tokens: HashMap<Uuid, String>,
}

impl MemoryState {
    fn driver_has(&self, driver_id: Uuid, statuses: &[ShiftStatus], except: Uuid) -> bool {
        self.shifts.values().any(|s| {
            s.driver_id == driver_id && s.id != except && statuses.contains(&s.status)
        })
    }

    fn revert_move_requests(&mut self, shift_id: Uuid, at: DateTime<Utc>) -> Vec<Uuid> {
        let mut reverted = Vec::new();
        for request in self.move_requests.values_mut() {
            let open = matches!(
                request.status,
                MoveRequestStatus::Assigned | MoveRequestStatus::InProgress
            );
            if request.assigned_shift_id == Some(shift_id) && open {
                request.status = MoveRequestStatus::Pending;
                request.assigned_shift_id = None;
                request.updated_at = at;
                reverted.push(request.id);
            }
        }
        reverted.sort();
        reverted
    }

    fn sorted_waypoints(&self, shift_id: Uuid) -> Vec<Waypoint> {
        let mut waypoints: Vec<Waypoint> = self
            .waypoints
            .values()
            .filter(|w| w.shift_id == shift_id)
            .cloned()
            .collect();
        waypoints.sort_by(|a, b| {
            a.sequence_order
                .cmp(&b.sequence_order)
                .then_with(|| a.id.cmp(&b.id))
        });
        waypoints
    }
}

#[derive(Debug, Default)]
pub struct MemoryDispatchRepository {
    state: RwLock<MemoryState>,
    fail_history_writes: AtomicBool,
    fail_move_finalization: AtomicBool,
    fail_check_inserts: AtomicBool,
}

impl MemoryDispatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_bin(&self, bin: Bin) {
        self.state.write().await.bins.insert(bin.id, bin);
    }

    pub async fn remove_bin(&self, bin_id: Uuid) {
        self.state.write().await.bins.remove(&bin_id);
    }

    /// Registra una ruta predefinida con su orden de contenedores
    pub async fn insert_route(&self, route_id: Uuid, bin_ids: Vec<Uuid>) {
        self.state.write().await.routes.insert(route_id, bin_ids);
    }

    pub async fn insert_move_request(&self, request: MoveRequest) {
        self.state.write().await.move_requests.insert(request.id, request);
    }

    pub async fn insert_device_token(&self, user_id: Uuid, token: &str) {
        self.state
            .write()
            .await
            .device_tokens
            .insert(user_id, token.to_string());
    }

    pub async fn insert_recommendation(&self, recommendation: CheckRecommendation) {
        self.state.write().await.recommendations.push(recommendation);
    }

    pub async fn checks(&self) -> Vec<Check> {
        self.state.read().await.checks.clone()
    }

    pub async fn recommendations(&self) -> Vec<CheckRecommendation> {
        self.state.read().await.recommendations.clone()
    }

    pub async fn all_history(&self) -> Vec<ShiftHistory> {
        self.state.read().await.history.clone()
    }

    pub async fn driver_shifts(&self, driver_id: Uuid) -> Vec<Shift> {
        let state = self.state.read().await;
        let mut shifts: Vec<Shift> = state
            .shifts
            .values()
            .filter(|s| s.driver_id == driver_id)
            .cloned()
            .collect();
        shifts.sort_by_key(|s| s.created_at);
        shifts
    }

    /// Simula un fallo al insertar historial
    pub fn set_fail_history_writes(&self, fail: bool) {
        self.fail_history_writes.store(fail, Ordering::SeqCst);
    }

    /// Simula un fallo al insertar checks al completar paradas
    pub fn set_fail_check_inserts(&self, fail: bool) {
        self.fail_check_inserts.store(fail, Ordering::SeqCst);
    }

    /// Simula un fallo al finalizar move requests
    pub fn set_fail_move_finalization(&self, fail: bool) {
        self.fail_move_finalization.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DispatchRepository for MemoryDispatchRepository {
    async fn find_bins(&self, ids: &[Uuid]) -> AppResult<Vec<Bin>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.bins.get(id).cloned()).collect())
    }

    async fn find_bin(&self, id: Uuid) -> AppResult<Option<Bin>> {
        Ok(self.state.read().await.bins.get(&id).cloned())
    }

    async fn route_bin_order(&self, route_id: Uuid) -> AppResult<Option<Vec<Uuid>>> {
        Ok(self.state.read().await.routes.get(&route_id).cloned())
    }

    async fn find_move_requests(&self, ids: &[Uuid]) -> AppResult<Vec<MoveRequest>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.move_requests.get(id).cloned())
            .collect())
    }

    async fn find_move_request(&self, id: Uuid) -> AppResult<Option<MoveRequest>> {
        Ok(self.state.read().await.move_requests.get(&id).cloned())
    }

    async fn find_shift(&self, id: Uuid) -> AppResult<Option<Shift>> {
        Ok(self.state.read().await.shifts.get(&id).cloned())
    }

    async fn find_driver_shift(
        &self,
        driver_id: Uuid,
        statuses: &[ShiftStatus],
    ) -> AppResult<Option<Shift>> {
        let state = self.state.read().await;
        let mut candidates: Vec<&Shift> = state
            .shifts
            .values()
            .filter(|s| s.driver_id == driver_id && statuses.contains(&s.status))
            .collect();
        candidates.sort_by(|a, b| {
            (a.status == ShiftStatus::Ready)
                .cmp(&(b.status == ShiftStatus::Ready))
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(candidates.first().map(|s| (*s).clone()))
    }

    async fn shift_waypoints(&self, shift_id: Uuid) -> AppResult<Vec<Waypoint>> {
        Ok(self.state.read().await.sorted_waypoints(shift_id))
    }

    async fn create_shift(&self, plan: NewShiftPlan) -> AppResult<Shift> {
        let mut state = self.state.write().await;
        let shift = plan.shift;

        if state.driver_has(shift.driver_id, &[ShiftStatus::Ready], shift.id) {
            return Err(AppError::Conflict("Driver already has a ready shift".to_string()));
        }

        let mut sequences: Vec<i32> = plan
            .waypoints
            .iter()
            .map(|w| w.sequence_order)
            .filter(|&seq| seq > 0)
            .collect();
        let sequenced = sequences.len();
        sequences.sort_unstable();
        sequences.dedup();
        if sequences.len() != sequenced {
            return Err(AppError::Conflict("Duplicate waypoint sequence in shift".to_string()));
        }

        for id in &plan.move_request_ids {
            match state.move_requests.get(id) {
                Some(request) if request.status == MoveRequestStatus::Pending => {}
                _ => {
                    return Err(AppError::Conflict(
                        "Move request is no longer pending".to_string(),
                    ))
                }
            }
        }

        for id in &plan.move_request_ids {
            if let Some(request) = state.move_requests.get_mut(id) {
                request.status = MoveRequestStatus::Assigned;
                request.assigned_shift_id = Some(shift.id);
                request.updated_at = shift.created_at;
            }
        }
        for waypoint in plan.waypoints {
            state.waypoints.insert(waypoint.id, Waypoint {
                shift_id: shift.id,
                ..waypoint
            });
        }
        state.shifts.insert(shift.id, shift.clone());
        Ok(shift)
    }

    async fn start_shift(&self, update: StartShiftUpdate) -> AppResult<Shift> {
        let mut state = self.state.write().await;

        let driver_id = match state.shifts.get(&update.shift_id) {
            Some(shift) if shift.status == ShiftStatus::Ready => shift.driver_id,
            _ => return Err(AppError::Conflict("Shift is no longer ready".to_string())),
        };
        if state.driver_has(driver_id, &ShiftStatus::RUNNING, update.shift_id) {
            return Err(AppError::Conflict("Driver already has a running shift".to_string()));
        }

        for (waypoint_id, position) in &update.positions {
            if let Some(waypoint) = state.waypoints.get_mut(waypoint_id) {
                if waypoint.shift_id == update.shift_id {
                    waypoint.sequence_order = *position;
                }
            }
        }
        for request in state.move_requests.values_mut() {
            if request.assigned_shift_id == Some(update.shift_id)
                && request.status == MoveRequestStatus::Assigned
            {
                request.status = MoveRequestStatus::InProgress;
                request.updated_at = update.started_at;
            }
        }

        let shift = state
            .shifts
            .get_mut(&update.shift_id)
            .ok_or_else(|| AppError::Conflict("Shift is no longer ready".to_string()))?;
        shift.status = ShiftStatus::Active;
        shift.start_time = Some(update.started_at);
        shift.updated_at = update.started_at;
        Ok(shift.clone())
    }

    async fn pause_shift(&self, shift_id: Uuid, at: DateTime<Utc>) -> AppResult<Shift> {
        let mut state = self.state.write().await;
        match state.shifts.get_mut(&shift_id) {
            Some(shift) if shift.status == ShiftStatus::Active => {
                shift.status = ShiftStatus::Paused;
                shift.pause_started_at = Some(at);
                shift.updated_at = at;
                Ok(shift.clone())
            }
            _ => Err(AppError::Conflict("Shift is not active".to_string())),
        }
    }

    async fn resume_shift(
        &self,
        shift_id: Uuid,
        added_pause_seconds: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Shift> {
        let mut state = self.state.write().await;
        match state.shifts.get_mut(&shift_id) {
            Some(shift) if shift.status == ShiftStatus::Paused => {
                shift.status = ShiftStatus::Active;
                shift.total_pause_seconds += added_pause_seconds;
                shift.pause_started_at = None;
                shift.updated_at = at;
                Ok(shift.clone())
            }
            _ => Err(AppError::Conflict("Shift is not paused".to_string())),
        }
    }

    async fn end_shift(&self, update: EndShiftUpdate) -> AppResult<TerminationOutcome> {
        let mut state = self.state.write().await;

        if self.fail_history_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("shift_history insert failed".to_string()));
        }
        if state.history.iter().any(|h| h.shift_id == update.shift_id) {
            return Err(AppError::Conflict("Shift history already recorded".to_string()));
        }
        let running = state
            .shifts
            .get(&update.shift_id)
            .map(|s| s.status.is_running())
            .unwrap_or(false);
        if !running {
            return Err(AppError::Conflict("Shift is not running".to_string()));
        }

        state.history.push(update.history);

        let reverted = state.revert_move_requests(update.shift_id, update.ended_at);
        let before = state.waypoints.len();
        state.waypoints.retain(|_, w| {
            !(w.shift_id == update.shift_id
                && !w.is_completed
                && w.move_request_id.map_or(false, |id| reverted.contains(&id)))
        });
        let removed = before - state.waypoints.len();

        let shift = state
            .shifts
            .get_mut(&update.shift_id)
            .ok_or_else(|| AppError::Conflict("Shift is not running".to_string()))?;
        shift.status = ShiftStatus::Ended;
        shift.end_time = Some(update.ended_at);
        shift.total_pause_seconds = update.total_pause_seconds;
        shift.pause_started_at = None;
        shift.updated_at = update.ended_at;

        Ok(TerminationOutcome {
            shift: shift.clone(),
            reverted_move_requests: reverted,
            removed_waypoints: removed,
        })
    }

    async fn cancel_shift(&self, shift_id: Uuid, at: DateTime<Utc>) -> AppResult<TerminationOutcome> {
        let mut state = self.state.write().await;

        let open = state
            .shifts
            .get(&shift_id)
            .map(|s| !s.status.is_terminal())
            .unwrap_or(false);
        if !open {
            return Err(AppError::Conflict("Shift is already ended or cancelled".to_string()));
        }

        let reverted = state.revert_move_requests(shift_id, at);
        let before = state.waypoints.len();
        state.waypoints.retain(|_, w| w.shift_id != shift_id);
        let removed = before - state.waypoints.len();

        let shift = state
            .shifts
            .get_mut(&shift_id)
            .ok_or_else(|| AppError::Conflict("Shift is already ended or cancelled".to_string()))?;
        shift.status = ShiftStatus::Cancelled;
        shift.end_time = Some(at);
        shift.pause_started_at = None;
        shift.updated_at = at;

        Ok(TerminationOutcome {
            shift: shift.clone(),
            reverted_move_requests: reverted,
            removed_waypoints: removed,
        })
    }

    async fn shift_history(&self, shift_id: Uuid) -> AppResult<Vec<ShiftHistory>> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|h| h.shift_id == shift_id)
            .cloned()
            .collect())
    }

    async fn incident_stats(&self, shift_id: Uuid) -> AppResult<IncidentStats> {
        let state = self.state.read().await;
        let mut stats = IncidentStats::default();
        for check in state.checks.iter().filter(|c| c.shift_id == Some(shift_id)) {
            if check.incident_type.is_some() {
                stats.total_incidents += 1;
            }
            if check.field_observation {
                stats.field_observations += 1;
            }
        }
        Ok(stats)
    }

    async fn complete_waypoint(
        &self,
        completion: WaypointCompletion,
    ) -> AppResult<Option<CompletedWaypoint>> {
        let mut state = self.state.write().await;

        let (bin_id, shift_id) = match state.waypoints.get(&completion.waypoint_id) {
            Some(waypoint) if !waypoint.is_completed => (waypoint.bin_id, waypoint.shift_id),
            _ => return Ok(None),
        };
        if !state.shifts.contains_key(&shift_id) {
            return Err(AppError::Internal("Waypoint without shift".to_string()));
        }
        // Falla antes de tocar nada: la unidad no deja escrituras a medias
        if self.fail_check_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Internal("checks insert failed".to_string()));
        }

        let at = completion.at;
        let waypoint = match state.waypoints.get_mut(&completion.waypoint_id) {
            Some(waypoint) => {
                waypoint.is_completed = true;
                waypoint.completed_at = Some(at);
                waypoint.updated_fill_percentage = completion.fill_percentage;
                waypoint.clone()
            }
            None => return Ok(None),
        };

        let shift = match state.shifts.get_mut(&shift_id) {
            Some(shift) => {
                shift.completed_bins += 1;
                shift.updated_at = at;
                shift.clone()
            }
            None => return Err(AppError::Internal("Waypoint without shift".to_string())),
        };

        if completion.record_bin_check {
            if let Some(bin) = state.bins.get_mut(&bin_id) {
                if completion.fill_percentage.is_some() {
                    bin.fill_percentage = completion.fill_percentage;
                }
                bin.last_checked = Some(at);
                bin.updated_at = at;
            }
            for recommendation in state
                .recommendations
                .iter_mut()
                .filter(|r| r.bin_id == bin_id && r.status == CheckRecommendation::PENDING)
            {
                recommendation.status = CheckRecommendation::RESOLVED.to_string();
                recommendation.resolved_at = Some(at);
            }
        }

        state.checks.push(completion.check.clone());

        Ok(Some(CompletedWaypoint {
            waypoint,
            shift,
            check: completion.check,
        }))
    }

    async fn finalize_move_request(
        &self,
        move_request_id: Uuid,
        finalization: MoveFinalization,
        at: DateTime<Utc>,
    ) -> AppResult<MoveRequest> {
        if self.fail_move_finalization.load(Ordering::SeqCst) {
            return Err(AppError::Internal("move request finalization failed".to_string()));
        }

        let mut state = self.state.write().await;

        let bin_id = match state.move_requests.get(&move_request_id) {
            Some(request) if request.status == MoveRequestStatus::InProgress => request.bin_id,
            _ => {
                return Err(AppError::Conflict(
                    "Move request is not in progress".to_string(),
                ))
            }
        };

        match finalization {
            MoveFinalization::SetStatus(status) => {
                if let Some(bin) = state.bins.get_mut(&bin_id) {
                    bin.status = status;
                    bin.updated_at = at;
                }
            }
            MoveFinalization::Relocate { relocation, history } => {
                if let Some(bin) = state.bins.get_mut(&bin_id) {
                    bin.latitude = relocation.location.latitude;
                    bin.longitude = relocation.location.longitude;
                    bin.current_street = relocation.street;
                    bin.city = relocation.city;
                    bin.zip = relocation.zip;
                    bin.status = BinStatus::Active;
                    bin.updated_at = at;
                }
                state.move_history.push(history);
            }
        }

        let request = state
            .move_requests
            .get_mut(&move_request_id)
            .ok_or_else(|| AppError::Conflict("Move request is not in progress".to_string()))?;
        request.status = MoveRequestStatus::Completed;
        request.completed_at = Some(at);
        request.updated_at = at;
        Ok(request.clone())
    }

    async fn move_history_for_bin(&self, bin_id: Uuid) -> AppResult<Vec<MoveHistory>> {
        let state = self.state.read().await;
        Ok(state
            .move_history
            .iter()
            .filter(|h| h.bin_id == bin_id)
            .cloned()
            .collect())
    }

    async fn upsert_driver_location(&self, location: DriverLocation) -> AppResult<()> {
        self.state
            .write()
            .await
            .locations
            .insert(location.driver_id, location);
        Ok(())
    }

    async fn driver_location(&self, driver_id: Uuid) -> AppResult<Option<DriverLocation>> {
        Ok(self.state.read().await.locations.get(&driver_id).cloned())
    }

    async fn device_token(&self, user_id: Uuid) -> AppResult<Option<String>> {
        Ok(self.state.read().await.device_tokens.get(&user_id).cloned())
    }
}
