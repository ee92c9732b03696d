//! Contrato de persistencia del motor de despacho
//!
//! Cada método es una unidad transaccional: las implementaciones garantizan
//! que todas sus escrituras se aplican juntas o ninguna. Las transiciones de
//! estado usan guardas compare-and-swap sobre el estado esperado.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Bin, BinRelocation, BinStatus, Check, DriverLocation, IncidentStats, MoveHistory, MoveRequest,
    Shift, ShiftHistory, ShiftStatus, Waypoint,
};
use crate::utils::errors::AppResult;

/// Turno nuevo con sus waypoints y las move requests que se le asignan
#[derive(Debug, Clone)]
pub struct NewShiftPlan {
    pub shift: Shift,
    pub waypoints: Vec<Waypoint>,
    pub move_request_ids: Vec<Uuid>,
}

/// Inicio de turno: nuevas posiciones de secuencia y hora de inicio
#[derive(Debug, Clone)]
pub struct StartShiftUpdate {
    pub shift_id: Uuid,
    pub positions: Vec<(Uuid, i32)>,
    pub started_at: DateTime<Utc>,
}

/// Cierre de turno: el historial se inserta antes de cambiar el estado
#[derive(Debug, Clone)]
pub struct EndShiftUpdate {
    pub shift_id: Uuid,
    pub history: ShiftHistory,
    pub total_pause_seconds: i64,
    pub ended_at: DateTime<Utc>,
}

/// Resultado de terminar o cancelar un turno
#[derive(Debug, Clone)]
pub struct TerminationOutcome {
    pub shift: Shift,
    /// Move requests devueltas a `pending`
    pub reverted_move_requests: Vec<Uuid>,
    pub removed_waypoints: usize,
}

/// Finalización de una parada: waypoint, contador del turno, contenedor y
/// check se escriben en la misma unidad
#[derive(Debug, Clone)]
pub struct WaypointCompletion {
    pub waypoint_id: Uuid,
    pub fill_percentage: Option<i32>,
    /// Solo paradas regulares: llenado, `last_checked` y recomendaciones
    pub record_bin_check: bool,
    pub check: Check,
    pub at: DateTime<Utc>,
}

/// Waypoint recién completado junto con los contadores actualizados del turno
#[derive(Debug, Clone)]
pub struct CompletedWaypoint {
    pub waypoint: Waypoint,
    pub shift: Shift,
    pub check: Check,
}

/// Efecto sobre el contenedor al completar una move request
#[derive(Debug, Clone)]
pub enum MoveFinalization {
    SetStatus(BinStatus),
    Relocate {
        relocation: BinRelocation,
        history: MoveHistory,
    },
}

#[async_trait]
pub trait DispatchRepository: Send + Sync {
    // Contenedores y rutas predefinidas
    async fn find_bins(&self, ids: &[Uuid]) -> AppResult<Vec<Bin>>;
    async fn find_bin(&self, id: Uuid) -> AppResult<Option<Bin>>;
    /// Orden de contenedores guardado en una ruta predefinida
    async fn route_bin_order(&self, route_id: Uuid) -> AppResult<Option<Vec<Uuid>>>;

    // Move requests
    async fn find_move_requests(&self, ids: &[Uuid]) -> AppResult<Vec<MoveRequest>>;
    async fn find_move_request(&self, id: Uuid) -> AppResult<Option<MoveRequest>>;

    // Turnos
    async fn find_shift(&self, id: Uuid) -> AppResult<Option<Shift>>;
    async fn find_driver_shift(
        &self,
        driver_id: Uuid,
        statuses: &[ShiftStatus],
    ) -> AppResult<Option<Shift>>;
    /// Waypoints ordenados por `(sequence_order, id)`
    async fn shift_waypoints(&self, shift_id: Uuid) -> AppResult<Vec<Waypoint>>;
    /// Inserta turno y waypoints; las move requests pasan de `pending` a `assigned`
    async fn create_shift(&self, plan: NewShiftPlan) -> AppResult<Shift>;
    /// `ready -> active`, reescribe secuencia y pasa move requests a `in_progress`
    async fn start_shift(&self, update: StartShiftUpdate) -> AppResult<Shift>;
    async fn pause_shift(&self, shift_id: Uuid, at: DateTime<Utc>) -> AppResult<Shift>;
    async fn resume_shift(
        &self,
        shift_id: Uuid,
        added_pause_seconds: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Shift>;
    async fn end_shift(&self, update: EndShiftUpdate) -> AppResult<TerminationOutcome>;
    async fn cancel_shift(&self, shift_id: Uuid, at: DateTime<Utc>) -> AppResult<TerminationOutcome>;
    async fn shift_history(&self, shift_id: Uuid) -> AppResult<Vec<ShiftHistory>>;
    async fn incident_stats(&self, shift_id: Uuid) -> AppResult<IncidentStats>;

    // Paradas
    /// Marca el waypoint completado si aún no lo estaba, incrementa el
    /// contador físico del turno, registra la revisión del contenedor e
    /// inserta el check. `None` si no había fila que actualizar.
    async fn complete_waypoint(
        &self,
        completion: WaypointCompletion,
    ) -> AppResult<Option<CompletedWaypoint>>;
    async fn finalize_move_request(
        &self,
        move_request_id: Uuid,
        finalization: MoveFinalization,
        at: DateTime<Utc>,
    ) -> AppResult<MoveRequest>;
    async fn move_history_for_bin(&self, bin_id: Uuid) -> AppResult<Vec<MoveHistory>>;

    // Ubicación y dispositivos
    async fn upsert_driver_location(&self, location: DriverLocation) -> AppResult<()>;
    async fn driver_location(&self, driver_id: Uuid) -> AppResult<Option<DriverLocation>>;
    async fn device_token(&self, user_id: Uuid) -> AppResult<Option<String>>;
}
