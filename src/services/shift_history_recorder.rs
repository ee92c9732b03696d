//! Registro histórico de turnos terminados
//!
//! Construye la fila inmutable de `shift_history` y la entrega al repositorio
//! junto con el cierre del turno: la inserción precede al cambio de estado
//! dentro de la misma transacción, así que si el historial falla el turno
//! sigue en curso.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::models::{EndReason, IncidentStats, Shift, ShiftHistory};
use crate::repositories::{DispatchRepository, EndShiftUpdate, TerminationOutcome};
use crate::services::progress::LogicalProgress;
use crate::utils::errors::AppResult;

/// Cómo terminó el turno
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationTrigger {
    /// El conductor terminó el turno
    DriverEnded,
    /// Un nuevo `Start` cerró el turno anterior todavía en curso
    SupersededByStart,
}

/// Duraciones calculadas al cerrar un turno
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShiftDurations {
    pub total_seconds: i64,
    pub pause_seconds: i64,
    pub active_seconds: i64,
}

impl ShiftDurations {
    pub fn compute(shift: &Shift, ended_at: DateTime<Utc>) -> Self {
        let total_seconds = shift
            .start_time
            .map(|start| (ended_at - start).num_seconds().max(0))
            .unwrap_or(0);
        let pause_seconds = shift.pause_seconds_at(ended_at);
        Self {
            total_seconds,
            pause_seconds,
            active_seconds: (total_seconds - pause_seconds).max(0),
        }
    }
}

/// Resultado de cerrar un turno con su historial
#[derive(Debug, Clone)]
pub struct ShiftTermination {
    pub outcome: TerminationOutcome,
    pub history: ShiftHistory,
    pub durations: ShiftDurations,
    pub progress: LogicalProgress,
}

pub struct ShiftHistoryRecorder {
    repository: Arc<dyn DispatchRepository>,
}

impl ShiftHistoryRecorder {
    pub fn new(repository: Arc<dyn DispatchRepository>) -> Self {
        Self { repository }
    }

    /// Fila de historial para un turno que termina en `ended_at`
    pub fn build(
        shift: &Shift,
        progress: &LogicalProgress,
        stats: IncidentStats,
        durations: ShiftDurations,
        ended_at: DateTime<Utc>,
        ended_by: Option<Uuid>,
        trigger: TerminationTrigger,
    ) -> ShiftHistory {
        ShiftHistory {
            id: Uuid::new_v4(),
            shift_id: shift.id,
            driver_id: shift.driver_id,
            route_id: shift.route_id,
            started_at: shift.start_time,
            ended_at,
            shift_created_at: shift.created_at,
            created_at: ended_at,
            total_pause_seconds: durations.pause_seconds,
            total_bins: progress.total,
            completed_bins: progress.completed,
            completion_rate: progress.completion_rate(),
            total_incidents: stats.total_incidents,
            field_observations: stats.field_observations,
            end_reason: EndReason::from_counts(progress.completed, progress.total),
            ended_by,
            metadata: Some(json!({
                "trigger": trigger,
                "total_duration_seconds": durations.total_seconds,
                "active_duration_seconds": durations.active_seconds,
                "physical_total_bins": shift.total_bins,
                "physical_completed_bins": shift.completed_bins,
            })),
        }
    }

    /// Cierra un turno activo o pausado escribiendo su historial
    pub async fn record_termination(
        &self,
        shift: &Shift,
        ended_by: Option<Uuid>,
        trigger: TerminationTrigger,
        ended_at: DateTime<Utc>,
    ) -> AppResult<ShiftTermination> {
        let waypoints = self.repository.shift_waypoints(shift.id).await?;
        let progress = LogicalProgress::from_waypoints(&waypoints);

        // Las estadísticas de incidentes son opcionales para el historial
        let stats = match self.repository.incident_stats(shift.id).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("⚠️ Incident stats unavailable for shift {}: {}", shift.id, e);
                IncidentStats::default()
            }
        };

        let durations = ShiftDurations::compute(shift, ended_at);
        let history = Self::build(shift, &progress, stats, durations, ended_at, ended_by, trigger);

        let outcome = self
            .repository
            .end_shift(EndShiftUpdate {
                shift_id: shift.id,
                history: history.clone(),
                total_pause_seconds: durations.pause_seconds,
                ended_at,
            })
            .await?;

        tracing::info!(
            "📚 Shift {} recorded: {}/{} units, reason {:?}",
            shift.id,
            history.completed_bins,
            history.total_bins,
            history.end_reason
        );

        Ok(ShiftTermination {
            outcome,
            history,
            durations,
            progress,
        })
    }
}
