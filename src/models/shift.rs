//! Modelo de Shift
//!
//! Un turno de trabajo de un conductor. Mapea a la tabla `shifts`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado del turno - mapea al ENUM shift_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "shift_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Ready,
    Active,
    Paused,
    Ended,
    Cancelled,
}

impl ShiftStatus {
    pub const OPEN: [ShiftStatus; 3] = [ShiftStatus::Ready, ShiftStatus::Active, ShiftStatus::Paused];
    pub const RUNNING: [ShiftStatus; 2] = [ShiftStatus::Active, ShiftStatus::Paused];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Ready => "ready",
            ShiftStatus::Active => "active",
            ShiftStatus::Paused => "paused",
            ShiftStatus::Ended => "ended",
            ShiftStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShiftStatus::Ended | ShiftStatus::Cancelled)
    }

    /// Turno activo o pausado
    pub fn is_running(&self) -> bool {
        matches!(self, ShiftStatus::Active | ShiftStatus::Paused)
    }

    /// Tabla de transiciones: `ready -> active <-> paused -> ended`,
    /// y `ready|active|paused -> cancelled`.
    pub fn can_transition_to(&self, next: ShiftStatus) -> bool {
        use ShiftStatus::*;
        matches!(
            (self, next),
            (Ready, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Ended)
                | (Paused, Ended)
                | (Ready, Cancelled)
                | (Active, Cancelled)
                | (Paused, Cancelled)
        )
    }
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shift principal - mapea a la tabla shifts
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Shift {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub route_id: Option<Uuid>,
    pub status: ShiftStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_pause_seconds: i64,
    pub pause_started_at: Option<DateTime<Utc>>,
    pub total_bins: i32,
    /// Contador físico: cada waypoint completado suma uno
    pub completed_bins: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    pub fn new_ready(driver_id: Uuid, route_id: Option<Uuid>, total_bins: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver_id,
            route_id,
            status: ShiftStatus::Ready,
            start_time: None,
            end_time: None,
            total_pause_seconds: 0,
            pause_started_at: None,
            total_bins,
            completed_bins: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Pausa acumulada incluyendo el intervalo en curso (si está pausado)
    pub fn pause_seconds_at(&self, now: DateTime<Utc>) -> i64 {
        let in_progress = self
            .pause_started_at
            .map(|started| (now - started).num_seconds().max(0))
            .unwrap_or(0);
        self.total_pause_seconds + in_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_transition_table() {
        use ShiftStatus::*;
        assert!(Ready.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Paused.can_transition_to(Ended));
        assert!(Ready.can_transition_to(Cancelled));
        assert!(!Ready.can_transition_to(Paused));
        assert!(!Ready.can_transition_to(Ended));
        for terminal in [Ended, Cancelled] {
            for next in [Ready, Active, Paused, Ended, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_pause_seconds_includes_open_interval() {
        let now = Utc::now();
        let mut shift = Shift::new_ready(Uuid::new_v4(), None, 3, now);
        shift.total_pause_seconds = 30;
        assert_eq!(shift.pause_seconds_at(now), 30);

        shift.pause_started_at = Some(now - Duration::seconds(45));
        assert_eq!(shift.pause_seconds_at(now), 75);
    }
}
