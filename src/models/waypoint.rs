//! Modelo de Waypoint
//!
//! Una parada dentro de un turno. Mapea a la tabla `shift_waypoints`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Tipo de parada - mapea al ENUM stop_type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "stop_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    Regular,
    Pickup,
    Dropoff,
}

impl StopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopType::Regular => "regular",
            StopType::Pickup => "pickup",
            StopType::Dropoff => "dropoff",
        }
    }

    pub fn is_move_stop(&self) -> bool {
        !matches!(self, StopType::Regular)
    }
}

/// Waypoint - mapea a la tabla shift_waypoints
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Waypoint {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub bin_id: Uuid,
    /// 0 = todavía sin secuenciar
    pub sequence_order: i32,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_fill_percentage: Option<i32>,
    pub stop_type: StopType,
    pub move_request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Waypoint {
    pub fn new(
        shift_id: Uuid,
        bin_id: Uuid,
        sequence_order: i32,
        stop_type: StopType,
        move_request_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            shift_id,
            bin_id,
            sequence_order,
            is_completed: false,
            completed_at: None,
            updated_fill_percentage: None,
            stop_type,
            move_request_id,
            created_at: now,
        }
    }
}
