//! Modelo de ShiftHistory
//!
//! Snapshot inmutable de un turno terminado, una fila por terminación.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "end_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Completed,
    ManualEnd,
}

impl EndReason {
    /// `completed` solo si se completaron todas las unidades
    pub fn from_counts(completed: i32, total: i32) -> Self {
        if completed >= total {
            EndReason::Completed
        } else {
            EndReason::ManualEnd
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ShiftHistory {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub driver_id: Uuid,
    pub route_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub shift_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub total_pause_seconds: i64,
    pub total_bins: i32,
    pub completed_bins: i32,
    /// Porcentaje 0-100 con dos decimales
    pub completion_rate: Decimal,
    pub total_incidents: i32,
    pub field_observations: i32,
    pub end_reason: EndReason,
    pub ended_by: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_reason_from_counts() {
        assert_eq!(EndReason::from_counts(4, 4), EndReason::Completed);
        assert_eq!(EndReason::from_counts(2, 4), EndReason::ManualEnd);
        assert_eq!(EndReason::from_counts(0, 0), EndReason::Completed);
    }
}
