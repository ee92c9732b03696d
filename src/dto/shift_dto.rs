//! DTOs de turnos, paradas y ubicación

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{
    EndReason, IncidentType, MoveRequest, Shift, ShiftHistory, Waypoint,
};
use crate::services::progress::LogicalProgress;
use crate::services::route_sequencer::SequencingMode;

// Request del manager para asignar un turno
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignShiftRequest {
    pub driver_id: Uuid,
    /// Ruta predefinida; si `bin_ids` viene vacío se usan sus contenedores
    pub route_id: Option<Uuid>,
    #[serde(default)]
    pub bin_ids: Vec<Uuid>,
    #[serde(default)]
    pub move_request_ids: Vec<Uuid>,
}

fn validate_incident_type(value: &str) -> Result<(), ValidationError> {
    match IncidentType::parse(value) {
        Some(_) => Ok(()),
        None => {
            let mut error = ValidationError::new("incident_type");
            error.add_param("value".into(), &value.to_string());
            Err(error)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IncidentReportRequest {
    #[validate(custom = "validate_incident_type")]
    pub incident_type: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub photo_url: Option<String>,
}

// Request del conductor para completar una parada
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompleteWaypointRequest {
    /// Identificador único del waypoint
    pub shift_bin_id: Option<Uuid>,
    /// Compatibilidad con clientes antiguos
    pub bin_id: Option<Uuid>,
    #[validate(range(min = 0, max = 100))]
    pub updated_fill_percentage: Option<i32>,
    #[validate(length(min = 1))]
    pub photo_url: Option<String>,
    #[validate]
    pub incident: Option<IncidentReportRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationUpdateRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    #[validate(range(min = 0.0))]
    pub speed: Option<f64>,
}

// Turno con sus waypoints ordenados y el progreso lógico
#[derive(Debug, Clone, Serialize)]
pub struct ShiftDetailsResponse {
    pub shift: Shift,
    pub waypoints: Vec<Waypoint>,
    pub progress: LogicalProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndShiftResponse {
    pub shift: Shift,
    pub history: ShiftHistory,
    pub end_reason: EndReason,
    pub total_duration_seconds: i64,
    pub active_duration_seconds: i64,
    pub total_pause_seconds: i64,
    pub completion_rate: Decimal,
    pub reverted_move_requests: Vec<Uuid>,
    pub removed_waypoints: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartShiftResponse {
    #[serde(flatten)]
    pub details: ShiftDetailsResponse,
    pub sequencing_mode: SequencingMode,
    /// Turno anterior cerrado automáticamente al iniciar este
    pub previous_shift: Option<EndShiftResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelShiftResponse {
    pub shift: Shift,
    pub reverted_move_requests: Vec<Uuid>,
    pub removed_waypoints: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteWaypointResponse {
    pub waypoint: Waypoint,
    pub check_id: Uuid,
    pub progress: LogicalProgress,
    pub move_request: Option<MoveRequest>,
    pub incident_reported: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_request_validation() {
        let valid = CompleteWaypointRequest {
            shift_bin_id: Some(Uuid::new_v4()),
            updated_fill_percentage: Some(70),
            ..Default::default()
        };
        assert!(valid.validate().is_ok());

        let out_of_range = CompleteWaypointRequest {
            updated_fill_percentage: Some(120),
            ..valid.clone()
        };
        assert!(out_of_range.validate().is_err());

        let bad_incident = CompleteWaypointRequest {
            incident: Some(IncidentReportRequest {
                incident_type: "volcano".to_string(),
                description: Some("lava".to_string()),
                photo_url: None,
            }),
            ..valid
        };
        assert!(bad_incident.validate().is_err());
    }

    #[test]
    fn test_assign_request_defaults() {
        let request: AssignShiftRequest =
            serde_json::from_str(&format!(r#"{{"driver_id":"{}"}}"#, Uuid::nil())).unwrap();
        assert!(request.bin_ids.is_empty());
        assert!(request.move_request_ids.is_empty());
        assert!(request.route_id.is_none());
    }
}
