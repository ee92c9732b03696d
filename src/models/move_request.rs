//! Modelo de MoveRequest
//!
//! Reubicación, retiro o almacenamiento programado de un contenedor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::bin::BinStatus;
use super::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "move_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    PickupOnly,
    Relocation,
}

/// Destino del contenedor en un `pickup_only`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "disposal_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DisposalAction {
    Retire,
    Store,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "move_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MoveRequestStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
}

impl MoveRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveRequestStatus::Pending => "pending",
            MoveRequestStatus::Assigned => "assigned",
            MoveRequestStatus::InProgress => "in_progress",
            MoveRequestStatus::Completed => "completed",
        }
    }
}

/// MoveRequest - mapea a la tabla move_requests
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MoveRequest {
    pub id: Uuid,
    pub bin_id: Uuid,
    pub move_type: MoveType,
    pub disposal_action: Option<DisposalAction>,
    pub status: MoveRequestStatus,
    pub assigned_shift_id: Option<Uuid>,
    pub original_address: String,
    pub original_latitude: f64,
    pub original_longitude: f64,
    pub new_address: Option<String>,
    pub new_latitude: Option<f64>,
    pub new_longitude: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MoveRequest {
    pub fn original_location(&self) -> GeoPoint {
        GeoPoint::new(self.original_latitude, self.original_longitude)
    }

    pub fn new_location(&self) -> Option<GeoPoint> {
        match (self.new_latitude, self.new_longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }

    /// Estado final del contenedor para un `pickup_only`
    pub fn disposal_status(&self) -> BinStatus {
        match self.disposal_action {
            Some(DisposalAction::Retire) => BinStatus::Retired,
            Some(DisposalAction::Store) => BinStatus::InStorage,
            None => BinStatus::Active,
        }
    }
}
