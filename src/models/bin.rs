//! Modelos de Bin y Check
//!
//! El contenedor físico y el registro inmutable de cada revisión.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "bin_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BinStatus {
    Active,
    Retired,
    InStorage,
}

/// Bin - mapea a la tabla bins
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Bin {
    pub id: Uuid,
    pub bin_number: String,
    pub current_street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub fill_percentage: Option<i32>,
    pub status: BinStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Bin {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "check_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CheckSource {
    Shift,
    Manual,
}

/// Check - registro inmutable de una revisión de contenedor
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Check {
    pub id: Uuid,
    pub bin_id: Uuid,
    pub shift_id: Option<Uuid>,
    pub shift_bin_id: Option<Uuid>,
    pub source: CheckSource,
    pub fill_percentage: Option<i32>,
    pub photo_url: Option<String>,
    pub checked_by: Uuid,
    pub checked_at: DateTime<Utc>,
    pub incident_type: Option<String>,
    /// Incidente reportado sin foto ni llenado
    pub field_observation: bool,
}

/// Nueva ubicación de un contenedor reubicado
#[derive(Debug, Clone, PartialEq)]
pub struct BinRelocation {
    pub location: GeoPoint,
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

/// MoveHistory - registro inmutable de un movimiento completado
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MoveHistory {
    pub id: Uuid,
    pub bin_id: Uuid,
    pub move_request_id: Uuid,
    pub shift_id: Uuid,
    pub moved_by: Uuid,
    pub moved_at: DateTime<Utc>,
    pub from_street: Option<String>,
    pub from_city: Option<String>,
    pub from_zip: Option<String>,
    pub from_latitude: f64,
    pub from_longitude: f64,
    pub to_street: Option<String>,
    pub to_city: Option<String>,
    pub to_zip: Option<String>,
    pub to_latitude: f64,
    pub to_longitude: f64,
}

/// Recomendación de revisión pendiente para un contenedor sin revisar
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CheckRecommendation {
    pub id: Uuid,
    pub bin_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl CheckRecommendation {
    pub const PENDING: &'static str = "pending";
    pub const RESOLVED: &'static str = "resolved";

    pub fn pending(bin_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bin_id,
            status: Self::PENDING.to_string(),
            created_at: now,
            resolved_at: None,
        }
    }
}
