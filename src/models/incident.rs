//! Tipos de incidente reportables al completar una parada

use serde::{Deserialize, Serialize};

/// Conjunto cerrado de tipos de incidente aceptados
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    BlockedAccess,
    UnsafeArea,
    AggressiveAnimal,
    BinMissing,
    BinDamaged,
    Other,
}

impl IncidentType {
    pub const ALL: [IncidentType; 6] = [
        IncidentType::BlockedAccess,
        IncidentType::UnsafeArea,
        IncidentType::AggressiveAnimal,
        IncidentType::BinMissing,
        IncidentType::BinDamaged,
        IncidentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::BlockedAccess => "blocked_access",
            IncidentType::UnsafeArea => "unsafe_area",
            IncidentType::AggressiveAnimal => "aggressive_animal",
            IncidentType::BinMissing => "bin_missing",
            IncidentType::BinDamaged => "bin_damaged",
            IncidentType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value.trim())
    }
}

/// Estadísticas de incidentes de un turno, para el historial
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentStats {
    pub total_incidents: i32,
    pub field_observations: i32,
}
