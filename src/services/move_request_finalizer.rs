//! Finalización de move requests
//!
//! Se invoca cuando se completa el waypoint `dropoff` de una move request.
//! Un `pickup_only` cambia el estado del contenedor según la acción de
//! disposición; una `relocation` mueve el contenedor y deja un registro en
//! `move_history` con origen y destino.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Bin, BinRelocation, MoveHistory, MoveRequest, MoveType};
use crate::repositories::{DispatchRepository, MoveFinalization};
use crate::utils::address::AddressParts;
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct MoveRequestFinalizer {
    repository: Arc<dyn DispatchRepository>,
}

impl MoveRequestFinalizer {
    pub fn new(repository: Arc<dyn DispatchRepository>) -> Self {
        Self { repository }
    }

    /// Efecto sobre el contenedor para una move request completada
    pub fn plan(
        request: &MoveRequest,
        bin: &Bin,
        shift_id: Uuid,
        moved_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<MoveFinalization> {
        match request.move_type {
            MoveType::PickupOnly => Ok(MoveFinalization::SetStatus(request.disposal_status())),
            MoveType::Relocation => {
                let destination = request.new_location().ok_or_else(|| {
                    AppError::Internal(format!(
                        "Relocation {} has no destination coordinates",
                        request.id
                    ))
                })?;

                let to = parse_or_warn(request.new_address.as_deref().unwrap_or(""), request.id);
                let from = if bin.current_street.is_some() {
                    AddressParts {
                        street: bin.current_street.clone(),
                        city: bin.city.clone(),
                        zip: bin.zip.clone(),
                    }
                } else {
                    parse_or_warn(&request.original_address, request.id)
                };

                let history = MoveHistory {
                    id: Uuid::new_v4(),
                    bin_id: bin.id,
                    move_request_id: request.id,
                    shift_id,
                    moved_by,
                    moved_at: at,
                    from_street: from.street,
                    from_city: from.city,
                    from_zip: from.zip,
                    from_latitude: bin.latitude,
                    from_longitude: bin.longitude,
                    to_street: to.street.clone(),
                    to_city: to.city.clone(),
                    to_zip: to.zip.clone(),
                    to_latitude: destination.latitude,
                    to_longitude: destination.longitude,
                };

                Ok(MoveFinalization::Relocate {
                    relocation: BinRelocation {
                        location: destination,
                        street: to.street,
                        city: to.city,
                        zip: to.zip,
                    },
                    history,
                })
            }
        }
    }

    pub async fn finalize(
        &self,
        request: &MoveRequest,
        shift_id: Uuid,
        moved_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<MoveRequest> {
        let bin = self
            .repository
            .find_bin(request.bin_id)
            .await?
            .ok_or_else(|| not_found_error("Bin", &request.bin_id.to_string()))?;

        let finalization = Self::plan(request, &bin, shift_id, moved_by, at)?;
        let completed = self
            .repository
            .finalize_move_request(request.id, finalization, at)
            .await?;

        tracing::info!(
            "📦 Move request {} completed ({:?}) for bin {}",
            completed.id,
            completed.move_type,
            completed.bin_id
        );
        Ok(completed)
    }
}

/// Los fallos de parsing dejan campos vacíos y nunca fallan el movimiento
fn parse_or_warn(raw: &str, request_id: Uuid) -> AddressParts {
    let (parts, complete) = AddressParts::parse(raw);
    if !complete {
        tracing::warn!(
            "⚠️ Address '{}' of move request {} could not be fully parsed",
            raw,
            request_id
        );
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BinStatus, DisposalAction, MoveRequestStatus};

    fn bin() -> Bin {
        Bin {
            id: Uuid::new_v4(),
            bin_number: "B-7".to_string(),
            current_street: Some("1 Old Rd".to_string()),
            city: Some("Oldtown".to_string()),
            zip: Some("11111".to_string()),
            latitude: 10.0,
            longitude: 20.0,
            fill_percentage: None,
            status: BinStatus::Active,
            last_checked: None,
            updated_at: Utc::now(),
        }
    }

    fn request(bin: &Bin, move_type: MoveType) -> MoveRequest {
        let now = Utc::now();
        MoveRequest {
            id: Uuid::new_v4(),
            bin_id: bin.id,
            move_type,
            disposal_action: None,
            status: MoveRequestStatus::InProgress,
            assigned_shift_id: None,
            original_address: "1 Old Rd, Oldtown 11111".to_string(),
            original_latitude: bin.latitude,
            original_longitude: bin.longitude,
            new_address: Some("9 New Ave, Newcity 22222".to_string()),
            new_latitude: Some(11.0),
            new_longitude: Some(21.0),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pickup_only_follows_disposal_action() {
        let bin = bin();
        let mut req = request(&bin, MoveType::PickupOnly);
        req.disposal_action = Some(DisposalAction::Store);
        let plan = MoveRequestFinalizer::plan(&req, &bin, Uuid::new_v4(), Uuid::new_v4(), Utc::now()).unwrap();
        assert!(matches!(plan, MoveFinalization::SetStatus(BinStatus::InStorage)));

        req.disposal_action = None;
        let plan = MoveRequestFinalizer::plan(&req, &bin, Uuid::new_v4(), Uuid::new_v4(), Utc::now()).unwrap();
        assert!(matches!(plan, MoveFinalization::SetStatus(BinStatus::Active)));
    }

    #[test]
    fn test_relocation_records_origin_and_destination() {
        let bin = bin();
        let req = request(&bin, MoveType::Relocation);
        let plan = MoveRequestFinalizer::plan(&req, &bin, Uuid::new_v4(), Uuid::new_v4(), Utc::now()).unwrap();

        match plan {
            MoveFinalization::Relocate { relocation, history } => {
                assert_eq!(relocation.location.latitude, 11.0);
                assert_eq!(relocation.city.as_deref(), Some("Newcity"));
                assert_eq!(history.from_street.as_deref(), Some("1 Old Rd"));
                assert_eq!(history.to_zip.as_deref(), Some("22222"));
                assert_eq!(history.from_latitude, 10.0);
            }
            other => panic!("unexpected plan: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_destination_degrades() {
        let bin = bin();
        let mut req = request(&bin, MoveType::Relocation);
        req.new_address = Some("somewhere behind the depot".to_string());
        let plan = MoveRequestFinalizer::plan(&req, &bin, Uuid::new_v4(), Uuid::new_v4(), Utc::now()).unwrap();

        let MoveFinalization::Relocate { relocation, .. } = plan else {
            panic!("expected relocation");
        };
        assert_eq!(relocation.street.as_deref(), Some("somewhere behind the depot"));
        assert!(relocation.city.is_none());
        assert!(relocation.zip.is_none());
    }
}
