//! Ingesta de ubicaciones GPS
//!
//! Escritura fire-and-forget del último fix del conductor y difusión
//! best-effort a los managers. Solo importa la ubicación más reciente.

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::dto::LocationUpdateRequest;
use crate::models::{AuthenticatedUser, DriverLocation, UserRole};
use crate::repositories::DispatchRepository;
use crate::services::notification_service::{DispatchMessage, Notifier};
use crate::utils::errors::AppResult;
use crate::utils::validation::{field_error, validate_coordinates};

pub struct LocationService {
    repository: Arc<dyn DispatchRepository>,
    notifier: Arc<dyn Notifier>,
}

impl LocationService {
    pub fn new(repository: Arc<dyn DispatchRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { repository, notifier }
    }

    pub async fn update(
        &self,
        driver: &AuthenticatedUser,
        request: LocationUpdateRequest,
    ) -> AppResult<DriverLocation> {
        request.validate()?;
        validate_coordinates(request.latitude, request.longitude)
            .map_err(|e| field_error("location", e))?;

        let location = DriverLocation {
            driver_id: driver.user_id,
            latitude: request.latitude,
            longitude: request.longitude,
            accuracy: request.accuracy,
            heading: request.heading,
            speed: request.speed,
            recorded_at: Utc::now(),
        };
        self.repository.upsert_driver_location(location.clone()).await?;
        tracing::debug!(
            "📍 Driver {} at ({:.5}, {:.5})",
            driver.user_id,
            location.latitude,
            location.longitude
        );

        self.notifier
            .deliver_to_role(
                UserRole::Manager,
                DispatchMessage::DriverLocation {
                    driver_id: location.driver_id,
                    latitude: location.latitude,
                    longitude: location.longitude,
                    heading: location.heading,
                    speed: location.speed,
                    recorded_at: location.recorded_at,
                },
            )
            .await;

        Ok(location)
    }
}
