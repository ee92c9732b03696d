#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use bin_dispatch::config::environment::EnvironmentConfig;
use bin_dispatch::dto::{AssignShiftRequest, LocationUpdateRequest, ShiftDetailsResponse};
use bin_dispatch::models::{
    AuthenticatedUser, Bin, BinStatus, DisposalAction, GeoPoint, MoveRequest, MoveRequestStatus,
    MoveType, UserRole,
};
use bin_dispatch::repositories::MemoryDispatchRepository;
use bin_dispatch::services::incident_service::{IncidentReport, IncidentReporter};
use bin_dispatch::services::push_service::{PushMessage, PushSender};
use bin_dispatch::services::{BroadcastNotifier, SideEffectRunner};
use bin_dispatch::state::AppState;
use bin_dispatch::utils::errors::{AppError, AppResult};

pub const DEPOT: GeoPoint = GeoPoint {
    latitude: 45.50,
    longitude: -73.70,
};

/// Registra los push enviados
#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<PushMessage>>,
}

#[async_trait]
impl PushSender for RecordingPush {
    async fn send(&self, message: &PushMessage) -> AppResult<()> {
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// Colaborador de zonas que puede fallar siempre
#[derive(Default)]
pub struct ScriptedIncidents {
    pub fail: bool,
    pub attempts: AtomicUsize,
    pub reports: Mutex<Vec<IncidentReport>>,
}

#[async_trait]
impl IncidentReporter for ScriptedIncidents {
    async fn report(&self, report: &IncidentReport) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Internal("zone service unavailable".to_string()));
        }
        self.reports.lock().await.push(report.clone());
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub repo: Arc<MemoryDispatchRepository>,
    pub notifier: Arc<BroadcastNotifier>,
    pub push: Arc<RecordingPush>,
    pub incidents: Arc<ScriptedIncidents>,
    pub side_effects: Arc<SideEffectRunner>,
}

pub fn test_config() -> EnvironmentConfig {
    EnvironmentConfig {
        jwt_secret: "test-secret".to_string(),
        depot_location: Some(DEPOT),
        ..EnvironmentConfig::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_incidents(ScriptedIncidents::default())
    }

    pub fn with_failing_incidents() -> Self {
        Self::with_incidents(ScriptedIncidents {
            fail: true,
            ..ScriptedIncidents::default()
        })
    }

    fn with_incidents(incidents: ScriptedIncidents) -> Self {
        let repo = Arc::new(MemoryDispatchRepository::new());
        let notifier = Arc::new(BroadcastNotifier::new(64));
        let push = Arc::new(RecordingPush::default());
        let incidents = Arc::new(incidents);
        let side_effects = Arc::new(SideEffectRunner::new(3, Duration::from_millis(1)));

        let state = AppState::with_collaborators(
            test_config(),
            repo.clone(),
            notifier.clone(),
            push.clone(),
            incidents.clone(),
            side_effects.clone(),
        );

        Self {
            state,
            repo,
            notifier,
            push,
            incidents,
            side_effects,
        }
    }

    pub async fn bin(&self, latitude: f64, longitude: f64, fill: Option<i32>) -> Bin {
        let bin = Bin {
            id: Uuid::new_v4(),
            bin_number: format!("B-{}", &Uuid::new_v4().simple().to_string()[..6]),
            current_street: Some("12 Main St".to_string()),
            city: Some("Springfield".to_string()),
            zip: Some("12345".to_string()),
            latitude,
            longitude,
            fill_percentage: fill,
            status: BinStatus::Active,
            last_checked: None,
            updated_at: Utc::now(),
        };
        self.repo.insert_bin(bin.clone()).await;
        bin
    }

    pub async fn relocation(&self, bin: &Bin, to: GeoPoint, new_address: &str) -> MoveRequest {
        let request = move_request(bin, MoveType::Relocation, None, Some((to, new_address)));
        self.repo.insert_move_request(request.clone()).await;
        request
    }

    pub async fn pickup_only(&self, bin: &Bin, action: DisposalAction) -> MoveRequest {
        let request = move_request(bin, MoveType::PickupOnly, Some(action), None);
        self.repo.insert_move_request(request.clone()).await;
        request
    }

    pub async fn assign(
        &self,
        driver: &AuthenticatedUser,
        bin_ids: Vec<Uuid>,
        move_request_ids: Vec<Uuid>,
    ) -> ShiftDetailsResponse {
        self.state
            .shifts
            .assign(
                &manager(),
                AssignShiftRequest {
                    driver_id: driver.user_id,
                    route_id: None,
                    bin_ids,
                    move_request_ids,
                },
            )
            .await
            .expect("assign succeeds")
    }

    pub async fn gps(&self, driver: &AuthenticatedUser, latitude: f64, longitude: f64) {
        self.state
            .locations
            .update(
                driver,
                LocationUpdateRequest {
                    latitude,
                    longitude,
                    accuracy: Some(5.0),
                    heading: None,
                    speed: None,
                },
            )
            .await
            .expect("location accepted");
    }
}

pub fn driver() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: Uuid::new_v4(),
        email: "driver@dispatch.test".to_string(),
        role: UserRole::Driver,
    }
}

pub fn manager() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: Uuid::new_v4(),
        email: "manager@dispatch.test".to_string(),
        role: UserRole::Manager,
    }
}

pub fn move_request(
    bin: &Bin,
    move_type: MoveType,
    disposal_action: Option<DisposalAction>,
    destination: Option<(GeoPoint, &str)>,
) -> MoveRequest {
    let now = Utc::now();
    MoveRequest {
        id: Uuid::new_v4(),
        bin_id: bin.id,
        move_type,
        disposal_action,
        status: MoveRequestStatus::Pending,
        assigned_shift_id: None,
        original_address: "12 Main St, Springfield 12345".to_string(),
        original_latitude: bin.latitude,
        original_longitude: bin.longitude,
        new_address: destination.map(|(_, address)| address.to_string()),
        new_latitude: destination.map(|(point, _)| point.latitude),
        new_longitude: destination.map(|(point, _)| point.longitude),
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}
