//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum: configuración, repositorio y los servicios
//! del motor de despacho ya cableados.

use std::sync::Arc;
use std::time::Duration;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::DispatchRepository;
use crate::services::incident_service::{
    HttpIncidentReporter, IncidentReporter, LoggingIncidentReporter,
};
use crate::services::push_service::{HttpPushSender, NoopPushSender, PushSender};
use crate::services::route_sequencer::{RouteSequencer, SequencerOptions};
use crate::services::{
    BinCompletionService, BroadcastNotifier, DriverLocks, LocationService, ShiftService,
    ShiftSettings, SideEffectRunner,
};
use crate::utils::errors::AppResult;
use crate::utils::jwt::JwtConfig;

/// Retardo inicial de los reintentos de efectos secundarios
const SIDE_EFFECT_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub jwt: JwtConfig,
    pub repository: Arc<dyn DispatchRepository>,
    pub notifier: Arc<BroadcastNotifier>,
    pub side_effects: Arc<SideEffectRunner>,
    pub shifts: Arc<ShiftService>,
    pub completions: Arc<BinCompletionService>,
    pub locations: Arc<LocationService>,
}

impl AppState {
    /// Cablear los colaboradores externos según la configuración
    pub fn new(config: EnvironmentConfig, repository: Arc<dyn DispatchRepository>) -> AppResult<Self> {
        let push: Arc<dyn PushSender> = match &config.push_gateway_url {
            Some(url) => {
                tracing::info!("📲 Push gateway: {}", url);
                Arc::new(HttpPushSender::new(url.clone())?)
            }
            None => {
                tracing::warn!("⚠️ PUSH_GATEWAY_URL not set, push notifications disabled");
                Arc::new(NoopPushSender)
            }
        };

        let incidents: Arc<dyn IncidentReporter> = match &config.zone_service_url {
            Some(url) => {
                tracing::info!("🚧 Zone service: {}", url);
                Arc::new(HttpIncidentReporter::new(url.clone())?)
            }
            None => {
                tracing::warn!("⚠️ ZONE_SERVICE_URL not set, incidents will only be logged");
                Arc::new(LoggingIncidentReporter)
            }
        };

        let side_effects = Arc::new(SideEffectRunner::new(
            config.side_effect_max_attempts,
            SIDE_EFFECT_BASE_DELAY,
        ));

        Ok(Self::with_collaborators(
            config,
            repository,
            Arc::new(BroadcastNotifier::default()),
            push,
            incidents,
            side_effects,
        ))
    }

    /// Construcción con colaboradores explícitos (tests y herramientas)
    pub fn with_collaborators(
        config: EnvironmentConfig,
        repository: Arc<dyn DispatchRepository>,
        notifier: Arc<BroadcastNotifier>,
        push: Arc<dyn PushSender>,
        incidents: Arc<dyn IncidentReporter>,
        side_effects: Arc<SideEffectRunner>,
    ) -> Self {
        let locks = Arc::new(DriverLocks::new());
        let sequencer = RouteSequencer::new(SequencerOptions {
            fill_urgency_weight: config.fill_urgency_weight,
            two_opt_passes: config.two_opt_passes,
        });

        let shifts = ShiftService::new(
            repository.clone(),
            sequencer,
            notifier.clone(),
            push,
            side_effects.clone(),
            locks.clone(),
            ShiftSettings::from(&config),
        );
        let completions = BinCompletionService::new(
            repository.clone(),
            notifier.clone(),
            incidents,
            side_effects.clone(),
            locks,
        );
        let locations = LocationService::new(repository.clone(), notifier.clone());

        Self {
            jwt: JwtConfig::from(&config),
            config,
            repository,
            notifier,
            side_effects,
            shifts: Arc::new(shifts),
            completions: Arc::new(completions),
            locations: Arc::new(locations),
        }
    }
}
