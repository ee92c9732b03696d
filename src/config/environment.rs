//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y los parámetros del
//! motor de despacho (secuenciación, GPS, colaboradores externos).

use std::env;
use std::str::FromStr;

use crate::models::location::GeoPoint;
use crate::utils::errors::AppError;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub cors_origins: Vec<String>,
    /// Antigüedad máxima de un fix GPS para poder iniciar un turno
    pub gps_fix_max_age_secs: i64,
    /// Peso de urgencia por llenado en la optimización completa
    pub fill_urgency_weight: f64,
    pub two_opt_passes: usize,
    /// Ubicación del depósito para dropoffs de retiros
    pub depot_location: Option<GeoPoint>,
    pub zone_service_url: Option<String>,
    pub push_gateway_url: Option<String>,
    pub side_effect_max_attempts: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            jwt_secret: "dev-secret-change-me".to_string(),
            jwt_expiration: 12 * 3600,
            cors_origins: Vec::new(),
            gps_fix_max_age_secs: 300,
            fill_urgency_weight: 0.5,
            two_opt_passes: 50,
            depot_location: None,
            zone_service_url: None,
            push_gateway_url: None,
            side_effect_max_attempts: 3,
        }
    }
}

impl EnvironmentConfig {
    /// Cargar configuración desde variables de entorno
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal("JWT_SECRET must be set".to_string()))?;

        let depot_location = match (
            optional_parse::<f64>("DEPOT_LATITUDE")?,
            optional_parse::<f64>("DEPOT_LONGITUDE")?,
        ) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            (None, None) => None,
            _ => {
                return Err(AppError::Internal(
                    "DEPOT_LATITUDE and DEPOT_LONGITUDE must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: optional_parse("PORT")?.unwrap_or(defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            jwt_secret,
            jwt_expiration: optional_parse("JWT_EXPIRATION")?.unwrap_or(defaults.jwt_expiration),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            gps_fix_max_age_secs: optional_parse("GPS_FIX_MAX_AGE_SECS")?
                .unwrap_or(defaults.gps_fix_max_age_secs),
            fill_urgency_weight: optional_parse("FILL_URGENCY_WEIGHT")?
                .unwrap_or(defaults.fill_urgency_weight),
            two_opt_passes: optional_parse("TWO_OPT_PASSES")?.unwrap_or(defaults.two_opt_passes),
            depot_location,
            zone_service_url: env::var("ZONE_SERVICE_URL").ok().filter(|s| !s.is_empty()),
            push_gateway_url: env::var("PUSH_GATEWAY_URL").ok().filter(|s| !s.is_empty()),
            side_effect_max_attempts: optional_parse("SIDE_EFFECT_MAX_ATTEMPTS")?
                .unwrap_or(defaults.side_effect_max_attempts)
                .max(1),
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional_parse<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Internal(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(None),
    }
}
