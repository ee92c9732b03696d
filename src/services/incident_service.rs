//! Colaborador de zonas e incidentes
//!
//! Un incidente reportado al completar una parada se entrega al servicio de
//! zonas, que decide si crea o escala una zona. Para este motor es opaco.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::models::IncidentType;
use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IncidentReport {
    pub latitude: f64,
    pub longitude: f64,
    pub incident_type: IncidentType,
    pub check_id: Uuid,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub reported_by: Uuid,
}

#[async_trait]
pub trait IncidentReporter: Send + Sync {
    async fn report(&self, report: &IncidentReport) -> AppResult<()>;
}

pub struct HttpIncidentReporter {
    base_url: String,
    client: reqwest::Client,
}

impl HttpIncidentReporter {
    pub fn new(base_url: String) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl IncidentReporter for HttpIncidentReporter {
    async fn report(&self, report: &IncidentReport) -> AppResult<()> {
        let url = format!("{}/incidents", self.base_url);
        log::info!(
            "🚧 Reporting {} incident for check {}",
            report.incident_type.as_str(),
            report.check_id
        );

        let response = self
            .client
            .post(&url)
            .json(report)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Zone service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Zone service returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Sin servicio de zonas configurado: solo deja constancia en el log
#[derive(Debug, Default)]
pub struct LoggingIncidentReporter;

#[async_trait]
impl IncidentReporter for LoggingIncidentReporter {
    async fn report(&self, report: &IncidentReport) -> AppResult<()> {
        log::warn!(
            "🚧 Incident {} at ({}, {}) linked to check {} (no zone service configured)",
            report.incident_type.as_str(),
            report.latitude,
            report.longitude,
            report.check_id
        );
        Ok(())
    }
}
