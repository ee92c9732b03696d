//! Envío de notificaciones push a dispositivos móviles
//!
//! Best-effort: un fallo de entrega nunca falla la operación que lo origina.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, message: &PushMessage) -> AppResult<()>;
}

/// Envía los mensajes como JSON a un gateway HTTP de push
pub struct HttpPushSender {
    gateway_url: String,
    client: reqwest::Client,
}

impl HttpPushSender {
    pub fn new(gateway_url: String) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { gateway_url, client })
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(&self, message: &PushMessage) -> AppResult<()> {
        log::debug!("📲 Sending push '{}' via {}", message.title, self.gateway_url);

        let response = self
            .client
            .post(&self.gateway_url)
            .json(message)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Push gateway unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!(
                "Push gateway returned {}",
                status
            )));
        }
        Ok(())
    }
}

/// Usado cuando no hay `PUSH_GATEWAY_URL` configurado
#[derive(Debug, Default)]
pub struct NoopPushSender;

#[async_trait]
impl PushSender for NoopPushSender {
    async fn send(&self, message: &PushMessage) -> AppResult<()> {
        log::debug!("📲 Push disabled, skipping '{}'", message.title);
        Ok(())
    }
}
