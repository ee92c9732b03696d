//! Notificaciones en tiempo real
//!
//! Conjunto cerrado de mensajes del motor de despacho y la interfaz única
//! para enviarlos a un usuario o a todos los usuarios de un rol.
//! El envío es best-effort: a lo sumo una vez y sin orden garantizado.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{MoveRequestStatus, Shift, ShiftStatus, UserRole, Waypoint};
use crate::services::progress::LogicalProgress;
use crate::utils::errors::AppResult;

/// Mensajes que el motor publica
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchMessage {
    /// Estado completo del turno para el conductor
    ShiftUpdate {
        shift: Shift,
        waypoints: Vec<Waypoint>,
        progress: LogicalProgress,
    },
    RouteAssigned {
        shift_id: Uuid,
        route_id: Option<Uuid>,
        total_bins: i32,
    },
    ShiftCancelled {
        shift_id: Uuid,
        cancelled_by: Uuid,
    },
    /// Cambio de estado visto por los managers
    DriverShiftChange {
        driver_id: Uuid,
        shift_id: Uuid,
        status: ShiftStatus,
    },
    ShiftProgress {
        shift_id: Uuid,
        completed_bins: i32,
        total_bins: i32,
        percentage: f64,
    },
    MoveRequestStatusUpdated {
        move_request_id: Uuid,
        bin_id: Uuid,
        status: MoveRequestStatus,
        shift_id: Option<Uuid>,
    },
    DriverLocation {
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
        heading: Option<f64>,
        speed: Option<f64>,
        recorded_at: DateTime<Utc>,
    },
}

impl DispatchMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchMessage::ShiftUpdate { .. } => "shift_update",
            DispatchMessage::RouteAssigned { .. } => "route_assigned",
            DispatchMessage::ShiftCancelled { .. } => "shift_cancelled",
            DispatchMessage::DriverShiftChange { .. } => "driver_shift_change",
            DispatchMessage::ShiftProgress { .. } => "shift_progress",
            DispatchMessage::MoveRequestStatusUpdated { .. } => "move_request_status_updated",
            DispatchMessage::DriverLocation { .. } => "driver_location",
        }
    }
}

/// Destinatario de un mensaje
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Audience {
    User(Uuid),
    Role(UserRole),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope {
    pub audience: Audience,
    pub message: DispatchMessage,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_user(&self, user_id: Uuid, message: DispatchMessage) -> AppResult<()>;
    async fn notify_role(&self, role: UserRole, message: DispatchMessage) -> AppResult<()>;

    /// Envío best-effort: el error solo se registra
    async fn deliver_to_user(&self, user_id: Uuid, message: DispatchMessage) {
        let kind = message.kind();
        if let Err(e) = self.notify_user(user_id, message).await {
            tracing::warn!("⚠️ Failed to notify user {} ({}): {}", user_id, kind, e);
        }
    }

    async fn deliver_to_role(&self, role: UserRole, message: DispatchMessage) {
        let kind = message.kind();
        if let Err(e) = self.notify_role(role, message).await {
            tracing::warn!("⚠️ Failed to notify role {} ({}): {}", role.as_str(), kind, e);
        }
    }
}

/// Reparte los mensajes en un canal `broadcast`; cada suscriptor
/// (p. ej. una conexión WebSocket) filtra por audiencia.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Envelope>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    fn publish(&self, envelope: Envelope) {
        let kind = envelope.message.kind();
        // Sin suscriptores el mensaje simplemente se descarta
        match self.sender.send(envelope) {
            Ok(receivers) => tracing::debug!("📣 {} delivered to {} subscribers", kind, receivers),
            Err(_) => tracing::debug!("📣 {} dropped: no subscribers", kind),
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify_user(&self, user_id: Uuid, message: DispatchMessage) -> AppResult<()> {
        self.publish(Envelope {
            audience: Audience::User(user_id),
            message,
        });
        Ok(())
    }

    async fn notify_role(&self, role: UserRole, message: DispatchMessage) -> AppResult<()> {
        self.publish(Envelope {
            audience: Audience::Role(role),
            message,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_envelopes() {
        let notifier = BroadcastNotifier::new(8);
        let mut receiver = notifier.subscribe();
        let driver = Uuid::new_v4();
        let shift_id = Uuid::new_v4();

        notifier
            .notify_role(
                UserRole::Manager,
                DispatchMessage::DriverShiftChange {
                    driver_id: driver,
                    shift_id,
                    status: ShiftStatus::Active,
                },
            )
            .await
            .unwrap();

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.audience, Audience::Role(UserRole::Manager));
        assert_eq!(envelope.message.kind(), "driver_shift_change");
    }

    #[tokio::test]
    async fn test_send_without_subscribers_is_ok() {
        let notifier = BroadcastNotifier::default();
        let result = notifier
            .notify_user(
                Uuid::new_v4(),
                DispatchMessage::ShiftCancelled {
                    shift_id: Uuid::new_v4(),
                    cancelled_by: Uuid::new_v4(),
                },
            )
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_message_is_tagged() {
        let message = DispatchMessage::ShiftProgress {
            shift_id: Uuid::nil(),
            completed_bins: 1,
            total_bins: 3,
            percentage: 33.3,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "shift_progress");
        assert_eq!(json["total_bins"], 3);
    }
}
