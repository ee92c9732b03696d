//! Servicios del motor de despacho
//!
//! Lógica de negocio: máquina de estados de turnos, secuenciación de rutas,
//! procesamiento de paradas, finalización de move requests e historial,
//! más los colaboradores externos (notificaciones, push, incidentes).

pub mod bin_completion_service;
pub mod driver_locks;
pub mod incident_service;
pub mod location_service;
pub mod move_request_finalizer;
pub mod notification_service;
pub mod progress;
pub mod push_service;
pub mod route_sequencer;
pub mod shift_history_recorder;
pub mod shift_service;
pub mod side_effects;

pub use bin_completion_service::BinCompletionService;
pub use driver_locks::DriverLocks;
pub use location_service::LocationService;
pub use notification_service::{BroadcastNotifier, DispatchMessage, Notifier};
pub use route_sequencer::RouteSequencer;
pub use shift_service::{ShiftService, ShiftSettings};
pub use side_effects::SideEffectRunner;
