//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean al schema PostgreSQL
//! del motor de despacho (turnos, waypoints, move requests, historial).

pub mod auth;
pub mod bin;
pub mod incident;
pub mod location;
pub mod move_request;
pub mod shift;
pub mod shift_history;
pub mod waypoint;

pub use auth::*;
pub use bin::*;
pub use incident::*;
pub use location::*;
pub use move_request::*;
pub use shift::*;
pub use shift_history::*;
pub use waypoint::*;
