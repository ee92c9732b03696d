//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! JWT y parsing de direcciones.

pub mod address;
pub mod errors;
pub mod jwt;
pub mod validation;
