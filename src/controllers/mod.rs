//! Controllers de la API

pub mod shift_controller;

pub use shift_controller::ShiftController;
