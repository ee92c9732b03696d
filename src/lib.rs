//! Motor de despacho de turnos para la recolección de contenedores
//!
//! Máquina de estados de turnos, secuenciación de rutas, procesamiento de
//! paradas, finalización de move requests e historial de turnos, expuestos
//! como API HTTP con axum.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
