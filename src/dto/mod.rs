//! DTOs de entrada y salida de la API

pub mod api_response;
pub mod shift_dto;

pub use api_response::ApiResponse;
pub use shift_dto::*;
