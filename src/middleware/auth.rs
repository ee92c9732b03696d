//! Middleware de autenticación JWT
//!
//! Este módulo extrae el token Bearer, lo verifica e inyecta la identidad
//! (`AuthenticatedUser`) en las extensions de la request.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Extension,
};

use crate::{
    models::auth::AuthenticatedUser,
    state::AppState,
    utils::{errors::AppError, jwt::verify_token},
};

/// Extraer el token del header `Authorization: Bearer <token>`
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware de autenticación JWT
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)
        .ok_or_else(|| AppError::Unauthenticated("Authorization token required".to_string()))?;

    let user = verify_token(token, &state.jwt)?;
    tracing::debug!("🔐 Authenticated {} as {}", user.user_id, user.role.as_str());

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Solo managers y admins; va detrás de `auth_middleware`
pub async fn require_manager(
    Extension(user): Extension<AuthenticatedUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !user.role.is_manager() {
        return Err(AppError::Forbidden("Manager role required".to_string()));
    }
    Ok(next.run(request).await)
}
