use crate::db;
use crate::error::AuthError;
use crate::startup::AppState;
use axum::{Json, extract::Extension, response::IntoResponse};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

pub const SESSION_USER_KEY: &str = "user_id";

/// Claims the external identity provider signs into its id tokens. The
/// provider itself (sign-in UI, token issuance) is a black box; this service
/// only verifies and consumes the result.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub name: Option<String>,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub id_token: String,
}

pub fn decode_identity(token: &str, key: &DecodingKey) -> Result<IdentityClaims, AuthError> {
    let data = decode::<IdentityClaims>(token, key, &Validation::new(Algorithm::HS256))?;
    if data.claims.sub.trim().is_empty() {
        return Err(AuthError::InvalidToken);
    }
    Ok(data.claims)
}

/// The signed-in user for this session, if any. Handlers resolve this once
/// and pass the id down explicitly.
pub async fn session_user_id(session: &Session) -> Option<Uuid> {
    session.get::<Uuid>(SESSION_USER_KEY).await.ok().flatten()
}

pub async fn login(
    Extension(app_state): Extension<AppState>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let claims = decode_identity(&payload.id_token, &app_state.auth_key)?;
    let display_name = claims.name.unwrap_or_else(|| claims.sub.clone());

    let user = db::upsert_user(&app_state.db, &claims.sub, &display_name).await?;

    session
        .insert(SESSION_USER_KEY, user.id)
        .await
        .map_err(|_| AuthError::CorruptSession)?;

    info!("User {} signed in", user.id);

    Ok(Json(json!({
        "id": user.id,
        "display_name": user.display_name,
    })))
}

pub async fn logout(session: Session) -> Result<impl IntoResponse, AuthError> {
    session
        .flush()
        .await
        .map_err(|_| AuthError::CorruptSession)?;

    Ok(Json(json!({ "status": "signed_out" })))
}

pub async fn me(
    Extension(app_state): Extension<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AuthError> {
    let user_id = session_user_id(&session)
        .await
        .ok_or(AuthError::Unauthorized)?;

    let user = db::get_user(&app_state.db, user_id)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    Ok(Json(json!({
        "id": user.id,
        "display_name": user.display_name,
    })))
}
