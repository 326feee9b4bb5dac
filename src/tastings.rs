use crate::auth;
use crate::autosave::ResponseAutosaver;
use crate::db;
use crate::db::connection::DbPool;
use crate::db::models::{AccessRole, Tasting};
use crate::error::TastingError;
use crate::responses::{normalize_notes, normalize_ratings};
use crate::sse::{EventSender, TastingEvent};
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_ITEMS: i32 = 30;
pub const MAX_NAME_LEN: usize = 50;

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct CreateTastingRequest {
    pub name: String,
    pub item_count: i32,
}

#[derive(Debug, Serialize)]
pub struct SharePayload {
    /// The join code participants type in by hand.
    pub code: String,
    /// Path the client turns into a full join link / QR code.
    pub join_path: String,
}

#[derive(Debug, Serialize)]
pub struct TastingSummary {
    pub id: Uuid,
    pub name: String,
    pub host_name: String,
    pub item_count: i32,
    pub status: &'static str,
    pub created_at: String,
}

impl TastingSummary {
    /// The participant-facing view of a tasting. Deliberately excludes item
    /// names so nothing leaks while the tasting is blind.
    pub fn from_tasting(tasting: &Tasting) -> Self {
        TastingSummary {
            id: tasting.id,
            name: tasting.name.clone(),
            host_name: tasting.host_name.clone(),
            item_count: tasting.item_count,
            status: tasting.status(),
            created_at: tasting.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TastingListEntry {
    pub id: Uuid,
    pub name: String,
    pub item_count: i32,
    pub status: &'static str,
    pub created_at: String,
    pub role: AccessRole,
}

pub fn share_payload(tasting_id: Uuid) -> SharePayload {
    SharePayload {
        code: tasting_id.to_string(),
        join_path: format!("/join/{tasting_id}"),
    }
}

pub fn validate_new_tasting(name: &str, item_count: i32) -> Result<String, TastingError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TastingError::InvalidRequest(
            "tasting name must not be blank".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(TastingError::InvalidRequest(format!(
            "tasting name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if item_count < 1 || item_count > MAX_ITEMS {
        return Err(TastingError::InvalidRequest(format!(
            "item count must be between 1 and {MAX_ITEMS}"
        )));
    }
    Ok(name.to_string())
}

/// Read-path loads are fail-safe: a store failure surfaces as "not found"
/// rather than a hard error, and is only logged here.
pub(crate) async fn fetch_tasting(pool: &DbPool, tasting_id: Uuid) -> Result<Tasting, TastingError> {
    match db::get_tasting(pool, tasting_id).await {
        Ok(Some(tasting)) => Ok(tasting),
        Ok(None) => Err(TastingError::TastingNotFound),
        Err(e) => {
            warn!("Failed to load tasting {tasting_id}: {e}");
            Err(TastingError::TastingNotFound)
        }
    }
}

/// Create a new tasting (signed-in users only). All items start unnamed.
pub async fn create_tasting(
    Extension(app_state): Extension<AppState>,
    session: Session,
    Json(payload): Json<CreateTastingRequest>,
) -> Result<impl IntoResponse, TastingError> {
    let user_id = auth::session_user_id(&session)
        .await
        .ok_or(TastingError::Unauthorized)?;

    let name = validate_new_tasting(&payload.name, payload.item_count)?;

    let host = db::get_user(&app_state.db, user_id)
        .await?
        .ok_or(TastingError::Unauthorized)?;

    let tasting_id = db::create_tasting(
        &app_state.db,
        user_id,
        &host.display_name,
        &name,
        payload.item_count,
    )
    .await?;

    info!("Tasting {tasting_id} created by {user_id}");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "tasting_id": tasting_id,
            "share": share_payload(tasting_id),
        })),
    ))
}

/// Tastings the user hosts merged with the ones they joined, newest first.
pub async fn list_my_tastings(
    Extension(app_state): Extension<AppState>,
    session: Session,
) -> Result<impl IntoResponse, TastingError> {
    let user_id = auth::session_user_id(&session)
        .await
        .ok_or(TastingError::Unauthorized)?;

    let created = db::get_created_tastings(&app_state.db, user_id).await?;

    // A failure here degrades the listing instead of breaking it.
    let joined = match db::get_joined_tastings(&app_state.db, user_id).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!("Unable to load joined tastings for {user_id}: {e}");
            Vec::new()
        }
    };

    let mut entries: Vec<(Tasting, AccessRole)> = created
        .into_iter()
        .map(|t| (t, AccessRole::Host))
        .chain(joined.into_iter().map(|t| (t, AccessRole::Participant)))
        .collect();
    entries.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at));

    let rows: Vec<TastingListEntry> = entries
        .into_iter()
        .map(|(tasting, role)| TastingListEntry {
            id: tasting.id,
            name: tasting.name.clone(),
            item_count: tasting.item_count,
            status: tasting.status(),
            created_at: tasting.created_at.to_rfc3339(),
            role,
        })
        .collect();

    Ok(Json(rows))
}

/// The join view: tasting summary plus the caller's own response, blank if
/// they have not saved one yet.
pub async fn get_tasting(
    Extension(app_state): Extension<AppState>,
    session: Session,
    Path(tasting_id): Path<Uuid>,
) -> Result<impl IntoResponse, TastingError> {
    let user_id = auth::session_user_id(&session)
        .await
        .ok_or(TastingError::Unauthorized)?;

    let tasting = fetch_tasting(&app_state.db, tasting_id).await?;
    let role = AccessRole::resolve(&tasting, user_id);

    let response = match db::get_response(&app_state.db, tasting_id, user_id).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to load response for {user_id} in {tasting_id}: {e}");
            None
        }
    };

    let item_count = tasting.item_count as usize;
    let (ratings, notes, submitted_at) = match response {
        Some(r) => (
            normalize_ratings(r.ratings.0.clone(), item_count),
            normalize_notes(r.notes.0.clone(), item_count),
            Some(r.submitted_at.to_rfc3339()),
        ),
        None => (vec![None; item_count], vec![String::new(); item_count], None),
    };

    Ok(Json(json!({
        "tasting": TastingSummary::from_tasting(&tasting),
        "role": role,
        "response": {
            "ratings": ratings,
            "notes": notes,
            "submitted_at": submitted_at,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct SaveItemNamesRequest {
    pub item_names: Vec<String>,
}

/// Assign real names to items (host only, open tastings only). The reveal
/// becomes visible to participants once the tasting is closed.
pub async fn save_item_names(
    Extension(app_state): Extension<AppState>,
    Extension(events): Extension<EventSender>,
    session: Session,
    Path(tasting_id): Path<Uuid>,
    Json(payload): Json<SaveItemNamesRequest>,
) -> Result<impl IntoResponse, TastingError> {
    let user_id = auth::session_user_id(&session)
        .await
        .ok_or(TastingError::Unauthorized)?;

    let tasting = fetch_tasting(&app_state.db, tasting_id).await?;
    if AccessRole::resolve(&tasting, user_id) != AccessRole::Host {
        return Err(TastingError::NotHost);
    }
    if tasting.closed {
        return Err(TastingError::TastingClosed);
    }

    let mut item_names = payload.item_names;
    item_names.resize(tasting.item_count as usize, String::new());

    db::update_item_names(&app_state.db, tasting_id, &item_names).await?;

    let _ = events.send(TastingEvent::NamesUpdated { tasting_id });

    Ok(Json(json!({ "status": "saved" })))
}

/// Close a tasting (host only): pending autosaves are flushed first so no
/// late write lands after the results freeze. Closing is irreversible.
pub async fn close_tasting(
    Extension(app_state): Extension<AppState>,
    Extension(events): Extension<EventSender>,
    Extension(saver): Extension<ResponseAutosaver>,
    session: Session,
    Path(tasting_id): Path<Uuid>,
) -> Result<impl IntoResponse, TastingError> {
    let user_id = auth::session_user_id(&session)
        .await
        .ok_or(TastingError::Unauthorized)?;

    let tasting = fetch_tasting(&app_state.db, tasting_id).await?;
    if AccessRole::resolve(&tasting, user_id) != AccessRole::Host {
        return Err(TastingError::NotHost);
    }
    if tasting.closed {
        return Err(TastingError::TastingClosed);
    }

    saver.flush_tasting(tasting_id).await?;
    db::close_tasting(&app_state.db, tasting_id).await?;

    let _ = events.send(TastingEvent::TastingClosed(tasting_id));

    info!("Tasting {tasting_id} closed by host {user_id}");

    Ok(Json(json!({ "status": "closed" })))
}

/// Delete a tasting and all of its responses (host only).
pub async fn delete_tasting(
    Extension(app_state): Extension<AppState>,
    Extension(saver): Extension<ResponseAutosaver>,
    session: Session,
    Path(tasting_id): Path<Uuid>,
) -> Result<impl IntoResponse, TastingError> {
    let user_id = auth::session_user_id(&session)
        .await
        .ok_or(TastingError::Unauthorized)?;

    let tasting = fetch_tasting(&app_state.db, tasting_id).await?;
    if AccessRole::resolve(&tasting, user_id) != AccessRole::Host {
        return Err(TastingError::NotHost);
    }

    saver.cancel_tasting(tasting_id).await;
    db::delete_tasting(&app_state.db, tasting_id).await?;

    info!("Tasting {tasting_id} deleted by host {user_id}");

    Ok(Json(json!({ "status": "deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_a_reasonable_tasting() {
        let name = validate_new_tasting("  Rhône night  ", 6).unwrap();
        assert_eq!(name, "Rhône night");
    }

    #[test]
    fn rejects_a_blank_name() {
        assert_matches!(
            validate_new_tasting("   ", 4),
            Err(TastingError::InvalidRequest(_))
        );
    }

    #[test]
    fn rejects_an_overlong_name() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        assert_matches!(
            validate_new_tasting(&name, 4),
            Err(TastingError::InvalidRequest(_))
        );
    }

    #[test]
    fn rejects_item_counts_outside_bounds() {
        assert_matches!(
            validate_new_tasting("ok", 0),
            Err(TastingError::InvalidRequest(_))
        );
        assert_matches!(
            validate_new_tasting("ok", -3),
            Err(TastingError::InvalidRequest(_))
        );
        assert_matches!(
            validate_new_tasting("ok", MAX_ITEMS + 1),
            Err(TastingError::InvalidRequest(_))
        );
        assert!(validate_new_tasting("ok", MAX_ITEMS).is_ok());
        assert!(validate_new_tasting("ok", 1).is_ok());
    }

    #[test]
    fn share_payload_uses_the_id_as_join_code() {
        let id = Uuid::new_v4();
        let share = share_payload(id);
        assert_eq!(share.code, id.to_string());
        assert_eq!(share.join_path, format!("/join/{id}"));
    }
}
