use crate::auth;
use crate::autosave::{ResponseAutosaver, SavePayload};
use crate::db;
use crate::error::TastingError;
use crate::sse::{EventSender, TastingEvent};
use crate::startup::AppState;
use crate::tastings::{TastingSummary, fetch_tasting};
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::warn;
use uuid::Uuid;

pub const MAX_RATING: u8 = 5;

#[derive(Debug, Deserialize)]
pub struct SaveResponseRequest {
    pub ratings: Vec<Option<u8>>,
    pub notes: Vec<String>,
    /// Debounced background save; the write happens after the quiet period.
    #[serde(default)]
    pub autosave: bool,
}

/// Ratings list brought to exactly `item_count` entries. Extra trailing
/// entries are dropped, missing ones become "not yet rated".
pub fn normalize_ratings(mut ratings: Vec<Option<u8>>, item_count: usize) -> Vec<Option<u8>> {
    ratings.resize(item_count, None);
    ratings
}

pub fn normalize_notes(mut notes: Vec<String>, item_count: usize) -> Vec<String> {
    notes.resize(item_count, String::new());
    notes
}

pub fn validate_ratings(ratings: &[Option<u8>]) -> Result<(), TastingError> {
    for rating in ratings.iter().flatten() {
        if *rating < 1 || *rating > MAX_RATING {
            return Err(TastingError::InvalidRequest(format!(
                "rating {rating} is outside the 1-{MAX_RATING} scale"
            )));
        }
    }
    Ok(())
}

/// Save the caller's ratings and notes for an open tasting. Manual saves
/// write through immediately and surface failures; autosaves are debounced
/// and acknowledged before the write happens.
pub async fn save_response(
    Extension(app_state): Extension<AppState>,
    Extension(events): Extension<EventSender>,
    Extension(saver): Extension<ResponseAutosaver>,
    session: Session,
    Path(tasting_id): Path<Uuid>,
    Json(payload): Json<SaveResponseRequest>,
) -> Result<impl IntoResponse, TastingError> {
    let user_id = auth::session_user_id(&session)
        .await
        .ok_or(TastingError::Unauthorized)?;

    let tasting = fetch_tasting(&app_state.db, tasting_id).await?;
    if tasting.closed {
        return Err(TastingError::TastingClosed);
    }

    validate_ratings(&payload.ratings)?;
    let item_count = tasting.item_count as usize;
    let ratings = normalize_ratings(payload.ratings, item_count);
    let notes = normalize_notes(payload.notes, item_count);

    let user = db::get_user(&app_state.db, user_id)
        .await?
        .ok_or(TastingError::Unauthorized)?;

    if payload.autosave {
        saver
            .schedule(SavePayload {
                tasting_id,
                user_id,
                display_name: user.display_name,
                ratings,
                notes,
            })
            .await;

        Ok((StatusCode::ACCEPTED, Json(json!({ "status": "scheduled" }))))
    } else {
        // A manual save supersedes whatever autosave was still pending.
        saver.cancel(tasting_id, user_id).await;

        db::upsert_response(
            &app_state.db,
            tasting_id,
            user_id,
            &user.display_name,
            &ratings,
            &notes,
        )
        .await?;

        let _ = events.send(TastingEvent::ResponseSaved { tasting_id });

        Ok((StatusCode::OK, Json(json!({ "status": "saved" }))))
    }
}

/// The caller's own saved ratings and notes for a tasting, read-only.
pub async fn get_my_response(
    Extension(app_state): Extension<AppState>,
    session: Session,
    Path(tasting_id): Path<Uuid>,
) -> Result<impl IntoResponse, TastingError> {
    let user_id = auth::session_user_id(&session)
        .await
        .ok_or(TastingError::Unauthorized)?;

    let tasting = fetch_tasting(&app_state.db, tasting_id).await?;

    let response = match db::get_response(&app_state.db, tasting_id, user_id).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to load response for {user_id} in {tasting_id}: {e}");
            None
        }
    };
    let response = response.ok_or(TastingError::ResponseNotFound)?;

    let item_count = tasting.item_count as usize;

    Ok(Json(json!({
        "tasting": TastingSummary::from_tasting(&tasting),
        "ratings": normalize_ratings(response.ratings.0.clone(), item_count),
        "notes": normalize_notes(response.notes.0.clone(), item_count),
        "submitted_at": response.submitted_at.to_rfc3339(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn in_scale_ratings_pass_validation() {
        assert!(validate_ratings(&[Some(1), None, Some(MAX_RATING)]).is_ok());
        assert!(validate_ratings(&[]).is_ok());
    }

    #[test]
    fn out_of_scale_ratings_are_rejected() {
        assert_matches!(
            validate_ratings(&[Some(0)]),
            Err(TastingError::InvalidRequest(_))
        );
        assert_matches!(
            validate_ratings(&[Some(MAX_RATING + 1)]),
            Err(TastingError::InvalidRequest(_))
        );
    }

    #[test]
    fn normalization_pads_short_lists_with_absent_entries() {
        assert_eq!(
            normalize_ratings(vec![Some(3)], 3),
            vec![Some(3), None, None]
        );
        assert_eq!(
            normalize_notes(vec!["oaky".to_string()], 2),
            vec!["oaky".to_string(), String::new()]
        );
    }

    #[test]
    fn normalization_drops_extra_entries() {
        assert_eq!(normalize_ratings(vec![Some(1), Some(2), Some(3)], 2), vec![
            Some(1),
            Some(2)
        ]);
        assert_eq!(normalize_notes(vec!["a".into(), "b".into()], 1), vec![
            "a".to_string()
        ]);
    }
}
