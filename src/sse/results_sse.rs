use crate::auth;
use crate::db;
use crate::results;
use crate::sse::models::{EventSender, TastingEvent};
use crate::startup::AppState;
use axum::{
    extract::{Extension, Path},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde_json::json;
use std::{convert::Infallible, time::Duration};
use tower_sessions::Session;
use uuid::Uuid;

/// Live results stream for the host's manage view: an init snapshot, a
/// recomputed update whenever a response or the item names change, and a
/// terminal event once the tasting closes.
pub async fn tasting_results_sse(
    Extension(app_state): Extension<AppState>,
    Extension(events): Extension<EventSender>,
    session: Session,
    Path(tasting_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = events.subscribe();
    let viewer = auth::session_user_id(&session).await;

    let stream = async_stream::stream! {
        let tasting = match db::get_tasting(&app_state.db, tasting_id).await {
            Ok(Some(tasting)) => tasting,
            _ => {
                yield Ok(Event::default()
                    .event("error")
                    .data(json!({"error": "Tasting not found"}).to_string()));
                return;
            }
        };

        if viewer != Some(tasting.host_id) {
            yield Ok(Event::default()
                .event("error")
                .data(json!({"error": "Only the host may watch results"}).to_string()));
            return;
        }

        match results::load_results(&app_state.db, &tasting).await {
            Ok(stats) => {
                yield Ok(Event::default()
                    .event("init")
                    .data(json!({
                        "tasting_id": tasting_id,
                        "status": tasting.status(),
                        "results": stats,
                    }).to_string()));
            }
            Err(_) => {
                yield Ok(Event::default()
                    .event("error")
                    .data(json!({"error": "Failed to load results"}).to_string()));
            }
        }

        while let Ok(event) = rx.recv().await {
            match event {
                TastingEvent::ResponseSaved { tasting_id: id }
                | TastingEvent::NamesUpdated { tasting_id: id }
                    if id == tasting_id =>
                {
                    // Re-read the tasting so renamed items show up too.
                    let fresh = match db::get_tasting(&app_state.db, tasting_id).await {
                        Ok(Some(fresh)) => fresh,
                        _ => continue,
                    };
                    match results::load_results(&app_state.db, &fresh).await {
                        Ok(stats) => {
                            yield Ok(Event::default()
                                .event("results_update")
                                .data(json!({
                                    "tasting_id": tasting_id,
                                    "results": stats,
                                }).to_string()));
                        }
                        Err(_) => {
                            // Silently continue on error
                        }
                    }
                }
                TastingEvent::TastingClosed(id) if id == tasting_id => {
                    yield Ok(Event::default()
                        .event("tasting_closed")
                        .data(json!({"tasting_id": tasting_id}).to_string()));
                }
                _ => {}
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}
