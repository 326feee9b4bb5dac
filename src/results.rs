use crate::auth;
use crate::db;
use crate::db::connection::DbPool;
use crate::db::models::{AccessRole, Tasting, TastingResponse};
use crate::error::TastingError;
use crate::scoring::{self, ItemStat};
use crate::startup::AppState;
use crate::tastings::{TastingSummary, fetch_tasting};
use axum::{
    Json,
    extract::{Extension, Path},
    http::header,
    response::IntoResponse,
};
use serde_json::json;
use tower_sessions::Session;
use tracing::warn;
use uuid::Uuid;

/// Recomputes the ranked statistics for a tasting from its responses. Fresh
/// on every call; nothing derived is ever stored.
pub async fn load_results(pool: &DbPool, tasting: &Tasting) -> Result<Vec<ItemStat>, sqlx::Error> {
    let responses = db::get_all_responses(pool, tasting.id).await?;
    let ratings: Vec<Vec<Option<u8>>> = responses.iter().map(|r| r.ratings.0.clone()).collect();
    Ok(scoring::tabulate(
        tasting.item_count as usize,
        &tasting.item_names_padded(),
        &ratings,
    ))
}

async fn load_results_failsafe(
    pool: &DbPool,
    tasting: &Tasting,
) -> Result<Vec<ItemStat>, TastingError> {
    load_results(pool, tasting).await.map_err(|e| {
        warn!("Failed to load responses for tasting {}: {e}", tasting.id);
        TastingError::TastingNotFound
    })
}

/// Live results for the host's manage view. Works while the tasting is
/// still open; participants never see this surface.
pub async fn host_results(
    Extension(app_state): Extension<AppState>,
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

    let results = load_results_failsafe(&app_state.db, &tasting).await?;
    let top_item = results.first().cloned();

    Ok(Json(json!({
        "tasting": TastingSummary::from_tasting(&tasting),
        "item_names": tasting.item_names_padded(),
        "results": results,
        "top_item": top_item,
    })))
}

/// Final results with the reveal. Only available once the host has closed
/// the tasting, and then visible to anyone holding the link.
pub async fn final_results(
    Extension(app_state): Extension<AppState>,
    Path(tasting_id): Path<Uuid>,
) -> Result<impl IntoResponse, TastingError> {
    let tasting = fetch_tasting(&app_state.db, tasting_id).await?;
    if !tasting.closed {
        return Err(TastingError::TastingNotClosed);
    }

    let results = load_results_failsafe(&app_state.db, &tasting).await?;
    let top_item = results.first().cloned();

    Ok(Json(json!({
        "tasting": TastingSummary::from_tasting(&tasting),
        "item_names": tasting.item_names_padded(),
        "results": results,
        "top_item": top_item,
    })))
}

/// CSV download of the final results: the ranked summary, then every
/// participant's ratings and notes.
pub async fn export_csv(
    Extension(app_state): Extension<AppState>,
    Path(tasting_id): Path<Uuid>,
) -> Result<impl IntoResponse, TastingError> {
    let tasting = fetch_tasting(&app_state.db, tasting_id).await?;
    if !tasting.closed {
        return Err(TastingError::TastingNotClosed);
    }

    let responses = match db::get_all_responses(&app_state.db, tasting_id).await {
        Ok(responses) => responses,
        Err(e) => {
            warn!("Failed to load responses for tasting {tasting_id}: {e}");
            return Err(TastingError::TastingNotFound);
        }
    };

    let ratings: Vec<Vec<Option<u8>>> = responses.iter().map(|r| r.ratings.0.clone()).collect();
    let stats = scoring::tabulate(
        tasting.item_count as usize,
        &tasting.item_names_padded(),
        &ratings,
    );

    let csv = results_csv(&stats, &responses);

    let file_stem = tasting.name.replace('"', "'");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"TastingResults-{file_stem}.csv\""),
            ),
        ],
        csv,
    ))
}

/// Ranked summary rows, a blank line, then one row per (participant, item).
/// Averages are rounded to two decimals here and only here; the stats keep
/// full precision.
pub fn results_csv(stats: &[ItemStat], responses: &[TastingResponse]) -> String {
    let mut csv = String::from("Item Number,Item Name,Average Rating,Votes\n");
    for item in stats {
        csv.push_str(&format!(
            "{},\"{}\",{:.2},{}\n",
            item.number,
            csv_escape(&item.name),
            item.average,
            item.votes
        ));
    }

    csv.push('\n');
    csv.push_str("Participant,Item Number,Rating,Notes\n");
    for response in responses {
        for (idx, rating) in response.ratings.0.iter().enumerate() {
            let rating_cell = rating.map(|v| v.to_string()).unwrap_or_default();
            let note = response.notes.0.get(idx).map(String::as_str).unwrap_or("");
            csv.push_str(&format!(
                "\"{}\",{},{},\"{}\"\n",
                csv_escape(&response.display_name),
                idx + 1,
                rating_cell,
                csv_escape(note)
            ));
        }
    }

    csv
}

fn csv_escape(field: &str) -> String {
    field.replace('"', "\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;
    use sqlx::types::chrono::Utc;

    fn response(name: &str, ratings: Vec<Option<u8>>, notes: Vec<&str>) -> TastingResponse {
        TastingResponse {
            tasting_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            display_name: name.to_string(),
            ratings: Json(ratings),
            notes: Json(notes.into_iter().map(String::from).collect()),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn summary_section_is_ranked_and_rounded() {
        let stats = scoring::tabulate(
            2,
            &["Gamay".to_string(), String::new()],
            &[vec![Some(2), Some(5)], vec![Some(3), None]],
        );
        let csv = results_csv(&stats, &[]);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Item Number,Item Name,Average Rating,Votes");
        // Item 2 averages 5.00 with one vote and ranks first.
        assert_eq!(lines[1], "2,\"Item 2\",5.00,1");
        assert_eq!(lines[2], "1,\"Gamay\",2.50,2");
    }

    #[test]
    fn detail_section_lists_every_participant_row() {
        let stats = scoring::tabulate(2, &[String::new(), String::new()], &[]);
        let responses = vec![response("Alice", vec![Some(4), None], vec!["bright", ""])];
        let csv = results_csv(&stats, &responses);

        let detail_start = csv.find("Participant,Item Number,Rating,Notes").unwrap();
        let detail: Vec<&str> = csv[detail_start..].lines().collect();
        assert_eq!(detail[1], "\"Alice\",1,4,\"bright\"");
        // An absent rating renders as an empty cell, not a zero.
        assert_eq!(detail[2], "\"Alice\",2,,\"\"");
    }

    #[test]
    fn quotes_are_doubled_in_quoted_fields() {
        let stats = scoring::tabulate(
            1,
            &["Ch\"teau".to_string()],
            &[vec![Some(4)]],
        );
        let responses = vec![response("An \"anon\" taster", vec![Some(4)], vec!["a \"note\""])];
        let csv = results_csv(&stats, &responses);

        assert!(csv.contains("\"Ch\"\"teau\""));
        assert!(csv.contains("\"An \"\"anon\"\" taster\""));
        assert!(csv.contains("\"a \"\"note\"\"\""));
    }

    #[test]
    fn rounding_happens_only_at_the_csv_boundary() {
        let stats = scoring::tabulate(1, &[String::new()], &[
            vec![Some(1)],
            vec![Some(1)],
            vec![Some(2)],
        ]);
        assert_eq!(stats[0].average, 4.0 / 3.0);
        let csv = results_csv(&stats, &[]);
        assert!(csv.lines().nth(1).unwrap().contains(",1.33,"));
    }

    #[test]
    fn empty_tasting_exports_header_only_sections() {
        let stats = scoring::tabulate(0, &[], &[]);
        let csv = results_csv(&stats, &[]);
        assert_eq!(
            csv,
            "Item Number,Item Name,Average Rating,Votes\n\nParticipant,Item Number,Rating,Notes\n"
        );
    }
}
