use crate::db::connection::DbPool;
use crate::db::models::TastingResponse;
use sqlx::Error;
use sqlx::types::Json;
use uuid::Uuid;

/// Full-document overwrite: every save, manual or debounced, replaces the
/// participant's entire response. No per-field merging.
pub async fn upsert_response(
    pool: &DbPool,
    tasting_id: Uuid,
    user_id: Uuid,
    display_name: &str,
    ratings: &[Option<u8>],
    notes: &[String],
) -> Result<(), Error> {
    sqlx::query(
        r#"
        INSERT INTO responses (tasting_id, user_id, display_name, ratings, notes, submitted_at)
        VALUES ($1, $2, $3, $4, $5, CURRENT_TIMESTAMP)
        ON CONFLICT (tasting_id, user_id) DO UPDATE SET
            display_name = EXCLUDED.display_name,
            ratings = EXCLUDED.ratings,
            notes = EXCLUDED.notes,
            submitted_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(tasting_id)
    .bind(user_id)
    .bind(display_name)
    .bind(Json(ratings.to_vec()))
    .bind(Json(notes.to_vec()))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_response(
    pool: &DbPool,
    tasting_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TastingResponse>, Error> {
    let row = sqlx::query_as::<_, TastingResponse>(
        "SELECT tasting_id, user_id, display_name, ratings, notes, submitted_at \
         FROM responses WHERE tasting_id = $1 AND user_id = $2",
    )
    .bind(tasting_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_all_responses(
    pool: &DbPool,
    tasting_id: Uuid,
) -> Result<Vec<TastingResponse>, Error> {
    let rows = sqlx::query_as::<_, TastingResponse>(
        "SELECT tasting_id, user_id, display_name, ratings, notes, submitted_at \
         FROM responses WHERE tasting_id = $1 ORDER BY submitted_at",
    )
    .bind(tasting_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
