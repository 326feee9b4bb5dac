use crate::db::connection::DbPool;
use crate::db::models::Tasting;
use sqlx::Error;
use sqlx::types::Json;
use uuid::Uuid;

pub async fn create_tasting(
    pool: &DbPool,
    host_id: Uuid,
    host_name: &str,
    name: &str,
    item_count: i32,
) -> Result<Uuid, Error> {
    let tasting_id = Uuid::new_v4();
    let blank_names = Json(vec![String::new(); item_count as usize]);

    sqlx::query(
        "INSERT INTO tastings (id, host_id, host_name, name, item_count, item_names) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(tasting_id)
    .bind(host_id)
    .bind(host_name)
    .bind(name)
    .bind(item_count)
    .bind(blank_names)
    .execute(pool)
    .await?;

    Ok(tasting_id)
}

pub async fn get_tasting(pool: &DbPool, tasting_id: Uuid) -> Result<Option<Tasting>, Error> {
    let row = sqlx::query_as::<_, Tasting>(
        "SELECT id, host_id, host_name, name, item_count, item_names, created_at, closed \
         FROM tastings WHERE id = $1",
    )
    .bind(tasting_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_created_tastings(pool: &DbPool, host_id: Uuid) -> Result<Vec<Tasting>, Error> {
    let rows = sqlx::query_as::<_, Tasting>(
        "SELECT id, host_id, host_name, name, item_count, item_names, created_at, closed \
         FROM tastings WHERE host_id = $1 ORDER BY created_at DESC",
    )
    .bind(host_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Tastings the user has a response in but does not host.
pub async fn get_joined_tastings(pool: &DbPool, user_id: Uuid) -> Result<Vec<Tasting>, Error> {
    let rows = sqlx::query_as::<_, Tasting>(
        "SELECT t.id, t.host_id, t.host_name, t.name, t.item_count, t.item_names, \
                t.created_at, t.closed \
         FROM tastings t \
         JOIN responses r ON r.tasting_id = t.id \
         WHERE r.user_id = $1 AND t.host_id <> $1 \
         ORDER BY t.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn update_item_names(
    pool: &DbPool,
    tasting_id: Uuid,
    item_names: &[String],
) -> Result<(), Error> {
    sqlx::query("UPDATE tastings SET item_names = $2 WHERE id = $1")
        .bind(tasting_id)
        .bind(Json(item_names.to_vec()))
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn close_tasting(pool: &DbPool, tasting_id: Uuid) -> Result<(), Error> {
    sqlx::query("UPDATE tastings SET closed = TRUE WHERE id = $1")
        .bind(tasting_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn delete_tasting(pool: &DbPool, tasting_id: Uuid) -> Result<(), Error> {
    sqlx::query("DELETE FROM tastings WHERE id = $1")
        .bind(tasting_id)
        .execute(pool)
        .await?;

    Ok(())
}
