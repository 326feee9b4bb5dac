use crate::db::connection::DbPool;
use crate::db::models::User;
use sqlx::Error;
use uuid::Uuid;

/// Creates the user on first sight of a subject, otherwise refreshes the
/// display name the identity provider reported at this login.
pub async fn upsert_user(pool: &DbPool, subject: &str, display_name: &str) -> Result<User, Error> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, subject, display_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (subject) DO UPDATE SET display_name = EXCLUDED.display_name
        RETURNING id, subject, display_name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subject)
    .bind(display_name)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn get_user(pool: &DbPool, user_id: Uuid) -> Result<Option<User>, Error> {
    let row = sqlx::query_as::<_, User>(
        "SELECT id, subject, display_name, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
