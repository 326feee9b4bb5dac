use crate::db::connection::{DbPool, get_pool_stats};
use jsonwebtoken::DecodingKey;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Verification key for the external identity provider's id tokens.
    pub auth_key: Arc<DecodingKey>,
}

impl AppState {
    pub fn new(db: DbPool, auth_secret: &str) -> Self {
        let auth_key = Arc::new(DecodingKey::from_secret(auth_secret.as_bytes()));

        let db_clone = db.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                match db_clone.acquire().await {
                    Ok(conn) => {
                        drop(conn);
                        if let Ok(stats) = get_pool_stats(&db_clone).await {
                            debug!("{stats}");
                        }
                    }
                    Err(e) => {
                        error!("Database connection health check failed: {}", e);
                    }
                }
            }
        });

        AppState { db, auth_key }
    }
}
