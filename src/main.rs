use crate::autosave::{ResponseAutosaver, SavePayload, SaveSink};
use crate::sse::TastingEvent;
use crate::startup::AppState;
use axum::{
    Router,
    extract::Extension,
    http::{
        StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{get, post, put},
};
use futures::future::BoxFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_sessions::{
    Expiry, SessionManagerLayer,
    cookie::{SameSite, time::Duration as CookieDuration},
};
use tower_sessions_sqlx_store::PostgresStore;

#[macro_use]
extern crate tracing;

mod auth;
mod autosave;
mod db;
mod error;
mod responses;
mod results;
mod scoring;
mod sse;
mod startup;
mod tastings;

/// Quiet period before a scheduled autosave is written out.
const AUTOSAVE_QUIET: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "INFO");
        }
    }
    // initialize tracing
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let auth_secret = std::env::var("AUTH_TOKEN_SECRET").expect("AUTH_TOKEN_SECRET must be set");

    let db = db::init_db(&database_url)
        .await
        .expect("Unable to initialise database");

    let app_state = AppState::new(db.clone(), &auth_secret);

    let session_store = PostgresStore::new(db.clone());
    session_store
        .migrate()
        .await
        .expect("Unable to migrate session store");

    let events_tx = sse::create_event_broadcaster();

    // Debounced autosaves write through this sink; each write also feeds the
    // live results streams.
    let sink: SaveSink = {
        let db = db.clone();
        let events = events_tx.clone();
        Arc::new(
            move |save: SavePayload| -> BoxFuture<'static, Result<(), sqlx::Error>> {
                let db = db.clone();
                let events = events.clone();
                Box::pin(async move {
                    db::upsert_response(
                        &db,
                        save.tasting_id,
                        save.user_id,
                        &save.display_name,
                        &save.ratings,
                        &save.notes,
                    )
                    .await?;
                    let _ = events.send(TastingEvent::ResponseSaved {
                        tasting_id: save.tasting_id,
                    });
                    Ok(())
                })
            },
        )
    };
    let saver = ResponseAutosaver::new(AUTOSAVE_QUIET, sink);

    // build our application with a route
    let app = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/tastings", post(tastings::create_tasting))
        .route("/tastings/mine", get(tastings::list_my_tastings))
        .route(
            "/tastings/:id",
            get(tastings::get_tasting).delete(tastings::delete_tasting),
        )
        .route("/tastings/:id/items", put(tastings::save_item_names))
        .route("/tastings/:id/close", post(tastings::close_tasting))
        .route(
            "/tastings/:id/response",
            put(responses::save_response).get(responses::get_my_response),
        )
        .route("/tastings/:id/results", get(results::host_results))
        .route("/tastings/:id/final", get(results::final_results))
        .route("/tastings/:id/export", get(results::export_csv))
        .route("/tastings/:id/events", get(sse::tasting_results_sse))
        .layer(Extension(app_state))
        .layer(Extension(events_tx))
        .layer(Extension(saver.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true)
                .allow_methods([
                    axum::http::Method::POST,
                    axum::http::Method::GET,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([CONTENT_TYPE, ACCEPT]),
        )
        .layer(
            SessionManagerLayer::new(session_store)
                .with_name("tasting_session")
                .with_same_site(SameSite::Lax)
                .with_secure(false) // TODO: change this to true when running on an HTTPS/production server instead of locally
                .with_expiry(Expiry::OnInactivity(CookieDuration::hours(24))),
        )
        .fallback(handler_404);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .expect("Invalid BIND_ADDR");
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Unable to spawn tcp listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Teardown policy for pending autosaves is flush, not cancel.
    saver.flush_all().await;
    info!("shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Unable to listen for shutdown signal");
    info!("shutdown signal received");
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
