//! Read API over the cache store.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | liveness text |
//! | `GET /api/:tournament/participants` | `[Participant]`, `[]` if never scraped |
//! | `GET /api/:tournament/events` | `[Event]` ascending timestamp, `[]` if never scraped |
//! | `GET /api/:tournament/status` | `last_scraped` metadata for both kinds |
//! | `POST /scrape/:kind` | force one refresh tick, returns the per-tournament report |
//! | `GET {image_base}/*file` | boat photos, falling back to the default asset |
//! | `GET /data/*file` | raw snapshot and metadata files, read-only |
//!
//! `:tournament` may be the display name or the normalized id. Reads never
//! wait on an upstream site: they only ever see the last persisted snapshot.

use crate::identity::normalize;
use crate::images::DEFAULT_IMAGE;
use crate::models::{CacheMeta, Event, Kind, Participant};
use crate::scheduler::Scheduler;
use crate::store::CacheStore;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub store: CacheStore,
    pub scheduler: Arc<Scheduler>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub tournament_id: String,
    pub participants: Option<CacheMeta>,
    pub events: Option<CacheMeta>,
}

pub fn create_router(state: AppState, image_dir: PathBuf, image_base: &str) -> Router {
    let images = ServeDir::new(&image_dir).fallback(ServeFile::new(image_dir.join(DEFAULT_IMAGE)));
    let image_base = format!("/{}", image_base.trim_matches('/'));
    let snapshots = ServeDir::new(state.store.data_dir());

    Router::new()
        .route("/", get(index))
        .route("/api/:tournament/participants", get(participants))
        .route("/api/:tournament/events", get(events))
        .route("/api/:tournament/status", get(status))
        .route("/scrape/:kind", post(scrape))
        .nest_service(&image_base, images)
        .nest_service("/data", snapshots)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> &'static str {
    "Tournament scraper is running."
}

async fn participants(State(state): State<AppState>, Path(tournament): Path<String>) -> Json<Vec<Participant>> {
    Json(state.store.read(&normalize(&tournament), Kind::Participants).await)
}

async fn events(State(state): State<AppState>, Path(tournament): Path<String>) -> Json<Vec<Event>> {
    Json(state.store.read(&normalize(&tournament), Kind::Events).await)
}

async fn status(State(state): State<AppState>, Path(tournament): Path<String>) -> Json<StatusResponse> {
    let id = normalize(&tournament);
    Json(StatusResponse {
        participants: state.store.meta(&id, Kind::Participants).await,
        events: state.store.meta(&id, Kind::Events).await,
        tournament_id: id,
    })
}

async fn scrape(State(state): State<AppState>, Path(kind): Path<String>) -> impl IntoResponse {
    let kind = match kind.as_str() {
        "participants" => Kind::Participants,
        "events" => Kind::Events,
        other => {
            return (StatusCode::NOT_FOUND, format!("unknown snapshot kind: {other}")).into_response();
        }
    };
    info!(%kind, "Manual refresh requested");
    let report = state.scheduler.force_tick(kind).await;
    Json(report).into_response()
}
