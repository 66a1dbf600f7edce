mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::board::BoardController;
use crate::config::BoardConfig;
use crate::db::Database;

/// Shared handler state. All requests go through one board controller, so a
/// move submitted while another is being saved is rejected as busy.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub board: Arc<BoardController<Database>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            board: Arc::new(BoardController::new(db.clone())),
            db,
        }
    }
}

pub fn create_router(db: Database) -> Router {
    create_router_with_config(db, &BoardConfig::default())
}

pub fn create_router_with_config(db: Database, config: &BoardConfig) -> Router {
    let api = Router::new()
        // Sprints
        .route("/sprints", get(handlers::list_sprints))
        .route("/sprints", post(handlers::create_sprint))
        .route("/sprints/{id}", get(handlers::get_sprint))
        // Board
        .route("/board", get(handlers::get_board))
        .route("/board/moves", post(handlers::move_epic))
        // Epics
        .route("/epics", get(handlers::list_ungrouped_epics))
        .route("/epics", post(handlers::create_epic))
        .route("/epics/{id}", get(handlers::get_epic))
        .route("/epics/{id}/work-items", post(handlers::create_work_item))
        // Work items
        .route("/work-items/{id}/complete", post(handlers::complete_work_item))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(config.cors_layer()),
        )
        .with_state(AppState::new(db))
}
