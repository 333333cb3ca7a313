use std::path::PathBuf;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

pub mod handlers;
pub mod history;
pub mod logic;
pub mod presence;
pub mod state;

use crate::handlers::{ping_handler, ws_handler};
use crate::state::AppState;

pub fn router(state: AppState, public_dir: PathBuf) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ping", get(ping_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .with_state(state)
}

/// Drops every peer channel. Each connection's writer task then sends a close
/// frame and the socket loops wind down on their own.
pub async fn disconnect_all(state: &AppState) -> usize {
    let mut canvas = state.canvas.lock().await;
    let count = canvas.peers.len();
    canvas.peers.clear();
    count
}
