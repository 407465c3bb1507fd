//! HTTP / WebSocket server.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{close_room, get_room_detail, health_check, request_admission, websocket_handler},
    state::AppState,
};

/// Chat server of one instance
///
/// # Example
///
/// ```ignore
/// let server = Server::new(app_state);
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// server.run(listener, shutdown_signal()).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Build the router with every endpoint of the chat service.
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws/chat/{room_id}", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/chat/admission", post(request_admission))
            .route("/api/chat/rooms/{room_id}", get(get_room_detail))
            .route("/api/chat/rooms/{room_id}/close", post(close_room))
            .route("/api/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails while serving.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            "Chat server '{}' listening on {}",
            self.state.instance_id,
            listener.local_addr()?
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
