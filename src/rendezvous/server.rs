//! HTTP rendezvous service: `POST /register` and `GET /peer/{peer_id}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, warn};

use super::store::Store;
use super::types::PeerDescriptor;

/// The rendezvous HTTP service. Owns a pluggable `Store` and serves the
/// register/lookup endpoints over HTTP/JSON.
pub struct RendezvousServer {
    store: Arc<dyn Store>,
}

impl RendezvousServer {
    /// Wrap a store behind the rendezvous HTTP surface.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub(crate) fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/register", post(register))
            .route("/peer/:peer_id", get(lookup))
            .with_state(self)
    }

    /// Bind `addr` and serve until the `shutdown` future resolves.
    pub async fn serve(
        self: Arc<Self>,
        addr: SocketAddr,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> crate::error::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(crate::error::WgAgentError::Io)?;
        info!(%addr, "rendezvous server listening");

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(crate::error::WgAgentError::Io)?;

        info!("rendezvous server stopped");
        Ok(())
    }
}

async fn register(
    State(server): State<Arc<RendezvousServer>>,
    Json(descriptor): Json<PeerDescriptor>,
) -> impl IntoResponse {
    if let Err(e) = descriptor.validate() {
        warn!(error = %e, "rejected malformed register request");
        return (StatusCode::BAD_REQUEST, e.to_string());
    }

    match server.store.register(descriptor.clone()).await {
        Ok(()) => {
            info!(peer_id = %descriptor.peer_id, "peer registered");
            (StatusCode::OK, "ok".to_string())
        }
        Err(e) => {
            warn!(error = %e, "failed to register peer");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to register peer".to_string())
        }
    }
}

async fn lookup(
    State(server): State<Arc<RendezvousServer>>,
    Path(peer_id): Path<String>,
) -> impl IntoResponse {
    match server.store.lookup(&peer_id).await {
        Ok(Some(descriptor)) => (StatusCode::OK, Json(descriptor)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "peer not found").into_response(),
        Err(e) => {
            warn!(error = %e, "lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "lookup failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendezvous::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn descriptor_json(peer_id: &str) -> String {
        let pk = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [3u8; 32]);
        format!(
            r#"{{"peer_id":"{}","public_key":"{}","endpoint":"1.2.3.4:5555","allowed_ips":["10.0.0.2/32"]}}"#,
            peer_id, pk
        )
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let server = Arc::new(RendezvousServer::new(Arc::new(MemoryStore::new())));
        let app = server.router();

        let req = Request::builder()
            .method("POST")
            .uri("/register")
            .header("content-type", "application/json")
            .body(Body::from(descriptor_json("peer-a")))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/peer/peer-a")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_peer_is_404() {
        let server = Arc::new(RendezvousServer::new(Arc::new(MemoryStore::new())));
        let app = server.router();

        let req = Request::builder()
            .uri("/peer/ghost")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_register_is_400() {
        let server = Arc::new(RendezvousServer::new(Arc::new(MemoryStore::new())));
        let app = server.router();

        let body = r#"{"peer_id":"p","public_key":"not-base64!!","endpoint":"x","allowed_ips":[]}"#;
        let req = Request::builder()
            .method("POST")
            .uri("/register")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
