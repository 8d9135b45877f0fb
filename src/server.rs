use crate::config::RestApiConfig;
use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: RestApiConfig,
}

/// Build the router for a loaded configuration
pub fn router(config: RestApiConfig) -> Router {
    let cors_enabled = config.server.cors_enabled;
    let state = Arc::new(AppState { config });

    debug!("Setting up API routes");
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/config", get(config_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        debug!("CORS enabled");
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Start the web server
pub async fn start_server(config: RestApiConfig) -> Result<()> {
    let addr = config.server.bind_address();
    let app = router(config);

    info!("Routes configured:");
    info!("  GET  /health      - Liveness check");
    info!("  GET  /api/config  - Active configuration (passwords redacted)");

    debug!(address = %addr, "Binding TCP listener");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            info!("Listening on http://{}", listener.local_addr()?);
            listener
        }
        Err(e) => {
            error!(address = %addr, error = %e, "Failed to bind to address");
            return Err(e.into());
        }
    };

    match axum::serve(listener, app).await {
        Ok(_) => {
            info!("Server stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Server error");
            Err(e.into())
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Get application configuration
async fn config_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.redacted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(RestApiConfig::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_config_endpoint_redacts_passwords() {
        let response = router(RestApiConfig::default())
            .oneshot(Request::get("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["SERVER_PORT"], 5001);
        assert_eq!(body["SQLDB_SETTINGS"]["user"], "mariaUsr");
        assert_eq!(body["SQLDB_SETTINGS"]["password"], "***");
        assert_eq!(body["MONGODB_SETTINGS"]["password"], "***");
    }

    #[tokio::test]
    async fn test_cors_headers_follow_setting() {
        let request = || {
            Request::get("/health")
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .unwrap()
        };

        let disabled = router(RestApiConfig::default())
            .oneshot(request())
            .await
            .unwrap();
        assert!(disabled
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());

        let mut config = RestApiConfig::default();
        config.server.cors_enabled = true;
        let enabled = router(config).oneshot(request()).await.unwrap();
        assert_eq!(
            enabled.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
