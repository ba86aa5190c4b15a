//! HTTP server initialization and routing

use axum::http::{HeaderName, HeaderValue, Method};
use axum::{routing::get, Router};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::{ServerConfig, TenantConfig};
use crate::core::shared::state::AppState;

use super::{health_check, health_check_simple};

/// Every domain router merged onto one state.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let mut api_router = Router::new()
        .route("/health", get(health_check_simple))
        .route("/api/health", get(health_check))
        .merge(crate::helpdesk::configure_helpdesk_routes())
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::triage::configure_triage_routes())
        .merge(crate::docs::configure_docs_routes())
        .merge(crate::settings::configure_settings_routes())
        .merge(crate::search::configure_search_routes());

    #[cfg(feature = "social")]
    {
        api_router = api_router.merge(crate::social::configure_social_routes());
    }

    let cors = create_cors_layer(&app_state.config.server, &app_state.config.tenant);

    api_router
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// An empty origin list allows any origin. The tenant and user headers are
/// always allowed so browser clients can scope their calls.
pub fn create_cors_layer(server: &ServerConfig, tenant: &TenantConfig) -> CorsLayer {
    let mut headers = vec![axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION];
    for name in [&tenant.header_name, &tenant.user_header_name] {
        match HeaderName::from_bytes(name.as_bytes()) {
            Ok(h) => headers.push(h),
            Err(e) => warn!("Ignoring invalid header name '{name}' for CORS: {e}"),
        }
    }

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(headers);

    if server.cors_allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{o}'");
                None
            }
        })
        .collect();
    info!("CORS restricted to {} origins", origins.len());
    layer.allow_origin(AllowOrigin::list(origins))
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let bind = app_state.config.bind_address();
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{bind}: {e}")))?;

    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {} - is another instance running?", addr, e);
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
