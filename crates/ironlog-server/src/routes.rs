// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Router assembly and the serve loop.

use std::time::Duration;

use axum::Router;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::{require_identity, require_user};
use crate::handlers::{self, auth, exercises, health, logs, routines};
use crate::state::AppState;

/// Build the full application router.
///
/// `/health` is public, `/api/auth/register` needs a verified token, and
/// every other `/api` route needs a verified token mapped to a local user.
pub fn build_router(state: AppState) -> Router {
    let registration = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route_layer(from_fn_with_state(state.clone(), require_identity));

    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        // Exercises
        .route("/api/exercises", get(exercises::list).post(exercises::create))
        .route("/api/exercises/grouped", get(exercises::grouped))
        .route("/api/exercises/{id}", axum::routing::delete(exercises::delete))
        // Routines
        .route("/api/routines", get(routines::list).post(routines::create))
        .route(
            "/api/routines/{routine_id}",
            get(routines::get)
                .patch(routines::update)
                .delete(routines::delete),
        )
        .route("/api/routines/{routine_id}/chart", get(routines::chart))
        .route(
            "/api/routines/{routine_id}/{exercise_id}/progress",
            post(routines::add_progress),
        )
        // Workout logs
        .route("/api/logs", get(logs::list).post(logs::create))
        .route("/api/logs/completed", get(logs::completed))
        .route("/api/logs/pending", get(logs::pending))
        .route("/api/logs/{id}", axum::routing::patch(logs::update).delete(logs::delete))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health::health))
        .merge(registration)
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `listener` until SIGINT or SIGTERM.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let app = build_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
}
