//! HTTP trigger
//!
//! `GET /` starts one cycle in the background and answers immediately.
//! A request that arrives while a cycle is still running is skipped.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::engine::OracleBot;

#[derive(Debug, Serialize)]
struct TriggerResponse {
    message: &'static str,
}

#[derive(Clone)]
struct TriggerState {
    bot: Arc<OracleBot>,
    running: Arc<AtomicBool>,
}

/// Create the trigger router
pub fn create_router(bot: Arc<OracleBot>) -> Router {
    let state = TriggerState {
        bot,
        running: Arc::new(AtomicBool::new(false)),
    };

    Router::new()
        .route("/", get(start_cycle))
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
}

/// GET / - start a cycle
async fn start_cycle(State(state): State<TriggerState>) -> impl IntoResponse {
    if state.running.swap(true, Ordering::SeqCst) {
        warn!("Cycle already running, skipping trigger");
        return Json(TriggerResponse {
            message: "Price oracle already running",
        });
    }

    let TriggerState { bot, running } = state;
    tokio::spawn(async move {
        if let Err(e) = bot.run_cycle().await {
            error!(error = %e, "Triggered cycle failed");
        }
        running.store(false, Ordering::SeqCst);
    });

    Json(TriggerResponse {
        message: "Price oracle started",
    })
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// Serve the trigger until ctrl-c
pub async fn serve(bot: Arc<OracleBot>) -> anyhow::Result<()> {
    let addr = bot.config().trigger.bind_addr.clone();
    let app = create_router(bot);

    info!("🚀 Trigger listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AssetCatalog;
    use crate::config::tests::test_config;
    use crate::oracle::MockRateProvider;
    use crate::registry::MockRegistryGateway;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn quiet_bot() -> Arc<OracleBot> {
        let mut config = test_config();
        config.persistence.state_filename = std::env::temp_dir()
            .join(format!("oraclebot_trigger_{}", uuid::Uuid::new_v4()))
            .join("state.json")
            .display()
            .to_string();

        let mut registry = MockRegistryGateway::new();
        registry
            .expect_get_oracle_snapshot()
            .returning(|_, _, _| Ok(HashMap::new()));
        registry.expect_get_whitelisted_assets().returning(|| Ok(vec![]));
        registry
            .expect_account_balance()
            .returning(|_| Ok(100 * 10u128.pow(24)));

        Arc::new(OracleBot::new(
            config,
            AssetCatalog::default(),
            Vec::new(),
            Arc::new(MockRateProvider::new()),
            Arc::new(registry),
        ))
    }

    async fn body_message(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn get_root_starts_cycle() {
        let app = create_router(quiet_bot());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_message(response).await, "Price oracle started");
    }

    #[tokio::test]
    async fn trigger_while_running_is_skipped() {
        let state = TriggerState {
            bot: quiet_bot(),
            running: Arc::new(AtomicBool::new(true)),
        };

        let response = start_cycle(State(state.clone())).await.into_response();

        assert_eq!(body_message(response).await, "Price oracle already running");
        assert!(state.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let app = create_router(quiet_bot());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
