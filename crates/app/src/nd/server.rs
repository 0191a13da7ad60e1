//! Control-plane HTTP server.
//!
//! Runs on a dedicated thread so the render hot path never touches the
//! Actix runtime. Exposes the buffered sweep frames per side, a shutdown
//! endpoint, Prometheus metrics, and a liveness probe.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use base64::Engine;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::error;

use sim_link::Side;

use crate::nd::data::{SharedTransitions, ThresholdData};

/// Shared state backing the HTTP handlers.
struct ServerState {
    transitions: SharedTransitions,
    shutdown_flag: Arc<AtomicBool>,
    prometheus: PrometheusHandle,
}

/// Handle for the control-plane server thread.
#[derive(Default)]
pub(crate) struct ControlServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ControlServer {
    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

#[derive(Serialize)]
struct FrameDataResponse {
    side: &'static str,
    timestamp: u64,
    thresholds: ThresholdData,
    /// Base64-encoded PNG frames of the buffered sweep.
    frames: Vec<String>,
}

/// Spawn the control-plane server thread.
pub(crate) fn spawn_control_server(
    port: u16,
    transitions: SharedTransitions,
    shutdown_flag: Arc<AtomicBool>,
    prometheus: PrometheusHandle,
) -> Result<ControlServer> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = std::thread::Builder::new()
        .name("nd-control-server".into())
        .spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(web::Data::new(ServerState {
                            transitions: transitions.clone(),
                            shutdown_flag: shutdown_flag.clone(),
                            prometheus: prometheus.clone(),
                        }))
                        .route("/frame-data/{side}", web::get().to(frame_data_handler))
                        .route("/shutdown", web::post().to(shutdown_handler))
                        .route("/metrics", web::get().to(metrics_handler))
                        .route("/health", web::get().to(health_handler))
                })
                .bind(("0.0.0.0", port))?
                .run();

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            }) {
                error!("control-plane server error: {err}");
            }
        })
        .context("Failed to spawn control-plane server thread")?;
    Ok(ControlServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

/// Return the buffered sweep of one side as JSON.
async fn frame_data_handler(
    path: web::Path<String>,
    state: web::Data<ServerState>,
) -> HttpResponse {
    let Some(side) = Side::from_label(path.as_str()) else {
        return HttpResponse::BadRequest().body("side must be L or R");
    };

    let snapshot = match state.transitions.lock() {
        Ok(guard) => guard.get(side).clone(),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };

    match snapshot {
        Some(snapshot) => {
            let engine = base64::engine::general_purpose::STANDARD;
            HttpResponse::Ok().json(FrameDataResponse {
                side: side.label(),
                timestamp: snapshot.timestamp_ms,
                thresholds: snapshot.thresholds,
                frames: snapshot
                    .frames
                    .iter()
                    .map(|png| engine.encode(png))
                    .collect(),
            })
        }
        None => HttpResponse::NoContent().finish(),
    }
}

/// Request a graceful teardown of the whole renderer.
async fn shutdown_handler(state: web::Data<ServerState>) -> HttpResponse {
    state.shutdown_flag.store(true, Ordering::SeqCst);
    HttpResponse::Ok().json(serde_json::json!({ "status": "shutting down" }))
}

async fn metrics_handler(state: web::Data<ServerState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.prometheus.render())
}

async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}
