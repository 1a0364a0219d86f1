//! HTTP exposition of the metric registry.
//!
//! The scrape endpoint runs on its own thread with a single-threaded tokio
//! runtime, so the collection loop stays synchronous and a slow scraper
//! never delays a tick.

use std::io;
use std::net::SocketAddr;
use std::thread;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Registry, TextEncoder};
use tracing::{error, info};

/// Spawns the scrape server on `addr`, returning once the socket is bound.
///
/// Binding synchronously before the thread detaches lets startup fail fast
/// on a port conflict instead of logging from a background thread later.
pub fn spawn(registry: Registry, addr: SocketAddr) -> io::Result<()> {
    let std_listener = std::net::TcpListener::bind(addr)?;
    std_listener.set_nonblocking(true)?;
    info!(%addr, "metrics endpoint listening");

    thread::Builder::new()
        .name("exposition".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(%err, "failed to build exposition runtime");
                    return;
                }
            };

            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(std_listener) {
                    Ok(listener) => listener,
                    Err(err) => {
                        error!(%err, "failed to adopt exposition listener");
                        return;
                    }
                };

                let app = Router::new()
                    .route("/metrics", get(handle_metrics))
                    .with_state(registry);

                if let Err(err) = axum::serve(listener, app).await {
                    error!(%err, "exposition server error");
                }
            });
        })?;

    Ok(())
}

async fn handle_metrics(State(registry): State<Registry>) -> Result<String, StatusCode> {
    TextEncoder::new()
        .encode_to_string(&registry.gather())
        .map_err(|err| {
            error!(%err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
