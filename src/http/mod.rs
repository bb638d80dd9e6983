//! Debug HTTP server surfaced only in debug feature builds.
//!
//! This module spawns a lightweight Axum server that exposes health, the
//! latest quality verdict, an SSE result stream, telemetry, and the record
//! store boundary for diagnostics.

#[cfg(all(feature = "debug_http", debug_assertions))]
mod routes;
#[cfg(all(feature = "debug_http", debug_assertions))]
mod sse;

use std::sync::Arc;

use crate::engine::QualitySession;
use crate::records::RecordStore;

#[cfg(all(feature = "debug_http", debug_assertions))]
pub use routes::{build_router, run_http_server, DebugHttpState};

#[cfg(all(feature = "debug_http", debug_assertions))]
use log::{error, info, warn};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::net::SocketAddr;
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::thread;

#[cfg(all(feature = "debug_http", debug_assertions))]
static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

/// Spawn the debug HTTP server only when the feature flag and debug builds are enabled.
///
/// Bind address comes from `PPG_DEBUG_HTTP_ADDR` (default `127.0.0.1:8787`),
/// the access token from `PPG_DEBUG_TOKEN` (default `ppg-debug`).
#[cfg(all(feature = "debug_http", debug_assertions))]
pub fn spawn_if_enabled(session: QualitySession, store: Arc<dyn RecordStore>) {
    if SERVER_STARTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("Debug HTTP server already running");
        return;
    }

    let addr: SocketAddr = std::env::var("PPG_DEBUG_HTTP_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8787)));

    let token = std::env::var("PPG_DEBUG_TOKEN").unwrap_or_else(|_| "ppg-debug".to_string());
    let preview = token.chars().take(4).collect::<String>();

    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("Failed to build tokio runtime for debug HTTP server: {}", err);
                SERVER_STARTED.store(false, Ordering::SeqCst);
                return;
            }
        };

        info!(
            "Debug HTTP server binding {} (token prefix {}***)",
            addr, preview
        );

        runtime.block_on(async move {
            let state = DebugHttpState::new(session, store, token);
            if let Err(err) = run_http_server(state, addr).await {
                error!("Debug HTTP server stopped: {}", err);
            }
        });
    });
}

#[cfg(not(all(feature = "debug_http", debug_assertions)))]
pub fn spawn_if_enabled(_session: QualitySession, _store: Arc<dyn RecordStore>) {
    // Debug HTTP server disabled in this build.
}
