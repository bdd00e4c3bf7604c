// Server module entry point
// Accept loop, per-connection handling and the pages directory handler

pub mod connection;
pub mod listener;
pub mod pages;

use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::AppState;
use crate::logger;

pub use connection::accept_connection;
pub use listener::create_reusable_listener;

/// Accept connections until Ctrl+C (SIGINT) is received
///
/// Must run inside a `LocalSet`: connections are served with `spawn_local`.
pub async fn run(listener: TcpListener, state: Arc<AppState>) {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            logger::log_error(&format!("Failed to listen for shutdown signal: {e}"));
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => match accept_result {
                Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
            },
            () = &mut shutdown => {
                logger::log_shutdown();
                return;
            }
        }
    }
}
