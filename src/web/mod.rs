//! Browser UI and JSON API served by axum.

pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;
pub mod static_files;
pub mod templates;

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::config::WebConfig;
use state::AppState;

pub async fn run_server(config: WebConfig, app_state: Arc<AppState>) -> io::Result<()> {
    let addr = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("Could not resolve {}:{}", config.host, config.port),
            )
        })?;

    let listener = tokio::net::TcpListener::from_std(bind_listener(addr)?)?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, routes::app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

fn bind_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(socket.into())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
