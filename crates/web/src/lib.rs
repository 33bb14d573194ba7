//! Loopback HTTP front end for the virtual content scheme.
//!
//! Platforms whose webviews cannot register a custom scheme load tools from
//! `http://127.0.0.1:<port>/<toolId>/<path>` instead. Every request goes
//! through the same [`VirtualContentServer`] as scheme requests, so
//! confinement and policy injection are identical.

pub mod content;
pub mod error;

use std::{future::Future, net::SocketAddr, sync::Arc};

use {
    axum::{Router, routing::get},
    tokio::net::TcpListener,
    toolbay_config::ServerConfig,
    toolbay_sandbox::VirtualContentServer,
    tracing::info,
};

pub use error::{Error, Result};

/// Build the content router.
pub fn content_routes(content: Arc<VirtualContentServer>) -> Router {
    Router::new()
        .route("/{tool_id}", get(content::tool_redirect_handler))
        .route("/{tool_id}/", get(content::tool_content_handler))
        .route("/{tool_id}/{*path}", get(content::tool_content_handler))
        .with_state(content)
}

/// Bind the configured address, refusing anything that is not loopback.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let ip = config
        .bind
        .parse::<std::net::IpAddr>()
        .map_err(|_| Error::InvalidAddress(config.bind.clone()))?;
    let addr = SocketAddr::new(ip, config.port);
    if !ip.is_loopback() {
        return Err(Error::NotLoopback(addr));
    }
    Ok(TcpListener::bind(addr).await?)
}

/// Serve tool content on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    content: Arc<VirtualContentServer>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, scheme = content.scheme(), "serving tool content");
    axum::serve(listener, content_routes(content))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("content server stopped");
    Ok(())
}
