//! HTTP server.
//!
//! Thin axum layer over [`OAuthService`]: decodes requests, calls the core
//! and renders redirects, pages and JSON.

pub mod api;
pub mod bearer;
pub mod oauth;
pub mod routes;
pub mod throttle;

use std::net::SocketAddr;

use crate::service::OAuthService;

/// The OAuth authorization server.
pub struct OAuthServer {
    service: OAuthService,
}

impl OAuthServer {
    #[must_use]
    pub fn new(service: OAuthService) -> Self {
        Self { service }
    }

    /// Run the HTTP server until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error on server failure.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        let router = routes::create_router(self.service);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }

    #[must_use]
    pub const fn service(&self) -> &OAuthService {
        &self.service
    }
}

impl std::fmt::Debug for OAuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthServer").field("service", &self.service).finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
