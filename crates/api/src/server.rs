use crate::routes::router;
use crate::state::AppState;
use std::io;
use tracing::info;

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

/// HTTP server.
pub struct ApiServer {
    state: AppState,
    config: ServerConfig,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Binds and serves until the process stops.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or the server fails.
    pub async fn run(self) -> io::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.config.bind).await?;
        info!(address = %listener.local_addr()?, "Listening");
        axum::serve(listener, router(self.state)).await
    }
}
