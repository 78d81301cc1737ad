use clmm_yield_monitor::PortfolioReporter;
use std::sync::Arc;

/// Shared state of the handlers.
#[derive(Clone)]
pub struct AppState {
    pub reporter: Arc<dyn PortfolioReporter>,
    /// Wallet reported when the request names none.
    pub default_wallet: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(reporter: Arc<dyn PortfolioReporter>) -> Self {
        Self {
            reporter,
            default_wallet: None,
        }
    }

    /// Sets the wallet used when a request has no `wallet_address`.
    #[must_use]
    pub fn with_default_wallet(mut self, wallet: Option<String>) -> Self {
        self.default_wallet = wallet;
        self
    }
}
