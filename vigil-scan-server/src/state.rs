use std::fmt;
use std::sync::Arc;

use vigil_config::ScanServerConfig;
use vigil_core::ScanExecutor;

use crate::auth::TokenVerifier;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn ScanExecutor>,
    pub verifier: Arc<TokenVerifier>,
    pub limiter: Arc<RateLimiter>,
    /// Used when a request omits `args`.
    pub default_args: String,
    pub trust_proxy_headers: bool,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("verifier", &self.verifier)
            .field("limiter", &self.limiter)
            .field("default_args", &self.default_args)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        executor: Arc<dyn ScanExecutor>,
        verifier: TokenVerifier,
        settings: &ScanServerConfig,
    ) -> Self {
        Self {
            executor,
            verifier: Arc::new(verifier),
            limiter: Arc::new(RateLimiter::default()),
            default_args: settings.default_args.clone(),
            trust_proxy_headers: settings.trust_proxy_headers,
        }
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Arc::new(limiter);
        self
    }
}
