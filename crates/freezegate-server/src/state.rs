//! Shared application state injected into every handler via axum's `State`
//! extractor. Mirrors the `Context` bundle at the core-crate boundary plus
//! the transport-specific collaborators (auth, REST rate limiting).

use std::sync::Arc;

use freezegate_core::Context;

use crate::auth::Authenticator;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<Context>,
    pub authenticator: Arc<Authenticator>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(context: Arc<Context>, authenticator: Arc<Authenticator>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { context, authenticator, rate_limiter }
    }
}
