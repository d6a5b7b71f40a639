use std::sync::Arc;

use loyalty_core::{LedgerRepository, UserRepository};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
    pub auth: AuthConfig,
}

impl AppState {
    /// Both ports served by one backend.
    pub fn new<S>(store: Arc<S>, auth: AuthConfig) -> Self
    where
        S: UserRepository + LedgerRepository + 'static,
    {
        Self {
            users: store.clone(),
            ledger: store,
            auth,
        }
    }
}
