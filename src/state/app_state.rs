//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::TokenVerifier;
use crate::client::ClientService;
use crate::config::Config;
use crate::loan::LoanService;
use crate::payment::PaymentService;
use crate::voiding::VoidService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub client_service: Arc<ClientService>,
    pub loan_service: Arc<LoanService>,
    pub payment_service: Arc<PaymentService>,
    pub void_service: Arc<VoidService>,
    pub token_verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire every service onto one pool
    pub fn new(db_pool: PgPool, config: &Config) -> Self {
        let retry = config.retry_policy();

        Self {
            client_service: Arc::new(ClientService::new(db_pool.clone())),
            loan_service: Arc::new(LoanService::new(
                db_pool.clone(),
                retry,
                config.loan_default_term_days,
            )),
            payment_service: Arc::new(PaymentService::new(db_pool.clone(), retry)),
            void_service: Arc::new(VoidService::new(db_pool.clone())),
            token_verifier: Arc::new(TokenVerifier::new(config.jwt_secret.clone())),
            db_pool,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Arc<ClientService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.client_service.clone()
    }
}

impl FromRef<AppState> for Arc<LoanService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_service.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payment_service.clone()
    }
}

impl FromRef<AppState> for Arc<VoidService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.void_service.clone()
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_verifier.clone()
    }
}
