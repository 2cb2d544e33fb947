//! Préstamos back office
//!
//! Client registry, loan ledger, payment ledger with sequential receipts, and the
//! voided-receipt archive, served over an axum HTTP API backed by PostgreSQL.

pub mod amortization;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod payment;
pub mod routes;
pub mod sequence;
pub mod state;
pub mod voiding;

pub use routes::router;
pub use state::AppState;
