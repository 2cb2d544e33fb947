//! HTTP middleware: request logging, response headers and caller extraction

pub mod auth;
mod security;
mod tracing;

pub use auth::{AdminUser, AuthenticatedUser};
pub use security::{json_method_not_allowed, security_headers};
pub use self::tracing::{request_tracing, REQUEST_ID_HEADER};
