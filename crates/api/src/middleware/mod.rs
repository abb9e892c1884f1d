//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (add unique ID to each request and response)
//! 4. Security headers
//! 5. Access-control gate (per route group, see [`auth`])

pub mod auth;
pub mod request_id;
pub mod security_headers;

pub use auth::{Capability, Identity, RequireCapability, require_admin, require_authenticated};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
