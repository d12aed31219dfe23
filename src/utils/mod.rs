//! Helpers for request inspection and log hygiene.

pub mod http;
pub mod redact;
pub mod route;

pub use http::*;
pub use redact::*;
pub use route::*;
