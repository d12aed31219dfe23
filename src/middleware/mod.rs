//! Request ID and metrics middleware.

pub mod metrics;
pub mod request_id;

pub use metrics::*;
pub use request_id::*;
