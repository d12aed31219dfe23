//! HTTP request handlers for API endpoints.

pub mod forecast;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod version;

pub use forecast::*;
pub use health::*;
pub use metrics::*;
pub use openapi::*;
pub use version::*;
