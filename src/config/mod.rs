//! Configuration structures and environment loading.
//!
//! Every setting is read from environment variables with a default, so the
//! service starts with nothing configured but the OpenWeather API key.

pub mod logging;
pub mod metrics;
pub mod openweather;
pub mod rate_limit;
pub mod resilient_client;
pub mod server;

pub use logging::*;
pub use metrics::*;
pub use openweather::*;
pub use rate_limit::*;
pub use server::*;
