//! Data models for the forecast service.
//!
//! This module contains the forecast payload, request validation, the
//! per-request location context, and HTTP request/response models.

pub mod api;
pub mod forecast;
pub mod location;
pub mod request;

pub use api::*;
pub use forecast::*;
pub use location::*;
pub use request::*;
