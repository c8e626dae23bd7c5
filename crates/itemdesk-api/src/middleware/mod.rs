//! HTTP middleware
//!
//! Authentication lives in [`crate::auth::middleware`]; this module holds the
//! layers applied to every route.
//!
//! Author: hephaex@gmail.com

pub mod security_headers;

pub use security_headers::security_headers_middleware;
