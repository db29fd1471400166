//! Relay HTTP client module for the timetable server.
//!
//! This module provides the `ProxyClient`, which reaches the timetable
//! server through a rotating list of CORS relays, and the `HttpTransport`
//! seam it issues requests through.

pub mod client;
pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ProxyClient;
pub use error::{FetchError, TimetableError};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
