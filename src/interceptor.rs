//! Hooks for mutating requests, payloads and final errors.
//!
//! A [`Client`](crate::Client) holds at most one interceptor. Its hooks run at
//! fixed points of every attempt:
//!
//! 1. [`before_send`](Interceptor::before_send) just before dispatch (skipped for
//!    file uploads, whose body is a stream),
//! 2. [`after_receive`](Interceptor::after_receive) on the raw payload, before the
//!    status is classified,
//! 3. [`on_error`](Interceptor::on_error) on the typed error, once retries are
//!    exhausted.
//!
//! # Example
//!
//! ```no_run
//! use netpoint::{Client, HeaderInterceptor, ServiceError};
//!
//! # fn main() -> Result<(), netpoint::Error> {
//! let client = Client::<ServiceError>::builder()
//!     .interceptor(HeaderInterceptor::new("authorization", "Bearer token123")?)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::transport::TransportRequest;
use bytes::Bytes;
use http::{HeaderName, HeaderValue};

/// Mutates traffic flowing through a [`Client`](crate::Client).
///
/// Every hook defaults to a no-op. Interceptors are shared by concurrent calls;
/// implementations holding state must synchronize it themselves.
pub trait Interceptor<F>: Send + Sync {
    /// Adjusts the outgoing request.
    fn before_send(&self, _request: &mut TransportRequest) {}

    /// Adjusts the raw response payload.
    fn after_receive(&self, _payload: &mut Bytes) {}

    /// Adjusts the error about to be returned to the caller.
    fn on_error(&self, _error: &mut F) {}
}

/// Sets a header on every outgoing request.
#[derive(Debug, Clone)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    /// Creates an interceptor that sets `name: value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("Invalid header value: {}", e)))?;
        Ok(Self { name, value })
    }
}

impl<F> Interceptor<F> for HeaderInterceptor {
    fn before_send(&self, request: &mut TransportRequest) {
        request.headers.insert(self.name.clone(), self.value.clone());
    }
}
