//! Structured request and error logging.

use crate::endpoint::Endpoint;
use crate::transport::{TransportRequest, TransportResponse};
use std::fmt::Display;

/// Records one dispatched attempt. `response` is `None` for canned sample data.
pub(crate) fn log_request(
    endpoint: &Endpoint,
    request: &TransportRequest,
    response: Option<&TransportResponse>,
    payload: &[u8],
    attempt: Option<u32>,
) {
    match response {
        Some(response) => tracing::info!(
            method = %request.method,
            url = %request.url,
            path = %endpoint.path(),
            status = response.status.as_u16(),
            bytes = payload.len(),
            upload = endpoint.task().is_upload(),
            attempt = attempt,
            "Received HTTP response"
        ),
        None => tracing::info!(
            method = %request.method,
            url = %request.url,
            path = %endpoint.path(),
            bytes = payload.len(),
            "Served sample response"
        ),
    }

    if tracing::enabled!(tracing::Level::TRACE) {
        tracing::trace!(
            url = %request.url,
            payload = %String::from_utf8_lossy(payload),
            "Response payload"
        );
    }
}

/// Records a failed attempt.
pub(crate) fn log_error(endpoint: &Endpoint, error: &dyn Display, attempt: Option<u32>) {
    tracing::warn!(
        error = %error,
        attempt = attempt,
        method = %endpoint.method(),
        path = %endpoint.path(),
        "Request failed"
    );
}
