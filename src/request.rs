//! Turns an [`Endpoint`] into a [`TransportRequest`].

use crate::codec;
use crate::endpoint::Endpoint;
use crate::task::{Body, Fields, Parameters, Task};
use crate::transport::TransportRequest;
use crate::{Error, Result};
use bytes::Bytes;
use http::{header, HeaderValue};
use serde_json::Value;
use url::Url;

/// Builds the request for one attempt at `endpoint`.
///
/// The location is the base URL with the path appended under exactly one `/`
/// (or the base URL verbatim when the path is empty). A query string or
/// fragment already on the base URL is kept. Query parameters are
/// appended before any body is encoded. Uploads carry no body here; the file is
/// attached at dispatch.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if a body cannot be serialized and
/// [`Error::InvalidUrl`] if the base URL cannot take a path.
///
/// # Examples
///
/// ```
/// use netpoint::{build_request, Endpoint, Task};
/// use http::Method;
/// use serde_json::json;
/// use url::Url;
///
/// let endpoint = Endpoint::new(Url::parse("https://api.x/").unwrap(), Method::GET, "search")
///     .with_task(Task::query([("q", json!("cats"))]));
///
/// let request = build_request(&endpoint).unwrap();
/// assert_eq!(request.url.as_str(), "https://api.x/search?q=cats");
/// ```
pub fn build_request(endpoint: &Endpoint) -> Result<TransportRequest> {
    let mut url = resolve_location(endpoint.base_url(), endpoint.path())?;

    let body = match endpoint.task() {
        Task::None | Task::UploadFile { .. } => None,
        Task::QueryParameters(query) => {
            append_query(&mut url, query);
            None
        }
        Task::RawBody(body) => Some(encode_raw(endpoint, body)?),
        Task::EncodableBody(body) => Some(encode_body(endpoint, body)?),
        Task::RawBodyAndQuery { body, query } => {
            append_query(&mut url, query);
            Some(encode_raw(endpoint, body)?)
        }
        Task::EncodableBodyAndQuery { body, query } => {
            append_query(&mut url, query);
            Some(encode_body(endpoint, body)?)
        }
    };

    let mut headers = endpoint.headers().clone();
    if endpoint.task().has_body() && !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    tracing::debug!(
        method = %endpoint.method(),
        url = %url,
        body_bytes = body.as_ref().map_or(0, Bytes::len),
        "Built request"
    );

    Ok(TransportRequest {
        method: endpoint.method().clone(),
        url,
        headers,
        body,
    })
}

fn resolve_location(base: &Url, path: &str) -> Result<Url> {
    let mut url = base.clone();
    if path.is_empty() {
        return Ok(url);
    }
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl(
            url::ParseError::RelativeUrlWithCannotBeABaseBase,
        ));
    }
    let joined = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    Ok(url)
}

fn append_query(url: &mut Url, query: &Parameters) {
    if query.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (key, value) in query {
        pairs.append_pair(key, &query_value(value));
    }
}

/// Renders a JSON value as a query string value.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn encode_raw(endpoint: &Endpoint, body: &Fields) -> Result<Bytes> {
    encode_with(endpoint, || {
        body.iter()
            .map(|(key, value)| -> serde_json::Result<(String, Value)> {
                Ok((key.clone(), value.to_value()?))
            })
            .collect::<serde_json::Result<serde_json::Map<String, Value>>>()
            .map(Value::Object)
    })
}

fn encode_body(endpoint: &Endpoint, body: &Body) -> Result<Bytes> {
    encode_with(endpoint, || body.to_value())
}

fn encode_with(
    endpoint: &Endpoint,
    produce: impl FnOnce() -> serde_json::Result<Value>,
) -> Result<Bytes> {
    let value = codec::encode_value(produce, endpoint.key_encoding(), endpoint.date_encoding())
        .map_err(|e| Error::Encoding(e.to_string()))?;
    let bytes = serde_json::to_vec(&value).map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(Bytes::from(bytes))
}
