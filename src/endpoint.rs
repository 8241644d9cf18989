//! Declarative description of a single logical request.

use crate::codec::{DateRule, KeyDecoding, KeyEncoding};
use crate::task::Task;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// Everything needed to call one endpoint: where, how, with what, and under
/// which retry and coding policy.
///
/// Endpoints are immutable once built and can be shared across concurrent calls.
///
/// # Examples
///
/// ```
/// use netpoint::{Endpoint, Task};
/// use netpoint::codec::KeyDecoding;
/// use http::Method;
/// use serde_json::json;
/// use url::Url;
///
/// # fn main() -> Result<(), netpoint::Error> {
/// let endpoint = Endpoint::new(Url::parse("https://api.example.com")?, Method::GET, "search")
///     .with_header("Accept", "application/json")?
///     .with_task(Task::query([("q", json!("cats"))]))
///     .with_retry_count(2)
///     .with_key_decoding(KeyDecoding::ConvertFromCamelCase);
///
/// assert_eq!(endpoint.retry_count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Endpoint {
    base_url: Url,
    path: String,
    method: Method,
    headers: HeaderMap,
    task: Task,
    retry_count: u32,
    date_decoding: DateRule,
    key_decoding: KeyDecoding,
    date_encoding: DateRule,
    key_encoding: KeyEncoding,
    sample_data: Option<Bytes>,
}

impl Endpoint {
    /// Creates an endpoint with no headers, no task and no retries.
    pub fn new(base_url: Url, method: Method, path: impl Into<String>) -> Self {
        Self {
            base_url,
            path: path.into(),
            method,
            headers: HeaderMap::new(),
            task: Task::None,
            retry_count: 0,
            date_decoding: DateRule::default(),
            key_decoding: KeyDecoding::default(),
            date_encoding: DateRule::default(),
            key_encoding: KeyEncoding::default(),
            sample_data: None,
        }
    }

    /// Adds a header. A later value for the same name replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets how body and query data are supplied.
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    /// Sets how many times a failed call is retried after the first attempt.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Sets the key rule applied to request bodies.
    pub fn with_key_encoding(mut self, rule: KeyEncoding) -> Self {
        self.key_encoding = rule;
        self
    }

    /// Sets the key rule applied to response payloads.
    pub fn with_key_decoding(mut self, rule: KeyDecoding) -> Self {
        self.key_decoding = rule;
        self
    }

    /// Sets the date rule applied to request bodies.
    pub fn with_date_encoding(mut self, rule: DateRule) -> Self {
        self.date_encoding = rule;
        self
    }

    /// Sets the date rule applied to response payloads.
    pub fn with_date_decoding(mut self, rule: DateRule) -> Self {
        self.date_decoding = rule;
        self
    }

    /// Sets the canned payload returned when the client runs offline.
    pub fn with_sample_data(mut self, data: impl Into<Bytes>) -> Self {
        self.sample_data = Some(data.into());
        self
    }

    /// The location the path is appended to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The path relative to the base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Headers sent with every attempt.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// How body and query data are supplied.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Retries allowed after the first attempt.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The key rule for request bodies.
    pub fn key_encoding(&self) -> KeyEncoding {
        self.key_encoding
    }

    /// The key rule for response payloads.
    pub fn key_decoding(&self) -> KeyDecoding {
        self.key_decoding
    }

    /// The date rule for request bodies.
    pub fn date_encoding(&self) -> &DateRule {
        &self.date_encoding
    }

    /// The date rule for response payloads.
    pub fn date_decoding(&self) -> &DateRule {
        &self.date_decoding
    }

    /// The canned payload served offline, if any.
    pub fn sample_data(&self) -> Option<&Bytes> {
        self.sample_data.as_ref()
    }
}
