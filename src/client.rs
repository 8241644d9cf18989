//! The request executor.
//!
//! [`Client`] turns an [`Endpoint`] into a typed value: it builds the request,
//! runs it through the [`Interceptor`] and the [`Transport`], classifies the
//! status, decodes the payload, and retries with exponential backoff until the
//! endpoint's retry budget is spent. Use [`ClientBuilder`] to configure one.

use crate::codec::{self, decode_error};
use crate::endpoint::Endpoint;
use crate::error::ApiError;
use crate::interceptor::Interceptor;
use crate::logging::{log_error, log_request};
use crate::request::build_request;
use crate::retry::Backoff;
use crate::task::Task;
use crate::transport::{ReqwestTransport, Transport};
use crate::{Error, Result};
use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// A pre-decode transform for response types that need the payload reshaped,
/// such as unwrapping an envelope.
///
/// Types implementing this are fetched with [`Client::execute_mapped`]; the
/// structured decode runs on the output of [`map`](JsonMapper::map).
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use netpoint::{Error, JsonMapper};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
/// }
///
/// impl JsonMapper for User {
///     fn map(payload: Bytes) -> Result<Bytes, Error> {
///         let mut envelope: serde_json::Value = serde_json::from_slice(&payload)
///             .map_err(|e| Error::Mapping(e.to_string()))?;
///         let data = envelope
///             .get_mut("data")
///             .map(serde_json::Value::take)
///             .ok_or_else(|| Error::Mapping("missing `data`".to_string()))?;
///         serde_json::to_vec(&data)
///             .map(Bytes::from)
///             .map_err(|e| Error::Mapping(e.to_string()))
///     }
/// }
///
/// let mapped = User::map(Bytes::from_static(br#"{"data":{"id":7}}"#)).unwrap();
/// assert_eq!(&mapped[..], br#"{"id":7}"#);
/// ```
pub trait JsonMapper {
    /// Reshapes the raw payload before it is decoded.
    fn map(payload: Bytes) -> Result<Bytes>;
}

/// Where a client gets its responses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Requests go to the transport.
    #[default]
    Live,
    /// Each endpoint's sample data is served after the configured sample delay.
    Preview,
    /// Each endpoint's sample data is served immediately.
    Test,
}

impl Environment {
    /// Returns `true` if responses come from sample data.
    pub fn is_offline(&self) -> bool {
        !matches!(self, Environment::Live)
    }
}

/// Executes endpoints and decodes their results, surfacing failures as `F`.
///
/// The client is cheap to clone and holds no per-call state, so one instance can
/// serve any number of concurrent calls.
///
/// # Examples
///
/// ```no_run
/// use netpoint::{Client, Endpoint, ServiceError, Task};
/// use http::Method;
/// use serde::Deserialize;
/// use serde_json::json;
/// use std::time::Duration;
/// use url::Url;
///
/// #[derive(Deserialize)]
/// struct SearchResults {
///     items: Vec<String>,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::<ServiceError>::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// let endpoint = Endpoint::new(Url::parse("https://api.example.com")?, Method::GET, "search")
///     .with_task(Task::query([("q", json!("cats"))]))
///     .with_retry_count(3);
///
/// let results: SearchResults = client.execute(&endpoint).await?;
/// println!("Found {} results", results.items.len());
/// # Ok(())
/// # }
/// ```
pub struct Client<F, T = ReqwestTransport> {
    inner: Arc<ClientInner<F, T>>,
}

struct ClientInner<F, T> {
    transport: T,
    interceptor: Option<Box<dyn Interceptor<F>>>,
    environment: Environment,
    sample_delay: Duration,
    backoff: Backoff,
}

impl<F, T> Clone for Client<F, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F, T> fmt::Debug for Client<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("environment", &self.inner.environment)
            .field("initial_backoff", &self.inner.backoff.initial_delay())
            .field("interceptor", &self.inner.interceptor.is_some())
            .finish_non_exhaustive()
    }
}

/// Why a single attempt failed.
enum AttemptError<F> {
    /// The server answered with a non-success status.
    Api(F),
    Failure(Error),
}

impl<F: ApiError> AttemptError<F> {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Api(_) => true,
            AttemptError::Failure(e) => e.is_retryable(),
        }
    }

    fn into_api_error(self) -> F {
        match self {
            AttemptError::Api(error) => error,
            AttemptError::Failure(error) => F::from_error(error),
        }
    }
}

impl<F> From<Error> for AttemptError<F> {
    fn from(error: Error) -> Self {
        AttemptError::Failure(error)
    }
}

impl<F: fmt::Debug> fmt::Display for AttemptError<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Api(error) => write!(f, "Server error: {:?}", error),
            AttemptError::Failure(error) => fmt::Display::fmt(error, f),
        }
    }
}

impl<F: ApiError> Client<F> {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder<F> {
        ClientBuilder::new()
    }
}

impl<F: ApiError, T: Transport> Client<F, T> {
    /// Executes `endpoint` and decodes the success payload directly into `R`.
    ///
    /// # Errors
    ///
    /// Returns the typed error once the endpoint's retry budget is exhausted, or
    /// immediately if the request cannot be built.
    pub async fn execute<R>(&self, endpoint: &Endpoint) -> std::result::Result<R, F>
    where
        R: DeserializeOwned,
    {
        let decode = |endpoint: &Endpoint, payload: Bytes, status: StatusCode| -> Result<R> {
            decode_payload(endpoint, &payload, status)
        };
        self.run(endpoint, decode).await
    }

    /// Executes `endpoint`, passes the success payload through
    /// [`R::map`](JsonMapper::map), and decodes the result into `R`.
    ///
    /// Mapping failures are treated like decode failures and retried.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Client::execute).
    pub async fn execute_mapped<R>(&self, endpoint: &Endpoint) -> std::result::Result<R, F>
    where
        R: DeserializeOwned + JsonMapper,
    {
        let decode = |endpoint: &Endpoint, payload: Bytes, status: StatusCode| -> Result<R> {
            let mapped = R::map(payload)?;
            decode_payload(endpoint, &mapped, status)
        };
        self.run(endpoint, decode).await
    }

    /// Returns the environment this client serves responses from.
    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    async fn run<R, D>(&self, endpoint: &Endpoint, decode: D) -> std::result::Result<R, F>
    where
        D: Fn(&Endpoint, Bytes, StatusCode) -> Result<R>,
    {
        if self.inner.environment.is_offline() {
            return self.run_sample(endpoint, decode).await;
        }

        let mut attempt = 0;
        loop {
            let error = match self.attempt(endpoint, attempt, &decode).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            log_error(endpoint, &error, Some(attempt));

            if !error.is_retryable() || attempt >= endpoint.retry_count() {
                return Err(self.surface(endpoint, error.into_api_error()));
            }

            let delay = self.inner.backoff.delay_after(attempt);
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                attempt = attempt,
                retries = endpoint.retry_count(),
                "Retrying request after delay"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Runs one attempt: build, dispatch, intercept, classify, decode.
    async fn attempt<R, D>(
        &self,
        endpoint: &Endpoint,
        attempt: u32,
        decode: &D,
    ) -> std::result::Result<R, AttemptError<F>>
    where
        D: Fn(&Endpoint, Bytes, StatusCode) -> Result<R>,
    {
        let mut request = build_request(endpoint)?;

        let response = match endpoint.task() {
            Task::UploadFile { file, progress } => {
                self.inner
                    .transport
                    .dispatch_upload(request.clone(), file.clone(), Arc::clone(progress))
                    .await?
            }
            Task::None
            | Task::QueryParameters(_)
            | Task::RawBody(_)
            | Task::EncodableBody(_)
            | Task::RawBodyAndQuery { .. }
            | Task::EncodableBodyAndQuery { .. } => {
                if let Some(interceptor) = &self.inner.interceptor {
                    interceptor.before_send(&mut request);
                }
                self.inner.transport.dispatch(request.clone()).await?
            }
        };

        log_request(
            endpoint,
            &request,
            Some(&response),
            &response.body,
            Some(attempt),
        );

        let status = response.status;
        let mut payload = response.body;
        if let Some(interceptor) = &self.inner.interceptor {
            interceptor.after_receive(&mut payload);
        }

        if !status.is_success() {
            if status.is_client_error() {
                tracing::error!(status = status.as_u16(), "Client error (4xx)");
            } else if status.is_server_error() {
                tracing::warn!(status = status.as_u16(), "Server error (5xx)");
            }
            return Err(AttemptError::Api(decode_error(endpoint, &payload)));
        }

        Ok(decode(endpoint, payload, status)?)
    }

    /// Serves the endpoint's sample data through the same build, intercept and
    /// decode steps, without retries or status classification.
    async fn run_sample<R, D>(&self, endpoint: &Endpoint, decode: D) -> std::result::Result<R, F>
    where
        D: Fn(&Endpoint, Bytes, StatusCode) -> Result<R>,
    {
        self.sample_attempt(endpoint, &decode).await.map_err(|error| {
            log_error(endpoint, &error, None);
            self.surface(endpoint, F::from_error(error))
        })
    }

    async fn sample_attempt<R, D>(&self, endpoint: &Endpoint, decode: &D) -> Result<R>
    where
        D: Fn(&Endpoint, Bytes, StatusCode) -> Result<R>,
    {
        let mut request = build_request(endpoint)?;
        if let Some(interceptor) = &self.inner.interceptor {
            interceptor.before_send(&mut request);
        }

        if self.inner.environment == Environment::Preview {
            tokio::time::sleep(self.inner.sample_delay).await;
        }

        let mut payload = endpoint.sample_data().cloned().unwrap_or_default();
        if let Some(interceptor) = &self.inner.interceptor {
            interceptor.after_receive(&mut payload);
        }

        log_request(endpoint, &request, None, &payload, None);

        decode(endpoint, payload, StatusCode::OK)
    }
    /// Passes the final error through the interceptor.
    fn surface(&self, endpoint: &Endpoint, mut error: F) -> F {
        if let Some(interceptor) = &self.inner.interceptor {
            interceptor.on_error(&mut error);
        }
        tracing::error!(
            error = ?error,
            method = %endpoint.method(),
            path = %endpoint.path(),
            "Request failed permanently"
        );
        error
    }
}

fn decode_payload<R: DeserializeOwned>(
    endpoint: &Endpoint,
    payload: &[u8],
    status: StatusCode,
) -> Result<R> {
    codec::decode(payload, endpoint.key_decoding(), endpoint.date_decoding()).map_err(|e| {
        tracing::error!(
            error = %e,
            raw_response = %String::from_utf8_lossy(payload),
            "Failed to decode response"
        );
        Error::Decoding {
            raw_response: String::from_utf8_lossy(payload).into_owned(),
            serde_error: e.to_string(),
            status,
        }
    })
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use netpoint::{ClientBuilder, Environment, HeaderInterceptor, ServiceError};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), netpoint::Error> {
/// let client = ClientBuilder::<ServiceError>::new()
///     .timeout(Duration::from_secs(30))
///     .initial_backoff(Duration::from_millis(100))
///     .interceptor(HeaderInterceptor::new("User-Agent", "my-app/1.0")?)
///     .environment(Environment::Live)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<F> {
    interceptor: Option<Box<dyn Interceptor<F>>>,
    environment: Environment,
    sample_delay: Duration,
    backoff: Backoff,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
    _error: PhantomData<fn() -> F>,
}

impl<F: ApiError> ClientBuilder<F> {
    /// The delay applied to sample responses in [`Environment::Preview`].
    pub const DEFAULT_SAMPLE_DELAY: Duration = Duration::from_secs(1);

    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            interceptor: None,
            environment: Environment::Live,
            sample_delay: Self::DEFAULT_SAMPLE_DELAY,
            backoff: Backoff::default(),
            timeout: None,
            http_client: None,
            _error: PhantomData,
        }
    }

    /// Installs the interceptor. A client holds at most one; the last call wins.
    pub fn interceptor(mut self, interceptor: impl Interceptor<F> + 'static) -> Self {
        self.interceptor = Some(Box::new(interceptor));
        self
    }

    /// Chooses between the live transport and sample data.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the simulated latency of sample responses in [`Environment::Preview`].
    pub fn sample_delay(mut self, delay: Duration) -> Self {
        self.sample_delay = delay;
        self
    }

    /// Sets the delay before the first retry. Later retries double it.
    pub fn initial_backoff(mut self, delay: Duration) -> Self {
        self.backoff = Backoff::new(delay);
        self
    }

    /// Sets the request timeout.
    ///
    /// With [`reqwest_client`](ClientBuilder::reqwest_client) it only applies
    /// to uploads; the supplied client keeps its own settings.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses an existing [`reqwest::Client`] for non-upload requests. Uploads run
    /// on dedicated clients that only inherit the configured timeout.
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds a client on the default [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn build(mut self) -> Result<Client<F>> {
        let transport = match self.http_client.take() {
            Some(client) => match self.timeout {
                Some(timeout) => ReqwestTransport::from_client(client).with_upload_timeout(timeout),
                None => ReqwestTransport::from_client(client),
            },
            None => ReqwestTransport::new(self.timeout)?,
        };
        Ok(self.build_with_transport(transport))
    }

    /// Builds a client on a custom transport.
    pub fn build_with_transport<T: Transport>(self, transport: T) -> Client<F, T> {
        Client {
            inner: Arc::new(ClientInner {
                transport,
                interceptor: self.interceptor,
                environment: self.environment,
                sample_delay: self.sample_delay,
                backoff: self.backoff,
            }),
        }
    }
}

impl<F: ApiError> Default for ClientBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}
