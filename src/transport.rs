//! The boundary between the executor and the network.
//!
//! [`Transport`] executes a fully built [`TransportRequest`] and hands back the
//! raw status, headers and payload. [`ReqwestTransport`] is the default
//! implementation; tests and embedders can supply their own.

use crate::progress::UploadProgress;
use crate::task::ProgressHandler;
use crate::{Error, Result};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use url::Url;

/// Size of the chunks an upload is streamed in.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// A request ready to be dispatched.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The resolved location, including any query string.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<Bytes>,
}

/// A response as received from the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw payload.
    pub body: Bytes,
}

/// Executes requests on behalf of a [`Client`](crate::Client).
///
/// Implementations must be safe to share between concurrent calls.
pub trait Transport: Send + Sync + 'static {
    /// Sends a request and returns the response.
    fn dispatch(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse>> + Send;

    /// Streams `file` as the body of `request`, calling `on_progress` as bytes
    /// are sent.
    fn dispatch_upload(
        &self,
        request: TransportRequest,
        file: PathBuf,
        on_progress: ProgressHandler,
    ) -> impl Future<Output = Result<TransportResponse>> + Send;
}

/// A [`Transport`] backed by [`reqwest`].
///
/// Regular requests share one connection pool. Each upload gets a dedicated
/// client so that its progress reporting is isolated from other calls. Upload
/// clients are built fresh and only carry over the transport's timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport with an optional per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: session(timeout)?,
            timeout,
        })
    }

    /// Creates a transport from an existing [`reqwest::Client`].
    ///
    /// The client serves regular requests only. Uploads run on dedicated
    /// clients without a timeout unless one is set with
    /// [`with_upload_timeout`](ReqwestTransport::with_upload_timeout).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Sets the timeout applied to upload clients.
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn send(
        client: &reqwest::Client,
        request: TransportRequest,
        body: Option<reqwest::Body>,
    ) -> Result<TransportResponse> {
        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    async fn dispatch(&self, mut request: TransportRequest) -> Result<TransportResponse> {
        let body = request.body.take().map(reqwest::Body::from);
        Self::send(&self.client, request, body).await
    }

    async fn dispatch_upload(
        &self,
        mut request: TransportRequest,
        file: PathBuf,
        on_progress: ProgressHandler,
    ) -> Result<TransportResponse> {
        let file = tokio::fs::File::open(&file).await?;
        let total = file.metadata().await?.len();

        request
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(total));
        if !request.headers.contains_key(header::CONTENT_TYPE) {
            request.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
        }

        let stream = futures::stream::unfold((Some(file), 0u64), move |(file, sent)| {
            let on_progress = on_progress.clone();
            async move {
                let Some(mut file) = file else {
                    return None;
                };
                let mut chunk = vec![0u8; UPLOAD_CHUNK_SIZE];
                let next: Option<(std::io::Result<Bytes>, (Option<tokio::fs::File>, u64))> =
                    match file.read(&mut chunk).await {
                        Ok(0) => None,
                        Ok(read) => {
                            chunk.truncate(read);
                            let sent = sent + read as u64;
                            let progress = UploadProgress::new(sent, total);
                            on_progress(progress);
                            if progress.is_complete() {
                                tracing::debug!(bytes = total, "Upload body fully streamed");
                            }
                            Some((Ok(Bytes::from(chunk)), (Some(file), sent)))
                        }
                        // Stop after handing the read error to the body.
                        Err(e) => Some((Err(e), (None, sent))),
                    };
                next
            }
        });

        let session = session(self.timeout)?;
        Self::send(&session, request, Some(reqwest::Body::wrap_stream(stream))).await
    }
}

fn session(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(err)
    }
}
