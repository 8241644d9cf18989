//! # Netpoint - declarative endpoints over a retrying HTTP executor
//!
//! Netpoint turns an [`Endpoint`], a plain description of one request, into a
//! typed value. Every call goes through the same pipeline: build the request,
//! let the [`Interceptor`] adjust it, dispatch it over a [`Transport`], classify
//! the status, and decode either the result or a typed error. Failed attempts
//! are retried with exponential backoff up to the endpoint's retry count.
//!
//! ## Quick Start
//!
//! ```no_run
//! use netpoint::{Client, Endpoint, ServiceError, Task};
//! use netpoint::codec::{KeyDecoding, KeyEncoding};
//! use http::Method;
//! use serde::{Deserialize, Serialize};
//! use url::Url;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     first_name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     first_name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::<ServiceError>::builder().build()?;
//!     let api = Url::parse("https://api.example.com")?;
//!
//!     // GET with retries
//!     let get_user = Endpoint::new(api.clone(), Method::GET, "users/123").with_retry_count(3);
//!     let user: User = client.execute(&get_user).await?;
//!     println!("User: {}", user.first_name);
//!
//!     // POST with a camelCase wire format
//!     let create_user = Endpoint::new(api, Method::POST, "users")
//!         .with_task(Task::encodable(CreateUser { first_name: "Alice".to_string() }))
//!         .with_key_encoding(KeyEncoding::ConvertToCamelCase)
//!         .with_key_decoding(KeyDecoding::ConvertFromCamelCase);
//!     let created: User = client.execute(&create_user).await?;
//!     println!("Created user with ID: {}", created.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Declarative endpoints** - Location, method, headers, body/query task and policy in one value
//! - **Typed errors** - Failure payloads decode into your own [`ApiError`]; anything else degrades to `unknown`
//! - **Bounded retry** - `retry_count` extra attempts, 200ms backoff doubling each time
//! - **Interception** - One hook each for outgoing requests, raw payloads and final errors
//! - **Mapped decoding** - [`JsonMapper`] types reshape payloads (e.g. unwrap envelopes) before decoding
//! - **Key and date rules** - snake_case/camelCase conversion and [`Timestamp`] wire formats per endpoint
//! - **Streaming uploads** - File bodies with [`UploadProgress`] callbacks
//! - **Offline mode** - Serve endpoint sample data in [`Environment::Preview`] and [`Environment::Test`]
//! - **Automatic logging** - Structured logging with `tracing`
//!
//! ## Error Handling
//!
//! Calls fail with the client's error type once retries are spent:
//!
//! ```no_run
//! use netpoint::{Client, Endpoint, ServiceError};
//! use http::Method;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::<ServiceError>::builder().build()?;
//! let endpoint = Endpoint::new(Url::parse("https://api.example.com")?, Method::GET, "missing");
//! match client.execute::<serde_json::Value>(&endpoint).await {
//!     Ok(value) => println!("Success: {value}"),
//!     Err(err) if err.is_unknown() => eprintln!("Request failed: {err}"),
//!     Err(err) => eprintln!("Server said {:?}: {:?}", err.code, err.message),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod codec;
mod endpoint;
mod error;
pub mod interceptor;
mod logging;
mod progress;
mod request;
pub mod retry;
mod task;
pub mod transport;

pub use client::{Client, ClientBuilder, Environment, JsonMapper};
pub use codec::Timestamp;
pub use endpoint::Endpoint;
pub use error::{ApiError, Error, Result, ServiceError};
pub use interceptor::{HeaderInterceptor, Interceptor};
pub use progress::UploadProgress;
pub use request::build_request;
pub use task::{Body, Fields, Parameters, ProgressHandler, Task};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
