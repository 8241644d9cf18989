//! Example demonstrating interceptors and mapped decoding.
//!
//! This example shows how to:
//! - Add headers to every request
//! - Rewrite raw payloads before they are decoded
//! - Decorate the final error
//! - Unwrap a response envelope with `JsonMapper`
//! - Serve sample data offline
//!
//! Run with: `cargo run --example interceptors`

use bytes::Bytes;
use http::{HeaderValue, Method};
use netpoint::{
    Client, Endpoint, Environment, Error, Interceptor, JsonMapper, ServiceError, TransportRequest,
};
use serde::Deserialize;
use url::Url;

/// Adds an auth header, strips a JSON hijacking prefix and tags errors.
struct ApiHooks {
    token: HeaderValue,
}

impl Interceptor<ServiceError> for ApiHooks {
    fn before_send(&self, request: &mut TransportRequest) {
        request.headers.insert("authorization", self.token.clone());
    }

    fn after_receive(&self, payload: &mut Bytes) {
        if payload.starts_with(b")]}'\n") {
            *payload = payload.slice(5..);
        }
    }

    fn on_error(&self, error: &mut ServiceError) {
        error.code.get_or_insert_with(|| "client".to_string());
    }
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Account {
    id: u64,
    email: String,
}

impl JsonMapper for Account {
    fn map(payload: Bytes) -> Result<Bytes, Error> {
        let mut envelope: serde_json::Value =
            serde_json::from_slice(&payload).map_err(|e| Error::Mapping(e.to_string()))?;
        let account = envelope
            .get_mut("account")
            .map(serde_json::Value::take)
            .ok_or_else(|| Error::Mapping("response has no `account`".to_string()))?;
        serde_json::to_vec(&account)
            .map(Bytes::from)
            .map_err(|e| Error::Mapping(e.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("netpoint=info,interceptors=info")
        .init();

    let client = Client::<ServiceError>::builder()
        .environment(Environment::Test)
        .interceptor(ApiHooks {
            token: HeaderValue::from_static("Bearer demo"),
        })
        .build()?;

    let endpoint = Endpoint::new(Url::parse("https://api.example.com")?, Method::GET, "me")
        .with_sample_data(&b")]}'\n{\"account\":{\"id\":1,\"email\":\"ada@example.com\"}}"[..]);

    let account: Account = client.execute_mapped(&endpoint).await?;
    println!("Signed in as {:?}", account);

    let broken = endpoint.clone().with_sample_data("{}");
    match client.execute_mapped::<Account>(&broken).await {
        Ok(account) => println!("Unexpected account {:?}", account),
        Err(err) => println!("Failed with code {:?}: {}", err.code, err),
    }

    Ok(())
}
