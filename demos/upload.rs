//! Example demonstrating a streaming file upload with progress reporting.
//!
//! Run with: `cargo run --example upload -- <file> <url>`

use http::Method;
use netpoint::{Client, Endpoint, ServiceError, Task};
use std::time::Duration;
use url::Url;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("netpoint=info,upload=info")
        .init();

    let mut args = std::env::args().skip(1);
    let file = args.next().ok_or("usage: upload <file> <url>")?;
    let target = Url::parse(&args.next().ok_or("usage: upload <file> <url>")?)?;

    let client = Client::<ServiceError>::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let endpoint = Endpoint::new(target, Method::POST, "")
        .with_header("Content-Type", "application/octet-stream")?
        .with_retry_count(2)
        .with_task(Task::upload(file, |progress| {
            println!(
                "{:>6.2}% ({}/{} bytes)",
                progress.percentage(),
                progress.bytes_sent,
                progress.total_bytes
            );
        }));

    let response: serde_json::Value = client.execute(&endpoint).await?;
    println!("Server replied: {}", response);

    Ok(())
}
