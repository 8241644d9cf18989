//! Basic example demonstrating simple GET and POST endpoints.
//!
//! This example shows how to:
//! - Create a client with basic configuration
//! - Describe endpoints with query parameters and bodies
//! - Decode camelCase payloads into snake_case structs
//! - Handle the typed error
//!
//! Run with: `cargo run --example basic_call`

use http::Method;
use netpoint::codec::{KeyDecoding, KeyEncoding};
use netpoint::{Client, Endpoint, ServiceError, Task};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("netpoint=debug,basic_call=info")
        .init();

    let client = Client::<ServiceError>::builder().build()?;
    let api = Url::parse("https://jsonplaceholder.typicode.com")?;

    println!("=== GET Request Example ===");
    let get_post = Endpoint::new(api.clone(), Method::GET, "posts/1")
        .with_key_decoding(KeyDecoding::ConvertFromCamelCase)
        .with_retry_count(2);
    let post: Post = client.execute(&get_post).await?;

    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!();

    println!("=== Query Example ===");
    let by_user = Endpoint::new(api.clone(), Method::GET, "posts")
        .with_task(Task::query([("userId", json!(1))]))
        .with_key_decoding(KeyDecoding::ConvertFromCamelCase);
    let posts: Vec<Post> = client.execute(&by_user).await?;
    println!("User 1 wrote {} posts", posts.len());
    println!();

    println!("=== POST Request Example ===");
    let create = Endpoint::new(api.clone(), Method::POST, "posts")
        .with_task(Task::encodable(NewPost {
            title: "My New Post".to_string(),
            body: "This is the content of my new post!".to_string(),
            user_id: 1,
        }))
        .with_key_encoding(KeyEncoding::ConvertToCamelCase)
        .with_key_decoding(KeyDecoding::ConvertFromCamelCase);
    let created: Post = client.execute(&create).await?;
    println!("Created post ID: {}", created.id);
    println!();

    println!("=== Error Example ===");
    let missing = Endpoint::new(api, Method::GET, "does-not-exist");
    match client.execute::<Post>(&missing).await {
        Ok(post) => println!("Unexpectedly found {:?}", post),
        Err(err) if err.is_unknown() => println!("Failed without details: {}", err),
        Err(err) => println!("Server error: {}", err),
    }

    Ok(())
}
