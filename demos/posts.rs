//! Fetching and creating posts against a public JSON API.
//!
//! This example shows how to:
//! - Create a client with a default header, a timeout and retries
//! - Decode a JSON array while skipping malformed elements
//! - Send form-encoded parameters and keep some of them visible in logs
//! - Receive every failed request on the failure channel
//!
//! Run with: `cargo run --example posts`

use netable::{Client, Error, Request, RetryConfiguration, RetryableErrors};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
struct Post {
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewPost {
    title: String,
    body: String,
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("netable=debug,posts=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .default_header("User-Agent", "netable-demo/0.1")?
        .timeout(Duration::from_secs(10))
        .retry_configuration(RetryConfiguration::new(
            RetryableErrors::TransportOnly,
            2,
            Duration::from_millis(500),
        ))
        .build()?;

    let mut failures = client.subscribe_failures();
    tokio::spawn(async move {
        while let Some(error) = failures.recv().await {
            eprintln!("[failure channel] {}", error);
        }
    });

    println!("=== Lossy array decode ===");
    let response = client
        .send(Request::<(), Vec<Post>>::get("/posts").lossy_arrays())
        .await?;
    println!("Fetched {} posts in {:?}", response.data.len(), response.latency);
    if let Some(first) = response.data.first() {
        println!("First title: {}", first.title);
    }
    println!();

    println!("=== Form-encoded POST ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let created = client
        .execute(
            Request::<(), serde_json::Value>::post("/posts")
                .parameters(new_post)
                .url_encoded()
                .unredacted(["title"]),
        )
        .await?;
    println!("Created: {}", created);
    println!();

    println!("=== Failed request ===");
    match client.get::<Post>("/posts/not-a-post").await {
        Ok(post) => println!("Unexpected post: {:?}", post),
        Err(e) => println!("Failed as expected: {}", e),
    }

    // Give the failure channel task a moment to print.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
