//! Offline walkthrough: a rate-limited endpoint that recovers on retry,
//! followed by the chained image generation.
//!
//! ```sh
//! RUST_LOG=content_gen_pipeline=debug cargo run --example mock_generation
//! ```

use content_gen_pipeline::{
    ChainedImage, ErrorStore, Event, ExecCtx, FnEventHandler, MemoryErrorStore, MockBackend,
    MockStep, Platform, PostChain, Session,
};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mock = Arc::new(
        MockBackend::new()
            .route(
                "/linkedin",
                vec![
                    MockStep::status(429),
                    MockStep::json(
                        200,
                        json!({
                            "linkedin_text": "Staking turns idle ETH into network security.",
                            "image_description": "a glowing vault on a blockchain grid"
                        }),
                    ),
                ],
            )
            .route(
                "/generate_image",
                vec![MockStep::json(200, json!({"image_url": "https://img.example/vault.png"}))],
            ),
    );
    let store = Arc::new(MemoryErrorStore::new());

    let ctx = ExecCtx::builder("http://mock.local")
        .backend(mock.clone())
        .error_store(store.clone())
        .event_handler(Arc::new(FnEventHandler(|event: Event| {
            if let Event::Log { entry, .. } = event {
                println!("{:<8} [{}] {}", entry.level, entry.stage, entry.message);
            }
        })))
        .build();
    let session = Session::new();

    let post = PostChain::new(Platform::LinkedIn)
        .execute(&ctx, &session, "Ethereum staking explained")
        .await?;

    println!();
    println!("Post:  {}", post.text.as_deref().unwrap_or("<none>"));
    match &post.image {
        ChainedImage::Generated(_) => println!("Image: {}", post.image_url().unwrap_or("<none>")),
        ChainedImage::Failed(record) => println!("Image failed: {}", record.message),
        ChainedImage::Skipped => println!("Image: skipped"),
    }

    let errors = store.load().await?;
    println!("Recorded {} failed attempt(s):", errors.len());
    for record in errors {
        println!("  {} {} (retry {})", record.kind, record.message, record.retry_count);
    }
    println!("Backend calls: {}", mock.calls().len());

    Ok(())
}
