//! Generate a post against a running generation service.
//!
//! ```sh
//! cargo run --example live_generation -- http://localhost:5000 twitter "Bitcoin halving recap"
//! ```
//!
//! Failed attempts are appended to `logs/errors.json`.

use content_gen_pipeline::{ChainedImage, PipelineConfig, Platform, PostChain, Session};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let base_url = args.next().unwrap_or_else(|| "http://localhost:5000".to_string());
    let platform: Platform = args.next().as_deref().unwrap_or("linkedin").parse()?;
    let idea = args.collect::<Vec<_>>().join(" ");

    let config = PipelineConfig {
        base_url,
        error_log_path: Some(PathBuf::from("logs/errors.json")),
        ..PipelineConfig::default()
    };
    config.validate()?;
    let ctx = config.build();

    match ctx.check_health().await {
        Ok(reply) => println!("Service is up: {}", reply),
        Err(e) => println!("Health check failed: {}", e),
    }

    let session = Session::new();
    let result = PostChain::new(platform).execute(&ctx, &session, &idea).await;

    for entry in session.log().entries() {
        println!(
            "{} {:<8} [{}] {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.level,
            entry.stage,
            entry.message
        );
    }

    let post = result?;
    println!();
    println!("{}", serde_json::to_string_pretty(&post.content)?);
    if let ChainedImage::Failed(record) = &post.image {
        println!("Image generation failed: {}", record.message);
    } else if let Some(url) = post.image_url() {
        println!("Image: {}", url);
    }
    Ok(())
}
