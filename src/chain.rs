//! Text-then-image post generation.
//!
//! [`PostChain`] generates a post for a [`Platform`], then, if the result
//! carries the platform's image description field, runs a second,
//! independent [`GenerateCall`] for the image. The image call only starts
//! after the text call succeeded; its failure is reported next to the text
//! result instead of replacing it.

use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    generate_call::GenerateCall,
    logger::LogLevel,
    operation::{Operation, Session},
    platform::Platform,
    types::{ErrorRecord, GenerationResult},
    PipelineError,
};

/// Outcome of the chained image generation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainedImage {
    /// The platform has no image step or the text result had no description.
    Skipped,
    Generated(GenerationResult),
    /// The image call failed; the text result still stands.
    Failed(Box<ErrorRecord>),
}

/// A generated post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostOutcome {
    pub platform: Platform,
    /// Full text generation result.
    pub content: GenerationResult,
    /// The platform's main text field, if present.
    pub text: Option<String>,
    pub image: ChainedImage,
}

impl PostOutcome {
    /// URL of the generated image, if any.
    pub fn image_url(&self) -> Option<&str> {
        match &self.image {
            ChainedImage::Generated(result) => result.text("image_url"),
            _ => None,
        }
    }
}

/// Generates a post and its chained image for one platform.
///
/// # Example
///
/// ```ignore
/// use content_gen_pipeline::{ExecCtx, Platform, PostChain, Session};
///
/// let ctx = ExecCtx::builder("http://localhost:5000").build();
/// let session = Session::new();
/// let post = PostChain::new(Platform::Twitter)
///     .execute(&ctx, &session, "Solana outage recap")
///     .await?;
/// println!("{:?} {:?}", post.text, post.image_url());
/// ```
#[derive(Debug, Clone)]
pub struct PostChain {
    platform: Platform,
}

impl PostChain {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Start a new submission on `session` and run the chain in it.
    pub async fn execute(&self, ctx: &ExecCtx, session: &Session, input: &str) -> Result<PostOutcome> {
        let op = session.begin(ctx, self.platform.name());
        self.execute_in(ctx, &op, input).await
    }

    /// Run the chain inside an existing operation.
    pub async fn execute_in(&self, ctx: &ExecCtx, op: &Operation, input: &str) -> Result<PostOutcome> {
        let log = op.logger();
        log.add_log(
            LogLevel::Process,
            "init",
            format!("Initializing {} generation...", self.platform),
            None,
        );

        let text_call = GenerateCall::for_endpoint(self.platform.name(), self.platform.endpoint());
        let content = text_call.execute(ctx, op, input).await?;

        let text = content.text(self.platform.text_field()).map(str::to_string);
        if text.is_none() {
            log.add_log(LogLevel::Warning, "response", "No content was generated", None);
        }

        let image = match self.platform.image_trigger() {
            None => ChainedImage::Skipped,
            Some(trigger) => match content.text(trigger.field) {
                None => {
                    log.add_log(
                        LogLevel::Info,
                        "image",
                        "No image description provided, skipping image generation",
                        None,
                    );
                    ChainedImage::Skipped
                }
                Some(description) => {
                    let image_op = op.chained(format!("{}-image", self.platform));
                    let image_call = GenerateCall::for_endpoint(image_op.name(), trigger.endpoint);
                    match image_call.execute(ctx, &image_op, description).await {
                        Ok(result) => ChainedImage::Generated(result),
                        Err(PipelineError::Generation(record)) => ChainedImage::Failed(record),
                        Err(e) => return Err(e),
                    }
                }
            },
        };

        Ok(PostOutcome {
            platform: self.platform,
            content,
            text,
            image,
        })
    }
}
