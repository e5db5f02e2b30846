//! Generation endpoints and the platforms built on them.

use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An endpoint of the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Instagram,
    Twitter,
    TwitterThread,
    LinkedIn,
    YouTube,
    GenerateImage,
    /// Thumbnail-sized image generation for YouTube.
    GenerateImageYt,
}

impl Endpoint {
    pub const ALL: [Endpoint; 7] = [
        Endpoint::Instagram,
        Endpoint::Twitter,
        Endpoint::TwitterThread,
        Endpoint::LinkedIn,
        Endpoint::YouTube,
        Endpoint::GenerateImage,
        Endpoint::GenerateImageYt,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Instagram => "/instagram",
            Endpoint::Twitter => "/twitter",
            Endpoint::TwitterThread => "/twitter-thread",
            Endpoint::LinkedIn => "/linkedin",
            Endpoint::YouTube => "/youtube",
            Endpoint::GenerateImage => "/generate_image",
            Endpoint::GenerateImageYt => "/generate_image_yt",
        }
    }

    /// Name of the request body field carrying the user text.
    pub fn input_field(&self) -> &'static str {
        match self {
            Endpoint::GenerateImage | Endpoint::GenerateImageYt => "prompt",
            _ => "input_text",
        }
    }
}

/// Social platform a post is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    #[serde(rename = "twitter-thread")]
    TwitterThread,
    LinkedIn,
    YouTube,
}

/// Field in a text result that triggers a chained image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTrigger {
    /// Result field holding the image description.
    pub field: &'static str,
    /// Endpoint the description is sent to.
    pub endpoint: Endpoint,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Instagram,
        Platform::Twitter,
        Platform::TwitterThread,
        Platform::LinkedIn,
        Platform::YouTube,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::TwitterThread => "twitter-thread",
            Platform::LinkedIn => "linkedin",
            Platform::YouTube => "youtube",
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Platform::Instagram => Endpoint::Instagram,
            Platform::Twitter => Endpoint::Twitter,
            Platform::TwitterThread => Endpoint::TwitterThread,
            Platform::LinkedIn => Endpoint::LinkedIn,
            Platform::YouTube => Endpoint::YouTube,
        }
    }

    /// Result field holding the main post text.
    pub fn text_field(&self) -> &'static str {
        match self {
            Platform::Instagram => "post_caption",
            Platform::Twitter => "tweet_text",
            Platform::TwitterThread => "tweet_text_1",
            Platform::LinkedIn => "linkedin_text",
            Platform::YouTube => "title",
        }
    }

    /// Chained image generation, if the platform has one.
    ///
    /// Threads carry one description per tweet and are not chained.
    pub fn image_trigger(&self) -> Option<ImageTrigger> {
        match self {
            Platform::Instagram | Platform::Twitter | Platform::LinkedIn => Some(ImageTrigger {
                field: "image_description",
                endpoint: Endpoint::GenerateImage,
            }),
            Platform::YouTube => Some(ImageTrigger {
                field: "thumbnail",
                endpoint: Endpoint::GenerateImageYt,
            }),
            Platform::TwitterThread => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "x" => return Ok(Platform::Twitter),
            "thread" => return Ok(Platform::TwitterThread),
            _ => {}
        }
        Platform::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| PipelineError::InvalidConfig(format!("unknown platform '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_str() {
        assert_eq!("LinkedIn".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!(
            "twitter-thread".parse::<Platform>().unwrap(),
            Platform::TwitterThread
        );
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_input_fields() {
        assert_eq!(Endpoint::Twitter.input_field(), "input_text");
        assert_eq!(Endpoint::GenerateImage.input_field(), "prompt");
        assert_eq!(Endpoint::GenerateImageYt.input_field(), "prompt");
    }

    #[test]
    fn test_image_triggers() {
        let yt = Platform::YouTube.image_trigger().unwrap();
        assert_eq!(yt.field, "thumbnail");
        assert_eq!(yt.endpoint, Endpoint::GenerateImageYt);
        assert_eq!(
            Platform::LinkedIn.image_trigger().unwrap().field,
            "image_description"
        );
        assert!(Platform::TwitterThread.image_trigger().is_none());
    }

    #[test]
    fn test_platform_serde_names() {
        assert_eq!(
            serde_json::to_value(Platform::TwitterThread).unwrap(),
            serde_json::json!("twitter-thread")
        );
        assert_eq!(
            serde_json::to_value(Platform::YouTube).unwrap(),
            serde_json::json!("youtube")
        );
    }
}
