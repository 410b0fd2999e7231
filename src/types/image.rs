use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of images per request.
pub const DEFAULT_IMAGE_COUNT: u32 = 1;

/// Largest number of images the endpoint accepts per request.
pub const MAX_IMAGE_COUNT: u32 = 10;

/// Image dimensions supported by the generation endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// 256x256 pixels.
    #[serde(rename = "256x256")]
    Small,

    /// 512x512 pixels.
    #[serde(rename = "512x512")]
    Medium,

    /// 1024x1024 pixels.
    #[default]
    #[serde(rename = "1024x1024")]
    Large,
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSize::Small => write!(f, "256x256"),
            ImageSize::Medium => write!(f, "512x512"),
            ImageSize::Large => write!(f, "1024x1024"),
        }
    }
}

impl FromStr for ImageSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "256x256" | "256" => Ok(ImageSize::Small),
            "512x512" | "512" => Ok(ImageSize::Medium),
            "1024x1024" | "1024" => Ok(ImageSize::Large),
            _ => Err(Error::configuration(
                format!("invalid image size {s:?}; expected 256x256, 512x512 or 1024x1024"),
                Some("size".to_string()),
            )),
        }
    }
}

/// Body of a `POST /images/generations` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Description of the image.
    pub prompt: String,

    /// Number of images to generate.
    pub n: u32,

    /// Dimensions of each image.
    pub size: ImageSize,
}

impl ImageRequest {
    /// Creates a request for one image of the default size.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            n: DEFAULT_IMAGE_COUNT,
            size: ImageSize::default(),
        }
    }

    /// Sets the number of images.
    pub fn with_count(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    /// Sets the image size.
    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Checks the request before it is sent.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::configuration(
                "an image prompt is required",
                Some("prompt".to_string()),
            ));
        }
        if !(1..=MAX_IMAGE_COUNT).contains(&self.n) {
            return Err(Error::configuration(
                format!("image count must be between 1 and {MAX_IMAGE_COUNT}"),
                Some("n".to_string()),
            ));
        }
        Ok(())
    }
}

/// Response of the image generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResponse {
    /// One entry per generated image.
    pub data: Vec<ImageData>,
}

/// A generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// Where the image can be downloaded.
    pub url: String,
}

impl ImageResponse {
    /// The download URLs, in response order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.data.iter().map(|image| image.url.as_str())
    }
}
