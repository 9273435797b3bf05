//! Rendition descriptions shared by config, the queue payload and the renderer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RenderError;
use crate::proto;

/// Encoded output format of a rendition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn default_extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => ".jpg",
            OutputFormat::Png => ".png",
            OutputFormat::Webp => ".webp",
            OutputFormat::Avif => ".avif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(RenderError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One derived size to produce for every imported image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenditionSpec {
    pub long_edge: u32,
    pub quality: u8,
    pub suffix: String,
    pub format: OutputFormat,
    /// Defaults to the format's usual extension when omitted
    #[serde(default)]
    pub extension: Option<String>,
    /// Defaults to the format's MIME type when omitted
    #[serde(default)]
    pub content_type: Option<String>,
}

impl RenditionSpec {
    pub fn new(long_edge: u32, quality: u8, suffix: &str, format: OutputFormat) -> Self {
        Self {
            long_edge,
            quality,
            suffix: suffix.to_string(),
            format,
            extension: None,
            content_type: None,
        }
    }

    pub fn extension(&self) -> &str {
        self.extension
            .as_deref()
            .unwrap_or_else(|| self.format.default_extension())
    }

    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or_else(|| self.format.content_type())
    }

    /// Object name of this rendition for an image, e.g. `{image_id}_thumb.webp`
    pub fn filename(&self, image_id: &str) -> String {
        format!("{}{}{}", image_id, self.suffix, self.extension())
    }
}

/// The five WebP sizes every import produces unless configured otherwise
pub fn default_renditions() -> Vec<RenditionSpec> {
    vec![
        RenditionSpec::new(200, 80, "_thumb", OutputFormat::Webp),
        RenditionSpec::new(600, 80, "_small", OutputFormat::Webp),
        RenditionSpec::new(1080, 80, "_medium", OutputFormat::Webp),
        RenditionSpec::new(1920, 65, "_large", OutputFormat::Webp),
        RenditionSpec::new(2560, 50, "_xlarge", OutputFormat::Webp),
    ]
}

impl From<&RenditionSpec> for proto::RenditionSpec {
    fn from(spec: &RenditionSpec) -> Self {
        proto::RenditionSpec {
            long_edge: spec.long_edge,
            quality: spec.quality as u32,
            suffix: spec.suffix.clone(),
            format: spec.format.as_str().to_string(),
            extension: spec.extension().to_string(),
            content_type: spec.content_type().to_string(),
        }
    }
}

impl TryFrom<&proto::RenditionSpec> for RenditionSpec {
    type Error = RenderError;

    fn try_from(spec: &proto::RenditionSpec) -> Result<Self, Self::Error> {
        let quality = u8::try_from(spec.quality)
            .ok()
            .filter(|q| *q <= 100)
            .ok_or(RenderError::InvalidQuality(spec.quality))?;
        if spec.long_edge == 0 {
            return Err(RenderError::InvalidLongEdge);
        }

        Ok(RenditionSpec {
            long_edge: spec.long_edge,
            quality,
            suffix: spec.suffix.clone(),
            format: spec.format.parse()?,
            extension: Some(spec.extension.clone()).filter(|e| !e.is_empty()),
            content_type: Some(spec.content_type.clone()).filter(|c| !c.is_empty()),
        })
    }
}
