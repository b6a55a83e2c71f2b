//! Uploaded image artifact

use crate::gateway::image_data_uri;
use crate::{Error, Result};

/// Accepted image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Parse a `Content-Type` value (parameters are ignored)
    ///
    /// # Errors
    ///
    /// Returns error for anything but JPEG or PNG
    pub fn from_mime(mime_type: &str) -> Result<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            _ => Err(Error::UnsupportedMedia(format!(
                "{mime_type} (expected image/jpeg or image/png)"
            ))),
        }
    }

    /// MIME subtype, also used as the file extension
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

/// Raw image bytes with their declared format
#[derive(Debug, Clone)]
pub struct UploadedImage {
    kind: ImageKind,
    bytes: Vec<u8>,
}

impl UploadedImage {
    /// Wrap uploaded bytes
    ///
    /// # Errors
    ///
    /// Returns error if the upload is empty
    pub fn new(kind: ImageKind, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::Precondition("uploaded image is empty".to_string()));
        }
        Ok(Self { kind, bytes })
    }

    #[must_use]
    pub const fn kind(&self) -> ImageKind {
        self.kind
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Full image re-encoded as a `data:` URI for the analysis request
    #[must_use]
    pub fn data_uri(&self) -> String {
        image_data_uri(self.kind.extension(), &self.bytes)
    }
}
