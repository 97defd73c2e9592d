use crate::model::ContentHash;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The image formats accepted as receipts.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Tiff,
}

serde_plain::derive_display_from_serialize!(ImageKind);

impl ImageKind {
    /// Determines the kind from a file name's extension, ignoring case.
    pub fn from_file_name(name: impl AsRef<Path>) -> Option<Self> {
        let ext = name.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            "bmp" => Some(ImageKind::Bmp),
            "webp" => Some(ImageKind::Webp),
            "tiff" => Some(ImageKind::Tiff),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Bmp => "image/bmp",
            ImageKind::Webp => "image/webp",
            ImageKind::Tiff => "image/tiff",
        }
    }
}

/// One input to an ingestion run: a file name and its bytes.
#[derive(Debug, Clone)]
pub struct ImageInput {
    file_name: String,
    kind: ImageKind,
    bytes: Vec<u8>,
    hash: ContentHash,
}

impl ImageInput {
    /// Returns `None` when `file_name` does not have a supported image extension.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Option<Self> {
        let file_name = file_name.into();
        let kind = ImageKind::from_file_name(&file_name)?;
        let hash = ContentHash::of(&bytes);
        Some(Self {
            file_name,
            kind,
            bytes,
            hash,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }
}
