use crate::model::{ImageInput, ImageKind};
use crate::{utils, Result};
use anyhow::{ensure, Context};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, trace, warn};

/// An image file that was found but could not be read.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Unreadable {
    file: String,
    error: String,
}

impl Unreadable {
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn error(&self) -> &str {
        &self.error
    }
}

/// The images of a directory.
#[derive(Debug, Default)]
pub struct Discovered {
    images: Vec<ImageInput>,
    unreadable: Vec<Unreadable>,
}

impl Discovered {
    pub fn images(&self) -> &[ImageInput] {
        &self.images
    }

    pub fn unreadable(&self) -> &[Unreadable] {
        &self.unreadable
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.unreadable.is_empty()
    }
}

/// Reads every supported image in `dir` (not recursively), ordered by file name. Symlinks are
/// followed and other files are ignored. An image that can not be read is listed in
/// `unreadable` and the rest are still read.
pub async fn discover(dir: &Path) -> Result<Discovered> {
    ensure!(
        dir.is_dir(),
        "The receipts directory '{}' does not exist",
        dir.display()
    );
    let mut entries = utils::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Unable to list {}", dir.display()))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if ImageKind::from_file_name(&name).is_none() {
            trace!("Ignoring {name}");
            continue;
        }
        files.push((name, entry.path()));
    }
    files.sort();

    let mut found = Discovered::default();
    for (name, path) in files {
        let bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => {
                trace!("Ignoring {name}, not a regular file");
                continue;
            }
            Ok(_) => utils::read_bytes(&path).await,
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read file at {}", path.display()))),
        };
        match bytes {
            Ok(bytes) => {
                if let Some(input) = ImageInput::new(name, bytes) {
                    found.images.push(input);
                }
            }
            Err(e) => {
                warn!("Unable to read {name}: {e:#}");
                found.unreadable.push(Unreadable {
                    file: name,
                    error: format!("{e:#}"),
                });
            }
        }
    }
    debug!(
        "Found {} image(s) in {}, {} unreadable",
        found.images.len(),
        dir.display(),
        found.unreadable.len()
    );
    Ok(found)
}
