// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Local media access.
//!
//! Locally captured images are referenced by plain paths or `file://` URLs.
//! Only their pixel dimensions are needed here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("failed to read image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Turn a local image reference into a filesystem path.
pub fn local_path(image_ref: &str) -> PathBuf {
    let trimmed = image_ref.trim();
    PathBuf::from(trimmed.strip_prefix("file://").unwrap_or(trimmed))
}

/// Read the pixel dimensions of a local image without decoding it fully.
pub fn image_dimensions(image_ref: &str) -> Result<(u32, u32), MediaError> {
    let path = local_path(image_ref);
    image::image_dimensions(&path).map_err(|source| MediaError::Image { path, source })
}
