// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Remote collaborators of an annotation session.
//!
//! The list store and the training service live on the other side of a
//! network boundary. The session only sees these traits; transports are
//! plugged in by the embedding application.

pub mod memory;

use crate::models::list::UnlabeledList;
use crate::session::validation::{ItemValidation, TrainingAnnotation};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;

/// Errors reported by remote collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The request never got a response
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with an error
    #[error("rejected by server ({status}): {message}")]
    Rejected {
        /// HTTP-like status code
        status: u16,
        /// Server supplied reason
        message: String,
    },
}

impl RemoteError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// Server-held unlabeled lists.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Fetch a list with its pending and validated items.
    async fn get_by_id(&self, list_id: &str) -> Result<UnlabeledList, RemoteError>;

    /// Mark one item of a list as validated with the given labels.
    ///
    /// Implementations should treat a repeated submission for an already
    /// validated item as success.
    async fn validate_item(&self, list_id: &str, validation: &ItemValidation) -> Result<(), RemoteError>;
}

/// Service collecting annotations of locally captured images for training.
#[async_trait]
pub trait AnnotationTrainer: Send + Sync {
    /// Submit the annotations of one image. `width` and `height` are the
    /// image's pixel dimensions.
    async fn send_annotations(
        &self,
        image_ref: &str,
        width: u32,
        height: u32,
        annotations: &[TrainingAnnotation],
    ) -> Result<(), RemoteError>;
}
