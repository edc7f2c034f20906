// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for annotation sessions.

use crate::models::annotation::BoxId;
use crate::remote::RemoteError;
use crate::session::Phase;
use thiserror::Error;

/// Errors surfaced by [`AnnotationSession`](crate::session::AnnotationSession)
/// operations. All of them leave the session usable.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Another load or save is still in flight
    #[error("session is busy ({phase:?})")]
    Busy {
        /// Phase that blocked the action
        phase: Phase,
    },

    /// The action needs a loaded list with an active image
    #[error("no active image (session is {phase:?})")]
    NotReady {
        /// Phase the session was in
        phase: Phase,
    },

    /// No box with this id exists on the current image
    #[error("bounding box not found: {0}")]
    BoxNotFound(BoxId),

    /// A label arrived but there was no box to apply it to
    #[error("no bounding box selected")]
    NoBoxSelected,

    /// Labels must contain visible characters
    #[error("label must not be empty")]
    EmptyLabel,

    /// Validation was requested without any labeled box
    #[error("add at least one labeled object before validating")]
    NothingToValidate,

    /// The current item carries neither `id` nor `_id`
    #[error("item at index {index} has no identifier")]
    MissingItemId {
        /// Position of the item in the pending list
        index: usize,
    },

    /// Navigation target outside the pending items
    #[error("image index {index} out of range (list has {len} pending items)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of pending items
        len: usize,
    },

    /// A finish call did not match the validation that was started
    #[error("validation ticket for item '{item_id}' does not match the current item")]
    StaleValidation {
        /// Item the ticket was issued for
        item_id: String,
    },

    /// The remote list store failed
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
