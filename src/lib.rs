// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Boxwise - bounding-box annotation sessions
//!
//! The headless core of a dataset labeling workflow: load a list of
//! unlabeled images from a server, draw and label boxes on each image,
//! and validate images one by one until the list is done.

pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod remote;
pub mod replay;
pub mod session;
pub mod util;

pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use session::{AnnotationSession, Phase};
