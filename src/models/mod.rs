// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data model shared by the session and the remote collaborators.

pub mod annotation;
pub mod list;
