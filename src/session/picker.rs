// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Label picker protocol.
//!
//! The picker is a modal list of label names that knows nothing about
//! boxes. Opening it yields a [`PickerTicket`]; the chosen name comes back
//! with that ticket and the session decides which box receives it.

use crate::config::PickerBinding;
use crate::models::annotation::BoxId;
use serde::{Deserialize, Serialize};

/// Handed out when the picker opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerTicket {
    pub(crate) opened_for: Option<BoxId>,
}

impl PickerTicket {
    /// The box that was current when the picker opened.
    pub fn opened_for(&self) -> Option<BoxId> {
        self.opened_for
    }

    /// Resolve the box that should receive the label.
    pub(crate) fn target(&self, binding: PickerBinding, current: Option<BoxId>) -> Option<BoxId> {
        match binding {
            PickerBinding::OpenTime => self.opened_for,
            PickerBinding::SelectionTime => current,
        }
    }
}

/// Label names offered by the picker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelCatalog {
    labels: Vec<String>,
}

impl LabelCatalog {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Labels whose name contains `query`, ignoring case and surrounding
    /// whitespace. Catalog order is preserved; an empty query matches all.
    pub fn filter(&self, query: &str) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        self.labels
            .iter()
            .filter(|label| needle.is_empty() || label.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }
}
