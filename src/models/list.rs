// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Unlabeled list resources.
//!
//! A list is held by the server; the session works on a local copy of it
//! made at load time.

use serde::{Deserialize, Serialize};

use crate::session::validation::LabelRecord;

/// A server-held collection of images awaiting annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlabeledList {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<ListItem>,
    #[serde(default)]
    pub validated_items: Vec<ListItem>,
}

impl UnlabeledList {
    /// Create an empty list with the given id and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            items: Vec::new(),
            validated_items: Vec::new(),
        }
    }

    /// Builder-style helper for appending a pending item.
    pub fn with_item(mut self, item: ListItem) -> Self {
        self.items.push(item);
        self
    }

    /// Find a pending item by its external identifier.
    pub fn position_of(&self, item_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.external_id() == Some(item_id))
    }
}

/// One image in a list.
///
/// Servers are inconsistent about naming the identifier field, so both
/// `id` and `_id` are accepted; use [`ListItem::external_id`] to read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelRecord>,
}

impl ListItem {
    pub fn new(id: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            legacy_id: None,
            image_url: image_url.into(),
            labels: Vec::new(),
        }
    }

    /// The identifier to use when talking to the server: `id` first, then
    /// `_id`. Empty strings count as absent.
    pub fn external_id(&self) -> Option<&str> {
        [self.id.as_deref(), self.legacy_id.as_deref()]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty())
    }

    /// True when the image is not served over http(s), i.e. it was captured
    /// or imported on this device.
    pub fn is_local_image(&self) -> bool {
        let lower = self.image_url.trim_start().to_ascii_lowercase();
        !(lower.starts_with("http://") || lower.starts_with("https://"))
    }
}
