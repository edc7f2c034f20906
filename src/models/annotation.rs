// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Bounding box data structures.
//!
//! This module defines the geometry and labeling state of a single
//! annotation target on the current image.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque box identifier, unique for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxId(pub u64);

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "box-{}", self.0)
    }
}

/// Normalized box geometry: center and extent relative to the image,
/// rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

impl Default for Geometry {
    /// A box centered on the image covering 30% of each dimension.
    fn default() -> Self {
        Self {
            center_x: 0.5,
            center_y: 0.5,
            width: 0.3,
            height: 0.3,
            rotation: 0.0,
        }
    }
}

impl Geometry {
    /// Clamp center and extent to [0, 1]. Rotation is left as is.
    pub fn clamped(self) -> Self {
        Self {
            center_x: self.center_x.clamp(0.0, 1.0),
            center_y: self.center_y.clamp(0.0, 1.0),
            width: self.width.clamp(0.0, 1.0),
            height: self.height.clamp(0.0, 1.0),
            rotation: self.rotation,
        }
    }

    /// Values in submission order: center x, center y, width, height, rotation.
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.center_x,
            self.center_y,
            self.width,
            self.height,
            self.rotation,
        ]
    }
}

/// Partial geometry edit. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxUpdate {
    #[serde(default)]
    pub center_x: Option<f64>,
    #[serde(default)]
    pub center_y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub rotation: Option<f64>,
}

impl BoxUpdate {
    /// Merge this edit into `geometry`.
    pub fn apply_to(&self, geometry: &mut Geometry) {
        if let Some(v) = self.center_x {
            geometry.center_x = v;
        }
        if let Some(v) = self.center_y {
            geometry.center_y = v;
        }
        if let Some(v) = self.width {
            geometry.width = v;
        }
        if let Some(v) = self.height {
            geometry.height = v;
        }
        if let Some(v) = self.rotation {
            geometry.rotation = v;
        }
    }
}

/// Labeling state of a box. A box is complete exactly when it carries a label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoxStatus {
    #[default]
    Pending,
    Labeled(String),
}

/// A bounding box on the current image.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub id: BoxId,
    pub geometry: Geometry,
    pub status: BoxStatus,
}

impl BoundingBox {
    /// Create a pending box with the default centered geometry.
    pub fn new(id: BoxId) -> Self {
        Self {
            id,
            geometry: Geometry::default(),
            status: BoxStatus::Pending,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, BoxStatus::Labeled(_))
    }

    pub fn label(&self) -> Option<&str> {
        match &self.status {
            BoxStatus::Labeled(label) => Some(label),
            BoxStatus::Pending => None,
        }
    }
}

/// Flat wire shape of a box, as shown to observers and written to snapshots.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoxRecord {
    id: BoxId,
    #[serde(flatten)]
    geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    is_complete: bool,
}

impl Serialize for BoundingBox {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BoxRecord {
            id: self.id,
            geometry: self.geometry,
            label: self.label().map(str::to_owned),
            is_complete: self.is_complete(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BoundingBox {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = BoxRecord::deserialize(deserializer)?;
        let status = match (record.is_complete, record.label) {
            (true, Some(label)) => BoxStatus::Labeled(label),
            (false, None) => BoxStatus::Pending,
            (complete, label) => {
                return Err(serde::de::Error::custom(format!(
                    "inconsistent box state: isComplete={} label={:?}",
                    complete, label
                )))
            }
        };
        Ok(Self {
            id: record.id,
            geometry: record.geometry,
            status,
        })
    }
}
