// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module converts normalized box geometry into the pixel-space
//! corner encoding expected by the training service.

use crate::models::annotation::Geometry;
use serde::{Deserialize, Serialize};

/// A point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Convert normalized coordinates to pixel coordinates.
pub fn denormalize_coordinates(x: f64, y: f64, width: u32, height: u32) -> PixelPoint {
    PixelPoint {
        x: x * width as f64,
        y: y * height as f64,
    }
}

/// Corners of a (possibly rotated) box in pixel space.
///
/// Corners are ordered clockwise starting from the top-left corner of the
/// unrotated box. Positive rotation turns the box clockwise on screen
/// (y grows downwards).
pub fn rotated_corners(geometry: &Geometry, width: u32, height: u32) -> [PixelPoint; 4] {
    let center = denormalize_coordinates(geometry.center_x, geometry.center_y, width, height);
    let half_w = geometry.width * width as f64 / 2.0;
    let half_h = geometry.height * height as f64 / 2.0;
    let (sin, cos) = geometry.rotation.to_radians().sin_cos();

    let offsets = [
        (-half_w, -half_h),
        (half_w, -half_h),
        (half_w, half_h),
        (-half_w, half_h),
    ];
    offsets.map(|(dx, dy)| PixelPoint {
        x: center.x + dx * cos - dy * sin,
        y: center.y + dx * sin + dy * cos,
    })
}
