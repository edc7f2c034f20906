// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Bounding boxes of the current image.
//!
//! The set keeps creation order, hands out ids that are never reused, and
//! tracks which box is waiting for a label.

use crate::error::{SessionError, SessionResult};
use crate::models::annotation::{BoundingBox, BoxId, BoxStatus, BoxUpdate};

#[derive(Debug, Clone, Default)]
pub struct BoxSet {
    boxes: Vec<BoundingBox>,
    current: Option<BoxId>,
    next_id: u64,
    clamp: bool,
}

impl BoxSet {
    pub fn new(clamp: bool) -> Self {
        Self {
            clamp,
            ..Default::default()
        }
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn current(&self) -> Option<BoxId> {
        self.current
    }

    pub fn get(&self, id: BoxId) -> Option<&BoundingBox> {
        self.boxes.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Labeled boxes in collection order.
    pub fn completed(&self) -> impl Iterator<Item = &BoundingBox> {
        self.boxes.iter().filter(|b| b.is_complete())
    }

    /// Add a pending box with default geometry and make it current.
    pub fn create(&mut self) -> BoxId {
        let id = BoxId(self.next_id);
        self.next_id += 1;
        self.boxes.push(BoundingBox::new(id));
        self.current = Some(id);
        log::debug!("Created {}, total: {}", id, self.boxes.len());
        id
    }

    /// Merge a geometry edit into one box.
    pub fn update(&mut self, id: BoxId, update: &BoxUpdate) -> SessionResult<()> {
        let clamp = self.clamp;
        let bbox = self.get_mut(id)?;
        update.apply_to(&mut bbox.geometry);
        if clamp {
            bbox.geometry = bbox.geometry.clamped();
        }
        Ok(())
    }

    /// Remove a box. If it was current, the first remaining box (if any)
    /// becomes current.
    pub fn remove(&mut self, id: BoxId) -> SessionResult<BoundingBox> {
        let index = self.index_of(id)?;
        let removed = self.boxes.remove(index);
        if self.current == Some(id) {
            self.current = self.boxes.first().map(|b| b.id);
        }
        log::debug!("Removed {}, total: {}", id, self.boxes.len());
        Ok(removed)
    }

    /// Make an existing box current.
    pub fn select(&mut self, id: BoxId) -> SessionResult<()> {
        self.index_of(id)?;
        self.current = Some(id);
        Ok(())
    }

    /// Label a box and point `current` at the next pending box.
    ///
    /// The search starts after the labeled box and wraps around, so the
    /// user moves forward through the boxes they drew.
    pub fn assign_label(&mut self, id: BoxId, label: &str) -> SessionResult<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(SessionError::EmptyLabel);
        }
        let index = self.index_of(id)?;
        self.boxes[index].status = BoxStatus::Labeled(label.to_string());

        let len = self.boxes.len();
        self.current = (1..len)
            .map(|offset| &self.boxes[(index + offset) % len])
            .find(|b| !b.is_complete())
            .map(|b| b.id);
        log::debug!("Labeled {} as '{}', next: {:?}", id, label, self.current);
        Ok(())
    }

    /// Drop every box. Ids keep counting up.
    pub fn clear(&mut self) -> usize {
        let dropped = self.boxes.len();
        self.boxes.clear();
        self.current = None;
        dropped
    }

    fn index_of(&self, id: BoxId) -> SessionResult<usize> {
        self.boxes
            .iter()
            .position(|b| b.id == id)
            .ok_or(SessionError::BoxNotFound(id))
    }

    fn get_mut(&mut self, id: BoxId) -> SessionResult<&mut BoundingBox> {
        self.boxes
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(SessionError::BoxNotFound(id))
    }
}
