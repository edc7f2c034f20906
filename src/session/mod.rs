// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation session state machine.
//!
//! A session works through the pending items of one unlabeled list, one
//! image at a time:
//!
//! ```text
//! Idle -> Loading -> Ready <-> Saving
//!            |         |         |
//!            v         v         v
//!          Idle    (navigate)  Completed
//! ```
//!
//! The boxes held by the session always belong to the current image; every
//! image transition clears them together with the image change.

pub mod boxes;
pub mod picker;
pub mod validation;

use crate::config::Config;
use crate::error::{SessionError, SessionResult};
use crate::models::annotation::{BoundingBox, BoxId, BoxUpdate};
use crate::models::list::{ListItem, UnlabeledList};
use crate::remote::ListStore;
use boxes::BoxSet;
use picker::PickerTicket;
use serde::Serialize;

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No list loaded.
    #[default]
    Idle,
    /// List fetch in flight.
    Loading,
    /// An image is current and can be annotated.
    Ready,
    /// Validation submission in flight.
    Saving,
    /// The list has no pending items.
    Completed,
}

/// Result of moving to another image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub item_index: usize,
    /// Unsaved boxes dropped with the previous image.
    pub discarded_boxes: usize,
}

/// Validation progress over the whole list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub pending: usize,
    pub validated: usize,
    /// Share of validated items, rounded to the nearest whole percent.
    pub percent: u8,
}

impl Progress {
    pub fn new(pending: usize, validated: usize) -> Self {
        let total = pending + validated;
        let percent = if total == 0 {
            0
        } else {
            ((validated as f64 * 100.0) / total as f64).round() as u8
        };
        Self {
            pending,
            validated,
            percent,
        }
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub list_name: Option<String>,
    pub current_item_index: usize,
    pub current_image_url: Option<String>,
    pub bounding_boxes: Vec<BoundingBox>,
    pub current_box_id: Option<BoxId>,
    pub progress: Progress,
}

/// The annotation state of one screen.
///
/// Owned by whatever drives the screen; there is no global instance.
#[derive(Debug)]
pub struct AnnotationSession {
    config: Config,
    phase: Phase,
    list: Option<UnlabeledList>,
    current_item_index: usize,
    current_image_url: Option<String>,
    boxes: BoxSet,
}

impl AnnotationSession {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            list: None,
            current_item_index: 0,
            current_image_url: None,
            boxes: BoxSet::new(config.geometry.clamp),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn is_saving(&self) -> bool {
        self.phase == Phase::Saving
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn list(&self) -> Option<&UnlabeledList> {
        self.list.as_ref()
    }

    /// Items still waiting for validation.
    pub fn pending_items(&self) -> &[ListItem] {
        self.list.as_ref().map(|l| l.items.as_slice()).unwrap_or_default()
    }

    pub fn current_item_index(&self) -> usize {
        self.current_item_index
    }

    pub fn current_image_url(&self) -> Option<&str> {
        self.current_image_url.as_deref()
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        self.boxes.boxes()
    }

    pub fn current_box_id(&self) -> Option<BoxId> {
        self.boxes.current()
    }

    pub fn progress(&self) -> Progress {
        match &self.list {
            Some(list) => Progress::new(list.items.len(), list.validated_items.len()),
            None => Progress::default(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            list_name: self.list.as_ref().map(|l| l.name.clone()),
            current_item_index: self.current_item_index,
            current_image_url: self.current_image_url.clone(),
            bounding_boxes: self.boxes.boxes().to_vec(),
            current_box_id: self.boxes.current(),
            progress: self.progress(),
        }
    }

    /// Fetch a list and show its first pending image.
    ///
    /// Any previous list is dropped first. On failure the session is left
    /// `Idle` and the error is returned for the caller to show.
    pub async fn load(&mut self, store: &dyn ListStore, list_id: &str) -> SessionResult<()> {
        if matches!(self.phase, Phase::Loading | Phase::Saving) {
            return Err(SessionError::Busy { phase: self.phase });
        }

        self.phase = Phase::Loading;
        self.list = None;
        self.current_item_index = 0;
        self.current_image_url = None;
        self.boxes.clear();
        log::info!("Loading list '{}'", list_id);

        match store.get_by_id(list_id).await {
            Ok(mut list) => {
                if list.id.is_empty() {
                    list.id = list_id.to_string();
                }
                self.install(list);
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Idle;
                log::error!("Failed to load list '{}': {}", list_id, e);
                Err(e.into())
            }
        }
    }

    fn install(&mut self, list: UnlabeledList) {
        log::info!(
            "Loaded list '{}': {} pending, {} validated",
            list.name,
            list.items.len(),
            list.validated_items.len()
        );
        match list.items.first() {
            Some(first) => {
                self.current_image_url = Some(first.image_url.clone());
                self.phase = Phase::Ready;
            }
            None => {
                self.current_image_url = None;
                self.phase = Phase::Completed;
            }
        }
        self.current_item_index = 0;
        self.list = Some(list);
    }

    /// Add a box with default geometry to the current image.
    pub fn create_box(&mut self) -> SessionResult<BoxId> {
        self.ensure_ready()?;
        Ok(self.boxes.create())
    }

    pub fn update_box(&mut self, id: BoxId, update: &BoxUpdate) -> SessionResult<()> {
        self.ensure_ready()?;
        self.boxes.update(id, update)
    }

    pub fn remove_box(&mut self, id: BoxId) -> SessionResult<BoundingBox> {
        self.ensure_ready()?;
        self.boxes.remove(id)
    }

    pub fn select_box(&mut self, id: BoxId) -> SessionResult<()> {
        self.ensure_ready()?;
        self.boxes.select(id)
    }

    /// Open the label picker for the box that is current right now.
    pub fn open_picker(&self) -> SessionResult<PickerTicket> {
        self.ensure_ready()?;
        Ok(PickerTicket {
            opened_for: self.boxes.current(),
        })
    }

    /// Apply a label chosen in the picker. Returns the box that received it.
    pub fn pick_label(&mut self, ticket: PickerTicket, label: &str) -> SessionResult<BoxId> {
        self.ensure_ready()?;
        let target = ticket
            .target(self.config.picker.binding, self.boxes.current())
            .ok_or(SessionError::NoBoxSelected)?;
        self.boxes.assign_label(target, label)?;
        Ok(target)
    }

    /// Label whichever box is current.
    pub fn label_current_box(&mut self, label: &str) -> SessionResult<BoxId> {
        self.ensure_ready()?;
        let target = self.boxes.current().ok_or(SessionError::NoBoxSelected)?;
        self.boxes.assign_label(target, label)?;
        Ok(target)
    }

    /// Jump to a pending image, dropping unsaved boxes of the current one.
    pub fn go_to_image(&mut self, index: usize) -> SessionResult<Transition> {
        self.ensure_ready()?;
        let len = self.pending_items().len();
        let image_url = self
            .pending_items()
            .get(index)
            .map(|item| item.image_url.clone())
            .ok_or(SessionError::IndexOutOfRange { index, len })?;

        let discarded_boxes = self.boxes.clear();
        self.current_item_index = index;
        self.current_image_url = Some(image_url);
        if discarded_boxes > 0 {
            log::info!("Moved to item {}, discarded {} unsaved box(es)", index, discarded_boxes);
        }
        Ok(Transition {
            item_index: index,
            discarded_boxes,
        })
    }

    /// Move to the following image; `None` on the last one.
    pub fn next_image(&mut self) -> SessionResult<Option<Transition>> {
        self.ensure_ready()?;
        let next = self.current_item_index + 1;
        if next >= self.pending_items().len() {
            return Ok(None);
        }
        self.go_to_image(next).map(Some)
    }

    /// Move to the preceding image; `None` on the first one.
    pub fn previous_image(&mut self) -> SessionResult<Option<Transition>> {
        self.ensure_ready()?;
        match self.current_item_index.checked_sub(1) {
            Some(previous) => self.go_to_image(previous).map(Some),
            None => Ok(None),
        }
    }

    fn ensure_ready(&self) -> SessionResult<()> {
        if self.phase == Phase::Ready {
            Ok(())
        } else {
            Err(SessionError::NotReady { phase: self.phase })
        }
    }

    /// The list id and the item the session is showing.
    fn current_item(&self) -> SessionResult<(&str, &ListItem)> {
        self.list
            .as_ref()
            .and_then(|list| {
                list.items
                    .get(self.current_item_index)
                    .map(|item| (list.id.as_str(), item))
            })
            .ok_or(SessionError::NotReady { phase: self.phase })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PickerBinding;
    use crate::remote::{MemoryStore, RemoteError};

    fn store_with(n: usize) -> MemoryStore {
        let mut list = UnlabeledList::new("l1", "fixture");
        for i in 0..n {
            list = list.with_item(ListItem::new(i.to_string(), format!("https://x/{}.jpg", i)));
        }
        MemoryStore::with_list(list)
    }

    #[tokio::test]
    async fn test_load_shows_first_image() {
        let store = store_with(3);
        let mut session = AnnotationSession::new(Config::default());
        assert_eq!(session.phase(), Phase::Idle);
        session.load(&store, "l1").await.unwrap();
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.current_item_index(), 0);
        assert_eq!(session.current_image_url(), Some("https://x/0.jpg"));
        assert!(session.boxes().is_empty());
    }

    #[tokio::test]
    async fn test_empty_list_is_completed() {
        let store = store_with(0);
        let mut session = AnnotationSession::new(Config::default());
        session.load(&store, "l1").await.unwrap();
        assert!(session.is_completed());
        assert_eq!(session.current_image_url(), None);
        assert!(matches!(session.create_box(), Err(SessionError::NotReady { .. })));
    }

    #[tokio::test]
    async fn test_load_failure_returns_to_idle() {
        let store = store_with(2);
        store.fail_next_fetch(RemoteError::Transport("offline".into()));
        let mut session = AnnotationSession::new(Config::default());
        let err = session.load(&store, "l1").await.unwrap_err();
        assert!(matches!(err, SessionError::Remote(RemoteError::Transport(_))));
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.list().is_none());

        // User-initiated retry.
        session.load(&store, "l1").await.unwrap();
        assert_eq!(session.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_load_rejected_while_saving() {
        let store = store_with(2);
        let mut session = AnnotationSession::new(Config::default());
        session.load(&store, "l1").await.unwrap();
        let a = session.create_box().unwrap();
        session.label_current_box("cat").unwrap();
        let _pending = session.begin_validation().unwrap();

        let err = session.load(&store, "l1").await.unwrap_err();
        assert!(matches!(err, SessionError::Busy { phase: Phase::Saving }));
        assert_eq!(session.phase(), Phase::Saving);
        assert_eq!(session.pending_items().len(), 2);
        assert_eq!(session.current_image_url(), Some("https://x/0.jpg"));
        assert_eq!(session.boxes().len(), 1);
        assert_eq!(session.boxes()[0].id, a);
        assert_eq!(session.boxes()[0].label(), Some("cat"));
    }

    #[test]
    fn test_actions_need_ready() {
        let session = AnnotationSession::new(Config::default());
        assert!(matches!(session.open_picker(), Err(SessionError::NotReady { phase: Phase::Idle })));
    }

    #[tokio::test]
    async fn test_picker_open_time_binding() {
        let store = store_with(1);
        let mut session = AnnotationSession::new(Config::default());
        session.load(&store, "l1").await.unwrap();
        let a = session.create_box().unwrap();
        let ticket = session.open_picker().unwrap();
        let b = session.create_box().unwrap();

        assert_eq!(session.pick_label(ticket, "cat").unwrap(), a);
        assert_eq!(session.boxes()[0].label(), Some("cat"));
        assert!(!session.boxes()[1].is_complete());
        assert_eq!(session.current_box_id(), Some(b));
    }

    #[tokio::test]
    async fn test_picker_selection_time_binding() {
        let store = store_with(1);
        let mut config = Config::default();
        config.picker.binding = PickerBinding::SelectionTime;
        let mut session = AnnotationSession::new(config);
        session.load(&store, "l1").await.unwrap();
        session.create_box().unwrap();
        let ticket = session.open_picker().unwrap();
        let b = session.create_box().unwrap();

        assert_eq!(session.pick_label(ticket, "cat").unwrap(), b);
        assert!(!session.boxes()[0].is_complete());
    }

    #[tokio::test]
    async fn test_picker_target_removed_or_missing() {
        let store = store_with(1);
        let mut session = AnnotationSession::new(Config::default());
        session.load(&store, "l1").await.unwrap();

        let empty = session.open_picker().unwrap();
        assert!(matches!(session.pick_label(empty, "cat"), Err(SessionError::NoBoxSelected)));

        let a = session.create_box().unwrap();
        let ticket = session.open_picker().unwrap();
        session.remove_box(a).unwrap();
        assert!(matches!(session.pick_label(ticket, "cat"), Err(SessionError::BoxNotFound(id)) if id == a));
    }

    #[tokio::test]
    async fn test_navigation_clears_boxes() {
        let store = store_with(3);
        let mut session = AnnotationSession::new(Config::default());
        session.load(&store, "l1").await.unwrap();
        session.create_box().unwrap();
        session.create_box().unwrap();

        assert_eq!(session.previous_image().unwrap(), None);
        let t = session.next_image().unwrap().unwrap();
        assert_eq!(t, Transition { item_index: 1, discarded_boxes: 2 });
        assert!(session.boxes().is_empty());
        assert_eq!(session.current_box_id(), None);
        assert_eq!(session.current_image_url(), Some("https://x/1.jpg"));

        session.go_to_image(2).unwrap();
        assert_eq!(session.next_image().unwrap(), None);
        assert!(matches!(
            session.go_to_image(3),
            Err(SessionError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert_eq!(session.previous_image().unwrap().unwrap().item_index, 1);
    }

    #[tokio::test]
    async fn test_progress_and_snapshot() {
        let store = store_with(3);
        let mut session = AnnotationSession::new(Config::default());
        assert_eq!(session.progress(), Progress::default());
        session.load(&store, "l1").await.unwrap();
        session.create_box().unwrap();
        session.label_current_box("cat").unwrap();
        session.validate(&store, None).await.unwrap();

        assert_eq!(session.progress(), Progress { pending: 2, validated: 1, percent: 33 });

        let snapshot = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(snapshot["phase"], "ready");
        assert_eq!(snapshot["listName"], "fixture");
        assert_eq!(snapshot["progress"]["percent"], 33);
        assert_eq!(snapshot["boundingBoxes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_progress_rounding() {
        assert_eq!(Progress::new(0, 0).percent, 0);
        assert_eq!(Progress::new(1, 2).percent, 67);
        assert_eq!(Progress::new(0, 4).percent, 100);
    }
}
