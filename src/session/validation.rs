// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Validation pipeline.
//!
//! Turns the labeled boxes of the current image into a submission, sends
//! it, and moves the session to the next pending image. Validation is split
//! into [`begin_validation`](AnnotationSession::begin_validation) and
//! [`finish_validation`](AnnotationSession::finish_validation) so that the
//! `Saving` phase guards against a second submission while one is in
//! flight; [`validate`](AnnotationSession::validate) drives both around the
//! network calls.

use super::{AnnotationSession, Phase};
use crate::error::{SessionError, SessionResult};
use crate::io::media;
use crate::models::annotation::{BoundingBox, Geometry};
use crate::remote::{AnnotationTrainer, ListStore, RemoteError};
use crate::util::geometry::{rotated_corners, PixelPoint};
use serde::{Deserialize, Serialize};

/// One labeled object in a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub name: String,
    /// `[centerX, centerY, width, height, rotation]`, rendered as strings.
    pub position: [String; 5],
}

impl LabelRecord {
    /// Record for a labeled box, `None` for a pending one.
    pub fn from_box(bbox: &BoundingBox) -> Option<Self> {
        let name = bbox.label()?;
        Some(Self {
            name: name.to_string(),
            position: bbox.geometry.to_array().map(|v| v.to_string()),
        })
    }
}

/// Payload marking one item as validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemValidation {
    pub item_id: String,
    pub labels: Vec<LabelRecord>,
}

/// A labeled box in the training service's pixel-corner encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingAnnotation {
    pub label: String,
    pub corners: [PixelPoint; 4],
}

impl TrainingAnnotation {
    pub fn new(label: &str, geometry: &Geometry, width: u32, height: u32) -> Self {
        Self {
            label: label.to_string(),
            corners: rotated_corners(geometry, width, height),
        }
    }
}

/// A validation that has been started and awaits its server response.
#[derive(Debug, Clone)]
pub struct PendingValidation {
    pub list_id: String,
    pub item_index: usize,
    pub image_url: String,
    /// The image was captured on this device rather than served remotely.
    pub local_image: bool,
    pub validation: ItemValidation,
    completed: Vec<(String, Geometry)>,
}

impl PendingValidation {
    /// Training payload for an image of the given pixel size.
    pub fn training_annotations(&self, width: u32, height: u32) -> Vec<TrainingAnnotation> {
        self.completed
            .iter()
            .map(|(label, geometry)| TrainingAnnotation::new(label, geometry, width, height))
            .collect()
    }
}

/// Where a successful validation left the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Another pending image is now current.
    Advanced {
        item_index: usize,
        image_url: String,
        labels_submitted: usize,
    },
    /// The list has no pending items left.
    ListCompleted {
        list_name: String,
        labels_submitted: usize,
    },
}

impl AnnotationSession {
    /// Check preconditions, build the submission and enter `Saving`.
    ///
    /// Fails without touching the session when nothing is labeled or a
    /// validation is already in flight.
    pub fn begin_validation(&mut self) -> SessionResult<PendingValidation> {
        match self.phase {
            Phase::Ready => {}
            Phase::Saving | Phase::Loading => return Err(SessionError::Busy { phase: self.phase }),
            phase => return Err(SessionError::NotReady { phase }),
        }

        let labels: Vec<LabelRecord> = self.boxes.completed().filter_map(LabelRecord::from_box).collect();
        if labels.is_empty() {
            return Err(SessionError::NothingToValidate);
        }

        let (list_id, item) = self.current_item()?;
        let item_id = item
            .external_id()
            .ok_or(SessionError::MissingItemId {
                index: self.current_item_index,
            })?
            .to_string();
        let pending = PendingValidation {
            list_id: list_id.to_string(),
            item_index: self.current_item_index,
            image_url: item.image_url.clone(),
            local_image: item.is_local_image(),
            validation: ItemValidation { item_id, labels },
            completed: self
                .boxes
                .completed()
                .filter_map(|b| b.label().map(|label| (label.to_string(), b.geometry)))
                .collect(),
        };

        self.phase = Phase::Saving;
        log::info!(
            "Validating item '{}' with {} label(s), dropping {} unlabeled",
            pending.validation.item_id,
            pending.validation.labels.len(),
            self.boxes.len() - pending.validation.labels.len()
        );
        Ok(pending)
    }

    /// Apply the server's answer to a started validation.
    ///
    /// On failure the list and boxes are kept so the user can retry. On
    /// success the item leaves the pending list and the next image, if any,
    /// becomes current with no boxes.
    pub fn finish_validation(
        &mut self,
        pending: PendingValidation,
        result: Result<(), RemoteError>,
    ) -> SessionResult<ValidationOutcome> {
        if !self.is_in_flight(&pending) {
            return Err(SessionError::StaleValidation {
                item_id: pending.validation.item_id,
            });
        }

        if let Err(error) = result {
            self.phase = Phase::Ready;
            log::error!("Validation of '{}' failed: {}", pending.validation.item_id, error);
            return Err(error.into());
        }

        let labels_submitted = pending.validation.labels.len();
        let Some(list) = self.list.as_mut() else {
            return Err(SessionError::NotReady { phase: self.phase });
        };
        let mut item = list.items.remove(pending.item_index);
        item.labels = pending.validation.labels;
        list.validated_items.push(item);
        self.boxes.clear();

        if list.items.is_empty() {
            let list_name = list.name.clone();
            self.current_item_index = 0;
            self.current_image_url = None;
            self.phase = Phase::Completed;
            log::info!("List '{}' completed", list_name);
            return Ok(ValidationOutcome::ListCompleted {
                list_name,
                labels_submitted,
            });
        }

        let item_index = pending.item_index.min(list.items.len() - 1);
        let image_url = list.items[item_index].image_url.clone();
        self.current_item_index = item_index;
        self.current_image_url = Some(image_url.clone());
        self.phase = Phase::Ready;
        log::info!("Advanced to item {} ({} pending)", item_index, list.items.len());
        Ok(ValidationOutcome::Advanced {
            item_index,
            image_url,
            labels_submitted,
        })
    }

    /// Give up on a started validation without an answer from the server.
    ///
    /// The session goes back to `Ready` with its boxes intact. Tickets that
    /// no longer match the in-flight validation are ignored.
    pub fn abort_validation(&mut self, pending: &PendingValidation) {
        if self.is_in_flight(pending) {
            log::warn!("Validation of '{}' abandoned", pending.validation.item_id);
            self.phase = Phase::Ready;
        }
    }

    fn is_in_flight(&self, pending: &PendingValidation) -> bool {
        self.phase == Phase::Saving
            && self.list.as_ref().is_some_and(|list| {
                list.items
                    .get(pending.item_index)
                    .and_then(|item| item.external_id())
                    == Some(pending.validation.item_id.as_str())
            })
    }

    /// Validate the current image: submit it, send training annotations for
    /// local images (best effort), then advance.
    ///
    /// Dropping the returned future before it completes (a caller timeout,
    /// a closed screen) returns the session to `Ready`.
    pub async fn validate(
        &mut self,
        store: &dyn ListStore,
        trainer: Option<&dyn AnnotationTrainer>,
    ) -> SessionResult<ValidationOutcome> {
        let pending = self.begin_validation()?;
        let training_enabled = self.config.training.enabled;
        let guard = SavingGuard { session: self };

        let result = store.validate_item(&pending.list_id, &pending.validation).await;
        if result.is_ok() && training_enabled {
            if let Some(trainer) = trainer {
                submit_training(trainer, &pending).await;
            }
        }

        guard.session.finish_validation(pending, result)
    }
}

/// Leaves `Saving` if a validation is dropped while awaiting the server.
struct SavingGuard<'a> {
    session: &'a mut AnnotationSession,
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        if self.session.phase == Phase::Saving {
            log::warn!("Validation interrupted, back to ready");
            self.session.phase = Phase::Ready;
        }
    }
}

/// Send training annotations for a locally stored image. Failures are
/// logged and dropped.
async fn submit_training(trainer: &dyn AnnotationTrainer, pending: &PendingValidation) {
    if !pending.local_image {
        return;
    }

    let (width, height) = match media::image_dimensions(&pending.image_url) {
        Ok(dimensions) => dimensions,
        Err(e) => {
            log::warn!("Skipping training annotations: {}", e);
            return;
        }
    };

    let annotations = pending.training_annotations(width, height);
    match trainer
        .send_annotations(&pending.image_url, width, height, &annotations)
        .await
    {
        Ok(()) => log::info!("Sent {} training annotation(s) for {}", annotations.len(), pending.image_url),
        Err(e) => log::warn!("Training annotations for {} failed: {}", pending.image_url, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::annotation::BoxUpdate;
    use crate::models::list::{ListItem, UnlabeledList};
    use crate::remote::MemoryStore;

    fn two_item_store() -> MemoryStore {
        MemoryStore::with_list(
            UnlabeledList::new("l1", "pets")
                .with_item(ListItem::new("1", "https://x/1.jpg"))
                .with_item(ListItem::new("2", "https://x/2.jpg")),
        )
    }

    async fn loaded(store: &MemoryStore) -> AnnotationSession {
        let mut session = AnnotationSession::new(Config::default());
        session.load(store, "l1").await.unwrap();
        session
    }

    #[test]
    fn test_label_record_strings() {
        let mut bbox = BoundingBox::new(crate::models::annotation::BoxId(0));
        assert!(LabelRecord::from_box(&bbox).is_none());
        bbox.status = crate::models::annotation::BoxStatus::Labeled("cat".into());
        bbox.geometry.rotation = -12.5;
        let record = LabelRecord::from_box(&bbox).unwrap();
        assert_eq!(record.name, "cat");
        assert_eq!(record.position, ["0.5", "0.5", "0.3", "0.3", "-12.5"].map(String::from));
    }

    #[tokio::test]
    async fn test_rejected_without_labels_and_no_network_call() {
        let store = two_item_store();
        let mut session = loaded(&store).await;
        session.create_box().unwrap();

        let err = session.validate(&store, None).await.unwrap_err();
        assert!(matches!(err, SessionError::NothingToValidate));
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.boxes().len(), 1);
        assert!(store.validations().is_empty());
    }

    #[tokio::test]
    async fn test_only_completed_boxes_are_submitted() {
        let store = two_item_store();
        let mut session = loaded(&store).await;
        for name in ["cat", "dog", "cow"] {
            session.create_box().unwrap();
            session.label_current_box(name).unwrap();
        }
        session.create_box().unwrap();
        session.create_box().unwrap();

        let outcome = session.validate(&store, None).await.unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Advanced {
                item_index: 0,
                image_url: "https://x/2.jpg".into(),
                labels_submitted: 3,
            }
        );
        let (_, sent) = &store.validations()[0];
        let names: Vec<_> = sent.labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["cat", "dog", "cow"]);
        assert!(session.boxes().is_empty());
        assert_eq!(session.current_box_id(), None);
    }

    #[tokio::test]
    async fn test_second_begin_is_busy() {
        let store = two_item_store();
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("cat").unwrap();

        let pending = session.begin_validation().unwrap();
        assert!(session.is_saving());
        assert!(matches!(
            session.begin_validation(),
            Err(SessionError::Busy { phase: Phase::Saving })
        ));
        assert!(matches!(session.create_box(), Err(SessionError::NotReady { .. })));

        session.finish_validation(pending, Ok(())).unwrap();
        assert_eq!(session.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_work() {
        let store = two_item_store();
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("cat").unwrap();
        store.fail_next_validate(RemoteError::rejected(500, "boom"));

        let err = session.validate(&store, None).await.unwrap_err();
        assert!(matches!(err, SessionError::Remote(RemoteError::Rejected { status: 500, .. })));
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.boxes().len(), 1);
        assert_eq!(session.pending_items().len(), 2);

        // Retry succeeds without re-annotating.
        session.validate(&store, None).await.unwrap();
        assert_eq!(session.pending_items().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_ticket_rejected() {
        let store = two_item_store();
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("cat").unwrap();
        let pending = session.begin_validation().unwrap();
        session.finish_validation(pending.clone(), Ok(())).unwrap();

        assert!(matches!(
            session.finish_validation(pending, Ok(())),
            Err(SessionError::StaleValidation { .. })
        ));
        assert_eq!(session.pending_items().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_item_id_aborts() {
        let store = MemoryStore::with_list(UnlabeledList::new("l1", "anon").with_item(ListItem {
            image_url: "https://x/1.jpg".into(),
            ..Default::default()
        }));
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("cat").unwrap();

        assert!(matches!(
            session.validate(&store, None).await,
            Err(SessionError::MissingItemId { index: 0 })
        ));
        assert_eq!(session.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_local_image_sends_training_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.png");
        image::RgbImage::new(200, 100).save(&path).unwrap();
        let url = format!("file://{}", path.display());

        let store = MemoryStore::with_list(UnlabeledList::new("l1", "local").with_item(ListItem::new("1", url.clone())));
        let mut session = loaded(&store).await;
        let id = session.create_box().unwrap();
        session
            .update_box(
                id,
                &BoxUpdate {
                    width: Some(0.5),
                    ..Default::default()
                },
            )
            .unwrap();
        session.label_current_box("mug").unwrap();

        let outcome = session.validate(&store, Some(&store)).await.unwrap();
        assert!(matches!(outcome, ValidationOutcome::ListCompleted { .. }));

        let sent = store.training_submissions();
        assert_eq!(sent.len(), 1);
        assert_eq!((sent[0].width, sent[0].height), (200, 100));
        assert_eq!(sent[0].image_ref, url);
        let top_left = sent[0].annotations[0].corners[0];
        assert!((top_left.x - 50.0).abs() < 1e-9);
        assert!((top_left.y - 35.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_training_failure_does_not_block() {
        let store = MemoryStore::with_list(
            UnlabeledList::new("l1", "local")
                .with_item(ListItem::new("1", "/no/such/image.png"))
                .with_item(ListItem::new("2", "/no/such/other.png")),
        );
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("mug").unwrap();
        session.validate(&store, Some(&store)).await.unwrap();
        assert_eq!(session.pending_items().len(), 1);

        // Dimensions readable but the service itself fails.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.png");
        image::RgbImage::new(10, 10).save(&path).unwrap();
        let store = MemoryStore::with_list(
            UnlabeledList::new("l1", "local").with_item(ListItem::new("1", path.display().to_string())),
        );
        store.fail_next_training(RemoteError::Transport("offline".into()));
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("mug").unwrap();
        assert!(session.validate(&store, Some(&store)).await.is_ok());
        assert!(store.training_submissions().is_empty());
        assert_eq!(store.validations().len(), 1);
    }

    /// Never answers a validation.
    struct StalledStore;

    #[async_trait::async_trait]
    impl ListStore for StalledStore {
        async fn get_by_id(&self, list_id: &str) -> Result<UnlabeledList, RemoteError> {
            Err(RemoteError::NotFound(list_id.to_string()))
        }

        async fn validate_item(&self, _list_id: &str, _validation: &ItemValidation) -> Result<(), RemoteError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_interrupted_validation_returns_to_ready() {
        let store = two_item_store();
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("cat").unwrap();

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            session.validate(&StalledStore, None),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.boxes().len(), 1);
        assert_eq!(session.pending_items().len(), 2);

        session.create_box().unwrap();
        let outcome = session.validate(&store, None).await.unwrap();
        assert!(matches!(outcome, ValidationOutcome::Advanced { labels_submitted: 1, .. }));
    }

    #[tokio::test]
    async fn test_abort_validation() {
        let store = two_item_store();
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("cat").unwrap();

        let pending = session.begin_validation().unwrap();
        session.abort_validation(&pending);
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.boxes().len(), 1);

        // A ticket from an earlier attempt cannot end a newer one.
        let current = session.begin_validation().unwrap();
        session.finish_validation(current, Ok(())).unwrap();
        session.create_box().unwrap();
        session.label_current_box("dog").unwrap();
        session.begin_validation().unwrap();
        session.abort_validation(&pending);
        assert_eq!(session.phase(), Phase::Saving);
    }

    #[tokio::test]
    async fn test_remote_images_skip_training() {
        let store = two_item_store();
        let mut session = loaded(&store).await;
        session.create_box().unwrap();
        session.label_current_box("cat").unwrap();
        session.validate(&store, Some(&store)).await.unwrap();
        assert!(store.training_submissions().is_empty());
    }
}
