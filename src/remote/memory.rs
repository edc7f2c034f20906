// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory list store and training sink.
//!
//! Used by the replay binary and the tests. Failures can be injected to
//! exercise the session's error paths.

use super::{AnnotationTrainer, ListStore, RemoteError};
use crate::models::list::UnlabeledList;
use crate::session::validation::{ItemValidation, TrainingAnnotation};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A training submission accepted by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSubmission {
    pub image_ref: String,
    pub width: u32,
    pub height: u32,
    pub annotations: Vec<TrainingAnnotation>,
}

/// Failures to return from the next matching call.
#[derive(Debug, Default)]
struct Faults {
    fetch: Option<RemoteError>,
    validate: Option<RemoteError>,
    training: Option<RemoteError>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    lists: Mutex<HashMap<String, UnlabeledList>>,
    validations: Mutex<Vec<(String, ItemValidation)>>,
    training: Mutex<Vec<TrainingSubmission>>,
    faults: Mutex<Faults>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RemoteError> {
    mutex
        .lock()
        .map_err(|_| RemoteError::Transport("memory store lock poisoned".into()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a single list, keyed by the list's id.
    pub fn with_list(list: UnlabeledList) -> Self {
        let store = Self::new();
        store.insert(list);
        store
    }

    /// Add or replace a list.
    pub fn insert(&self, list: UnlabeledList) {
        if let Ok(mut lists) = lock(&self.lists) {
            lists.insert(list.id.clone(), list);
        }
    }

    /// Server-side view of a list.
    pub fn list(&self, list_id: &str) -> Option<UnlabeledList> {
        lock(&self.lists).ok()?.get(list_id).cloned()
    }

    /// Every accepted validation, in arrival order.
    pub fn validations(&self) -> Vec<(String, ItemValidation)> {
        lock(&self.validations).map(|v| v.clone()).unwrap_or_default()
    }

    /// Every accepted training submission, in arrival order.
    pub fn training_submissions(&self) -> Vec<TrainingSubmission> {
        lock(&self.training).map(|v| v.clone()).unwrap_or_default()
    }

    /// Make the next `get_by_id` call fail.
    pub fn fail_next_fetch(&self, error: RemoteError) {
        if let Ok(mut faults) = lock(&self.faults) {
            faults.fetch = Some(error);
        }
    }

    /// Make the next `validate_item` call fail.
    pub fn fail_next_validate(&self, error: RemoteError) {
        if let Ok(mut faults) = lock(&self.faults) {
            faults.validate = Some(error);
        }
    }

    /// Make the next `send_annotations` call fail.
    pub fn fail_next_training(&self, error: RemoteError) {
        if let Ok(mut faults) = lock(&self.faults) {
            faults.training = Some(error);
        }
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    async fn get_by_id(&self, list_id: &str) -> Result<UnlabeledList, RemoteError> {
        if let Some(error) = lock(&self.faults)?.fetch.take() {
            return Err(error);
        }
        lock(&self.lists)?
            .get(list_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("list '{}'", list_id)))
    }

    async fn validate_item(&self, list_id: &str, validation: &ItemValidation) -> Result<(), RemoteError> {
        if let Some(error) = lock(&self.faults)?.validate.take() {
            return Err(error);
        }

        let mut lists = lock(&self.lists)?;
        let list = lists
            .get_mut(list_id)
            .ok_or_else(|| RemoteError::NotFound(format!("list '{}'", list_id)))?;

        match list.position_of(&validation.item_id) {
            Some(index) => {
                let mut item = list.items.remove(index);
                item.labels = validation.labels.clone();
                list.validated_items.push(item);
            }
            None => {
                let already_validated = list
                    .validated_items
                    .iter()
                    .any(|item| item.external_id() == Some(validation.item_id.as_str()));
                if !already_validated {
                    return Err(RemoteError::NotFound(format!("item '{}'", validation.item_id)));
                }
                log::debug!("item '{}' was already validated", validation.item_id);
            }
        }
        drop(lists);

        lock(&self.validations)?.push((list_id.to_string(), validation.clone()));
        Ok(())
    }
}

#[async_trait]
impl AnnotationTrainer for MemoryStore {
    async fn send_annotations(
        &self,
        image_ref: &str,
        width: u32,
        height: u32,
        annotations: &[TrainingAnnotation],
    ) -> Result<(), RemoteError> {
        if let Some(error) = lock(&self.faults)?.training.take() {
            return Err(error);
        }
        lock(&self.training)?.push(TrainingSubmission {
            image_ref: image_ref.to_string(),
            width,
            height,
            annotations: annotations.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::list::ListItem;

    fn fixture() -> MemoryStore {
        MemoryStore::with_list(
            UnlabeledList::new("l1", "fixture")
                .with_item(ListItem::new("a", "https://x/a.jpg"))
                .with_item(ListItem::new("b", "https://x/b.jpg")),
        )
    }

    #[tokio::test]
    async fn test_fetch_and_missing_list() {
        let store = fixture();
        assert_eq!(store.get_by_id("l1").await.unwrap().items.len(), 2);
        assert!(matches!(
            store.get_by_id("nope").await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_moves_item_and_is_idempotent() {
        let store = fixture();
        let validation = ItemValidation {
            item_id: "a".into(),
            labels: Vec::new(),
        };
        store.validate_item("l1", &validation).await.unwrap();
        store.validate_item("l1", &validation).await.unwrap();

        let list = store.list("l1").unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.validated_items.len(), 1);
        assert_eq!(store.validations().len(), 2);

        let unknown = ItemValidation {
            item_id: "zzz".into(),
            labels: Vec::new(),
        };
        assert!(store.validate_item("l1", &unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let store = fixture();
        store.fail_next_fetch(RemoteError::Transport("offline".into()));
        assert!(store.get_by_id("l1").await.is_err());
        assert!(store.get_by_id("l1").await.is_ok());
    }
}
