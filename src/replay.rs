// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Scripted annotation sessions.
//!
//! A replay script carries a list fixture, an optional label catalog and a
//! sequence of user actions. Running it drives a real session against an
//! in-memory store, which makes workflows reproducible from a file.

use crate::config::Config;
use crate::models::annotation::{BoxId, BoxUpdate};
use crate::models::list::UnlabeledList;
use crate::remote::MemoryStore;
use crate::session::picker::LabelCatalog;
use crate::session::{AnnotationSession, SessionSnapshot};
use crate::SessionError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Geometry edit of one box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxEdit {
    pub id: BoxId,
    #[serde(flatten)]
    pub update: BoxUpdate,
}

/// One user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update(BoxEdit),
    Remove(BoxId),
    Select(BoxId),
    /// Pick this exact label for the current box.
    Label(String),
    /// Pick the first catalog label matching a search query.
    Pick(String),
    Validate,
    Next,
    Previous,
    GoTo(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayScript {
    pub list: UnlabeledList,
    #[serde(default)]
    pub labels: LabelCatalog,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub actions: Vec<Action>,
}

/// What a replay did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub actions: usize,
    pub rejected: usize,
    pub submitted: usize,
    pub training_submissions: usize,
    pub session: SessionSnapshot,
}

/// Run a script. User-level errors (rejected actions) are logged and the
/// replay continues; only a failed load aborts it.
pub async fn run(script: ReplayScript, config: Config) -> Result<ReplayReport> {
    let mut list = script.list;
    if list.id.is_empty() {
        list.id = "replay".to_string();
    }
    let list_id = list.id.clone();
    let store = MemoryStore::with_list(list);
    let mut session = AnnotationSession::new(config);

    session
        .load(&store, &list_id)
        .await
        .with_context(|| format!("Failed to load list '{}'", list_id))?;

    let mut rejected = 0;
    for (step, action) in script.actions.iter().enumerate() {
        match apply(&mut session, &store, &script.labels, action).await {
            Ok(()) => log::info!("Step {}: {:?} ok", step, action),
            Err(e) => {
                rejected += 1;
                log::warn!("Step {}: {:?} rejected: {}", step, action, e);
            }
        }
    }

    Ok(ReplayReport {
        actions: script.actions.len(),
        rejected,
        submitted: store.validations().len(),
        training_submissions: store.training_submissions().len(),
        session: session.snapshot(),
    })
}

async fn apply(
    session: &mut AnnotationSession,
    store: &MemoryStore,
    catalog: &LabelCatalog,
    action: &Action,
) -> Result<(), SessionError> {
    match action {
        Action::Create => {
            session.create_box()?;
        }
        Action::Update(edit) => session.update_box(edit.id, &edit.update)?,
        Action::Remove(id) => {
            session.remove_box(*id)?;
        }
        Action::Select(id) => session.select_box(*id)?,
        Action::Label(label) => {
            let ticket = session.open_picker()?;
            session.pick_label(ticket, label)?;
        }
        Action::Pick(query) => {
            let ticket = session.open_picker()?;
            let label = catalog
                .filter(query)
                .first()
                .map(|l| l.to_string())
                .unwrap_or_default();
            session.pick_label(ticket, &label)?;
        }
        Action::Validate => {
            let outcome = session.validate(store, Some(store)).await?;
            log::info!("{:?}", outcome);
        }
        Action::Next => {
            session.next_image()?;
        }
        Action::Previous => {
            session.previous_image()?;
        }
        Action::GoTo(index) => {
            session.go_to_image(*index)?;
        }
    }
    Ok(())
}
