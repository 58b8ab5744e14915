// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-progress workout drafts kept on the client.
//!
//! Drafts live in memory for the lifetime of the process. They are
//! serializable so callers can write them wherever they like.

use crate::models::Exercise;
use crate::services::workout_builder::PlannedSet;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Uncommitted builder state for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDraft {
    pub user_id: String,
    pub exercises: Vec<Exercise>,
    pub exercise_sets: HashMap<String, Vec<PlannedSet>>,
    pub saved_at: DateTime<Utc>,
}

/// Draft store keyed by user id. Clones share the same drafts.
#[derive(Clone, Default)]
pub struct DraftStore {
    drafts: Arc<DashMap<String, WorkoutDraft>>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save (or replace) the user's draft.
    pub fn save(&self, draft: WorkoutDraft) {
        tracing::debug!(user_id = %draft.user_id, exercises = draft.exercises.len(), "Draft saved");
        self.drafts.insert(draft.user_id.clone(), draft);
    }

    pub fn load(&self, user_id: &str) -> Option<WorkoutDraft> {
        self.drafts.get(user_id).map(|d| d.clone())
    }

    pub fn remove(&self, user_id: &str) -> Option<WorkoutDraft> {
        self.drafts.remove(user_id).map(|(_, d)| d)
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}
