// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Saved workout template summaries.

use crate::time_utils::flexible;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Template summary. Exercise composition is not stored with the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    pub name: String,
    pub exercise_count: i32,
    /// Free-form label such as "low", "medium" or "high"
    pub intensity: String,
    pub user_id: String,
    #[serde(with = "flexible")]
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new template.
#[derive(Debug, Clone, Serialize)]
pub struct NewWorkoutTemplate {
    pub id: Uuid,
    pub name: String,
    pub exercise_count: i32,
    pub intensity: String,
    pub user_id: String,
    #[serde(with = "flexible")]
    pub created_at: DateTime<Utc>,
}

impl NewWorkoutTemplate {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        exercise_count: i32,
        intensity: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            exercise_count,
            intensity: intensity.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}
