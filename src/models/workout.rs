// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Workout models: the normalized persisted rows and the assembled read model.

use crate::models::Exercise;
use crate::time_utils::{flexible, flexible_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workout lifecycle state. Stored as a plain string; unknown values are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkoutStatus {
    Active,
    Completed,
    Other(String),
}

impl WorkoutStatus {
    pub fn as_str(&self) -> &str {
        match self {
            WorkoutStatus::Active => "active",
            WorkoutStatus::Completed => "completed",
            WorkoutStatus::Other(s) => s,
        }
    }
}

impl From<String> for WorkoutStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => WorkoutStatus::Active,
            "completed" => WorkoutStatus::Completed,
            _ => WorkoutStatus::Other(value),
        }
    }
}

impl From<WorkoutStatus> for String {
    fn from(value: WorkoutStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for WorkoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's tracked workout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: Uuid,
    /// Owner; must be the authenticated user that created it
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(with = "flexible")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "flexible")]
    pub updated_at: DateTime<Utc>,
    pub status: WorkoutStatus,
}

impl Workout {
    /// New active workout with a client-generated id.
    pub fn start(user_id: impl Into<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title,
            created_at: now,
            updated_at: now,
            status: WorkoutStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkoutStatus::Active
    }
}

/// Status update sent when a workout is finished.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutStatusPatch {
    pub status: WorkoutStatus,
    #[serde(with = "flexible")]
    pub updated_at: DateTime<Utc>,
}

/// Join row linking one exercise occurrence to one workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExerciseDetails {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub exercise_id: String,
    #[serde(with = "flexible")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "flexible")]
    pub updated_at: DateTime<Utc>,
}

impl WorkoutExerciseDetails {
    pub fn link(workout_id: Uuid, exercise_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workout_id,
            exercise_id: exercise_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

fn default_set_type() -> String {
    "normal".to_string()
}

/// One performed set (weight x reps) of a linked exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub id: Uuid,
    pub workout_exercise_details_id: Uuid,
    pub weight: f64,
    #[serde(rename = "type", default = "default_set_type")]
    pub set_type: String,
    pub reps: i32,
    pub completed: bool,
    /// 0-based display order within the exercise
    #[serde(default)]
    pub position: i32,
    #[serde(with = "flexible")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "flexible")]
    pub updated_at: DateTime<Utc>,
}

/// Partial set update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutSetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub set_type: Option<String>,
    #[serde(with = "flexible_option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One exercise of a workout together with its sets, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseEntry {
    pub details: WorkoutExerciseDetails,
    /// `None` if the catalog entry no longer exists
    pub exercise: Option<Exercise>,
    pub sets: Vec<WorkoutSet>,
}

impl ExerciseEntry {
    pub fn completed_sets(&self) -> usize {
        self.sets.iter().filter(|s| s.completed).count()
    }
}

/// Display-only view assembled from the normalized rows. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutWithExercises {
    pub workout: Workout,
    pub exercises: Vec<ExerciseEntry>,
}

impl WorkoutWithExercises {
    /// Group rows into entries: details in creation order, sets by position.
    pub fn assemble(
        workout: Workout,
        mut details: Vec<WorkoutExerciseDetails>,
        exercises: &[Exercise],
        sets: Vec<WorkoutSet>,
    ) -> Self {
        details.sort_by_key(|d| d.created_at);

        let entries = details
            .into_iter()
            .map(|d| {
                let mut own_sets: Vec<WorkoutSet> = sets
                    .iter()
                    .filter(|s| s.workout_exercise_details_id == d.id)
                    .cloned()
                    .collect();
                own_sets.sort_by_key(|s| (s.position, s.created_at));
                let exercise = exercises.iter().find(|e| e.id == d.exercise_id).cloned();
                ExerciseEntry {
                    details: d,
                    exercise,
                    sets: own_sets,
                }
            })
            .collect();

        Self {
            workout,
            exercises: entries,
        }
    }

    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    /// Total volume (weight x reps) over completed sets.
    pub fn completed_volume(&self) -> f64 {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .filter(|s| s.completed)
            .map(|s| s.weight * f64::from(s.reps))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_open_set() {
        let status: WorkoutStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(status, WorkoutStatus::Other("paused".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"paused\"");

        let status: WorkoutStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, WorkoutStatus::Completed);
    }

    #[test]
    fn test_set_type_wire_name() {
        let patch = WorkoutSetPatch {
            set_type: Some("warmup".to_string()),
            completed: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "completed": true, "type": "warmup" }));
    }
}
