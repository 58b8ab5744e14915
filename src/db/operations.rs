// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed operations over the gateway.
//!
//! Provides high-level operations for:
//! - Profiles (creation, edits, questionnaire answers)
//! - Exercises (paginated catalog reads)
//! - Workouts, exercise-detail links and sets
//! - Workout templates

use crate::db::gateway::RowPolicy;
use crate::db::resources;
use crate::db::DataGateway;
use crate::error::{AppError, Result};
use crate::models::{
    Exercise, NewWorkoutTemplate, Profile, ProfilePatch, QuestionnaireAnswers, Workout,
    WorkoutExerciseDetails, WorkoutSet, WorkoutSetPatch, WorkoutStatus, WorkoutStatusPatch,
    WorkoutTemplate, WorkoutWithExercises,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Questionnaire answers stamped with the update time.
#[derive(Serialize)]
struct QuestionnaireUpdate<'a> {
    #[serde(flatten)]
    answers: &'a QuestionnaireAnswers,
    #[serde(with = "crate::time_utils::flexible")]
    updated_at: chrono::DateTime<Utc>,
}

impl DataGateway {
    // ─── Profile Operations ──────────────────────────────────────

    /// Get a user's profile.
    pub async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let rows: Vec<Profile> = self
            .from(resources::PROFILES)
            .eq("id", user_id)
            .limit(1)
            .execute()
            .await?
            .decoded()?;
        Ok(rows.into_iter().next())
    }

    pub async fn create_profile(&self, profile: &Profile) -> Result<Profile> {
        self.from(resources::PROFILES)
            .insert(profile)
            .await?
            .decoded_one()
    }

    /// Apply a profile edit. Absent fields are left as they are.
    pub async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Profile> {
        let mut patch = patch.clone();
        patch.updated_at.get_or_insert_with(Utc::now);

        self.from(resources::PROFILES)
            .eq("id", user_id)
            .update(&patch)
            .await?
            .decoded_one()
    }

    /// Store the onboarding questionnaire answers on the profile.
    pub async fn save_questionnaire(
        &self,
        user_id: &str,
        answers: &QuestionnaireAnswers,
    ) -> Result<Profile> {
        if answers.is_empty() {
            return Err(AppError::Validation(
                "Questionnaire has no answers".to_string(),
            ));
        }

        let update = QuestionnaireUpdate {
            answers,
            updated_at: Utc::now(),
        };

        let profile = self
            .from(resources::PROFILES)
            .eq("id", user_id)
            .update(&update)
            .await?
            .decoded_one()?;
        tracing::info!(user_id, "Questionnaire saved");
        Ok(profile)
    }

    // ─── Exercise Operations ─────────────────────────────────────

    /// Read the whole exercise catalog, ordered by name.
    ///
    /// Rows that fail to decode are skipped so one bad catalog entry does not
    /// hide the library.
    pub async fn fetch_exercise_catalog(&self) -> Result<Vec<Exercise>> {
        self.fetch_all_pages(
            resources::EXERCISES,
            |q| q.order("name", true),
            RowPolicy::SkipInvalid,
        )
        .await
    }

    pub async fn fetch_exercise(&self, exercise_id: &str) -> Result<Exercise> {
        self.from(resources::EXERCISES)
            .eq("id", exercise_id)
            .single()
            .execute()
            .await?
            .decoded()
    }

    pub async fn fetch_exercises_by_muscle_group(&self, group: &str) -> Result<Vec<Exercise>> {
        let group = group.to_string();
        self.fetch_all_pages(
            resources::EXERCISES,
            move |q| q.eq("muscle_group", &group).order("name", true),
            RowPolicy::SkipInvalid,
        )
        .await
    }

    pub async fn fetch_exercises_by_ids(&self, ids: &[String]) -> Result<Vec<Exercise>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.from(resources::EXERCISES)
            .in_list("id", ids)
            .execute()
            .await?
            .decoded_lenient(resources::EXERCISES)
    }

    // ─── Workout Operations ──────────────────────────────────────

    pub async fn create_workout(&self, workout: &Workout) -> Result<Workout> {
        self.from(resources::WORKOUTS)
            .insert(workout)
            .await?
            .decoded_one()
    }

    pub async fn fetch_workout(&self, workout_id: Uuid) -> Result<Workout> {
        self.from(resources::WORKOUTS)
            .eq("id", workout_id)
            .single()
            .execute()
            .await?
            .decoded()
    }

    /// A user's workouts, newest first.
    pub async fn fetch_workouts_for_user(&self, user_id: &str) -> Result<Vec<Workout>> {
        self.from(resources::WORKOUTS)
            .eq("user_id", user_id)
            .order("created_at", false)
            .execute()
            .await?
            .decoded()
    }

    pub async fn fetch_workouts_with_status(
        &self,
        user_id: &str,
        status: &WorkoutStatus,
    ) -> Result<Vec<Workout>> {
        self.from(resources::WORKOUTS)
            .eq("user_id", user_id)
            .eq("status", status)
            .order("created_at", false)
            .execute()
            .await?
            .decoded()
    }

    /// Mark a workout completed. This is the only persisted status transition.
    pub async fn complete_workout(&self, workout_id: Uuid) -> Result<Workout> {
        let patch = WorkoutStatusPatch {
            status: WorkoutStatus::Completed,
            updated_at: Utc::now(),
        };
        let workout = self
            .from(resources::WORKOUTS)
            .eq("id", workout_id)
            .update(&patch)
            .await?
            .decoded_one()?;
        tracing::info!(workout_id = %workout_id, "Workout completed");
        Ok(workout)
    }

    pub async fn delete_workout(&self, workout_id: Uuid) -> Result<()> {
        self.from(resources::WORKOUTS)
            .eq("id", workout_id)
            .delete()
            .await?;
        Ok(())
    }

    /// Assemble the display view of one workout from its normalized rows.
    pub async fn fetch_workout_with_exercises(
        &self,
        workout_id: Uuid,
    ) -> Result<WorkoutWithExercises> {
        let workout = self.fetch_workout(workout_id).await?;
        let details = self.fetch_exercise_details(workout_id).await?;

        let detail_ids: Vec<Uuid> = details.iter().map(|d| d.id).collect();
        let exercise_ids: Vec<String> = details.iter().map(|d| d.exercise_id.clone()).collect();

        let (sets, exercises) = tokio::try_join!(
            self.fetch_sets_for_details(&detail_ids),
            self.fetch_exercises_by_ids(&exercise_ids),
        )?;

        Ok(WorkoutWithExercises::assemble(
            workout, details, &exercises, sets,
        ))
    }

    // ─── Exercise Detail Operations ──────────────────────────────

    pub async fn create_exercise_details(
        &self,
        details: &WorkoutExerciseDetails,
    ) -> Result<WorkoutExerciseDetails> {
        self.from(resources::WORKOUT_EXERCISE_DETAILS)
            .insert(details)
            .await?
            .decoded_one()
    }

    pub async fn fetch_exercise_details(
        &self,
        workout_id: Uuid,
    ) -> Result<Vec<WorkoutExerciseDetails>> {
        self.from(resources::WORKOUT_EXERCISE_DETAILS)
            .eq("workout_id", workout_id)
            .order("created_at", true)
            .execute()
            .await?
            .decoded()
    }

    pub async fn delete_exercise_details_for_workout(&self, workout_id: Uuid) -> Result<()> {
        self.from(resources::WORKOUT_EXERCISE_DETAILS)
            .eq("workout_id", workout_id)
            .delete()
            .await?;
        Ok(())
    }

    // ─── Set Operations ──────────────────────────────────────────

    pub async fn create_set(&self, set: &WorkoutSet) -> Result<WorkoutSet> {
        self.from(resources::WORKOUT_SETS)
            .insert(set)
            .await?
            .decoded_one()
    }

    pub async fn update_set(&self, set_id: Uuid, patch: &WorkoutSetPatch) -> Result<WorkoutSet> {
        let mut patch = patch.clone();
        patch.updated_at.get_or_insert_with(Utc::now);

        self.from(resources::WORKOUT_SETS)
            .eq("id", set_id)
            .update(&patch)
            .await?
            .decoded_one()
    }

    /// Sets of the given exercise-detail rows, in display order.
    pub async fn fetch_sets_for_details(&self, detail_ids: &[Uuid]) -> Result<Vec<WorkoutSet>> {
        if detail_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.from(resources::WORKOUT_SETS)
            .in_list("workout_exercise_details_id", detail_ids)
            .order("position", true)
            .order("created_at", true)
            .execute()
            .await?
            .decoded()
    }

    pub async fn delete_sets_for_details(&self, details_id: Uuid) -> Result<()> {
        self.from(resources::WORKOUT_SETS)
            .eq("workout_exercise_details_id", details_id)
            .delete()
            .await?;
        Ok(())
    }

    // ─── Template Operations ─────────────────────────────────────

    pub async fn fetch_templates(&self, user_id: &str) -> Result<Vec<WorkoutTemplate>> {
        self.from(resources::WORKOUT_TEMPLATES)
            .eq("user_id", user_id)
            .order("created_at", false)
            .execute()
            .await?
            .decoded()
    }

    pub async fn create_template(&self, template: &NewWorkoutTemplate) -> Result<WorkoutTemplate> {
        if template.name.trim().is_empty() {
            return Err(AppError::Validation(
                "Template name must not be empty".to_string(),
            ));
        }
        self.from(resources::WORKOUT_TEMPLATES)
            .insert(template)
            .await?
            .decoded_one()
    }

    pub async fn delete_template(&self, template_id: Uuid) -> Result<()> {
        self.from(resources::WORKOUT_TEMPLATES)
            .eq("id", template_id)
            .delete()
            .await?;
        Ok(())
    }
}
