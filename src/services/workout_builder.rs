// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout builder session.
//!
//! Accumulates exercises and their planned sets, then commits them as:
//! 1. One workout row (`status = active`)
//! 2. One exercise-detail row per exercise, in accumulation order
//! 3. One set row per planned set, in list order, linked to the row from step 2
//!
//! The steps are not transactional. A failure after step 1 leaves the saved
//! rows in place and reports a [`PartialCommitError`]; the caller then either
//! resumes the commit or discards the partial workout. Exercises and sets
//! added after the commit are saved by `sync` and by `finish_workout`.

use crate::db::DataGateway;
use crate::error::{AppError, CommitProgress, CommitStep, PartialCommitError, Result};
use crate::models::{Exercise, Workout, WorkoutExerciseDetails, WorkoutSet, WorkoutSetPatch};
use crate::services::drafts::{DraftStore, WorkoutDraft};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Sets created for an exercise when no count is given.
pub const DEFAULT_SET_COUNT: usize = 3;

const DEFAULT_SET_TYPE: &str = "normal";

/// A set as planned in the builder, before or after it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSet {
    /// Client-generated; reused as the persisted row id
    pub id: Uuid,
    pub weight: f64,
    pub set_type: String,
    pub reps: i32,
    pub completed: bool,
    /// Exercise-detail row this set is stored under, once persisted
    pub details_id: Option<Uuid>,
}

impl PlannedSet {
    fn fresh() -> Self {
        Self {
            id: Uuid::new_v4(),
            weight: 0.0,
            set_type: DEFAULT_SET_TYPE.to_string(),
            reps: 0,
            completed: false,
            details_id: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.details_id.is_some()
    }

    fn to_row(&self, details_id: Uuid, position: usize, now: DateTime<Utc>) -> WorkoutSet {
        WorkoutSet {
            id: self.id,
            workout_exercise_details_id: details_id,
            weight: self.weight,
            set_type: self.set_type.clone(),
            reps: self.reps,
            completed: self.completed,
            position: i32::try_from(position).unwrap_or(i32::MAX),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The backend already holds a row with our client-generated id.
fn is_conflict(err: &AppError) -> bool {
    matches!(err, AppError::Rejected { status: 409, .. })
}

/// In-memory workout being assembled by one user.
///
/// All mutation goes through `&mut self`; share it behind an async mutex if
/// several tasks need it.
pub struct WorkoutBuilder {
    gateway: DataGateway,
    user_id: String,
    exercises: Vec<Exercise>,
    exercise_sets: HashMap<String, Vec<PlannedSet>>,
    /// Workout row created by the last commit
    active_workout: Option<Workout>,
    /// Persisted link rows by exercise id
    links: HashMap<String, WorkoutExerciseDetails>,
    /// Link rows sent but not yet confirmed, reused on retry
    pending_links: HashMap<String, WorkoutExerciseDetails>,
}

impl WorkoutBuilder {
    pub fn new(gateway: DataGateway, user_id: impl Into<String>) -> Self {
        Self {
            gateway,
            user_id: user_id.into(),
            exercises: Vec::new(),
            exercise_sets: HashMap::new(),
            active_workout: None,
            links: HashMap::new(),
            pending_links: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Exercises in the order they were added.
    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn contains(&self, exercise_id: &str) -> bool {
        self.exercises.iter().any(|e| e.id == exercise_id)
    }

    pub fn sets(&self, exercise_id: &str) -> &[PlannedSet] {
        self.exercise_sets
            .get(exercise_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Workout created by the last successful (or partial) commit.
    pub fn active_workout(&self) -> Option<&Workout> {
        self.active_workout.as_ref()
    }

    /// Persisted link row for an exercise, if committed.
    pub fn details_for(&self, exercise_id: &str) -> Option<&WorkoutExerciseDetails> {
        self.links.get(exercise_id)
    }

    // ─── Local accumulation ──────────────────────────────────────

    /// Add an exercise with [`DEFAULT_SET_COUNT`] sets.
    pub fn add_exercise(&mut self, exercise: Exercise) -> bool {
        self.add_exercise_with_sets(exercise, DEFAULT_SET_COUNT)
    }

    /// Add an exercise with `set_count` zeroed, uncompleted sets.
    ///
    /// Returns `false` (and changes nothing) if the exercise is already present.
    pub fn add_exercise_with_sets(&mut self, exercise: Exercise, set_count: usize) -> bool {
        if self.contains(&exercise.id) {
            return false;
        }
        let sets = (0..set_count).map(|_| PlannedSet::fresh()).collect();
        self.exercise_sets.insert(exercise.id.clone(), sets);
        self.exercises.push(exercise);
        true
    }

    /// Remove an exercise and discard its sets. Idempotent.
    ///
    /// Exercises already linked to a started workout cannot be removed, the
    /// same rule as for persisted sets.
    pub fn remove_exercise(&mut self, exercise_id: &str) -> Result<bool> {
        if self.links.contains_key(exercise_id) || self.pending_links.contains_key(exercise_id) {
            return Err(AppError::Validation(
                "Exercises of a started workout cannot be removed".to_string(),
            ));
        }
        let before = self.exercises.len();
        self.exercises.retain(|e| e.id != exercise_id);
        self.exercise_sets.remove(exercise_id);
        Ok(self.exercises.len() != before)
    }

    /// Empty the builder, including any association with a committed workout.
    pub fn clear_all(&mut self) {
        self.exercises.clear();
        self.exercise_sets.clear();
        self.active_workout = None;
        self.links.clear();
        self.pending_links.clear();
    }

    /// True iff the exercise has at least one set and every set is completed.
    pub fn is_exercise_completed(&self, exercise_id: &str) -> bool {
        let sets = self.sets(exercise_id);
        !sets.is_empty() && sets.iter().all(|s| s.completed)
    }

    pub fn sets_completed_count(&self, exercise_id: &str) -> usize {
        self.sets(exercise_id).iter().filter(|s| s.completed).count()
    }

    pub fn total_sets_count(&self, exercise_id: &str) -> usize {
        self.sets(exercise_id).len()
    }

    /// Append a fresh set to an exercise.
    ///
    /// In a started workout the set stays local until [`sync`](Self::sync)
    /// or [`finish_workout`](Self::finish_workout).
    pub fn add_set(&mut self, exercise_id: &str) -> Option<Uuid> {
        let sets = self.exercise_sets.get_mut(exercise_id)?;
        let set = PlannedSet::fresh();
        let id = set.id;
        sets.push(set);
        Some(id)
    }

    /// Remove a set that has not been persisted yet.
    pub fn remove_set(&mut self, exercise_id: &str, index: usize) -> Result<PlannedSet> {
        let sets = self.sets_mut(exercise_id)?;
        match sets.get(index) {
            None => Err(AppError::NotFound(format!("Set {} of exercise {}", index, exercise_id))),
            Some(set) if set.is_persisted() => Err(AppError::Validation(
                "Persisted sets cannot be removed from a started workout".to_string(),
            )),
            Some(_) => Ok(sets.remove(index)),
        }
    }

    fn sets_mut(&mut self, exercise_id: &str) -> Result<&mut Vec<PlannedSet>> {
        self.exercise_sets
            .get_mut(exercise_id)
            .ok_or_else(|| AppError::NotFound(format!("Exercise {}", exercise_id)))
    }

    fn set_mut(&mut self, exercise_id: &str, index: usize) -> Result<&mut PlannedSet> {
        self.sets_mut(exercise_id)?
            .get_mut(index)
            .ok_or_else(|| AppError::NotFound(format!("Set {} of exercise {}", index, exercise_id)))
    }

    // ─── Set edits (optimistic, synced once persisted) ───────────

    /// Change weight and reps of a set.
    ///
    /// Applied locally first; if the set is persisted the change is pushed to
    /// the backend and reverted locally when that fails.
    pub async fn update_set(
        &mut self,
        exercise_id: &str,
        index: usize,
        weight: f64,
        reps: i32,
    ) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 || reps < 0 {
            return Err(AppError::Validation(
                "Weight and reps must be non-negative".to_string(),
            ));
        }

        let set = self.set_mut(exercise_id, index)?;
        let previous = (set.weight, set.reps);
        set.weight = weight;
        set.reps = reps;
        let (set_id, persisted) = (set.id, set.is_persisted());

        if !persisted {
            return Ok(());
        }

        let patch = WorkoutSetPatch {
            weight: Some(weight),
            reps: Some(reps),
            ..Default::default()
        };
        if let Err(e) = self.gateway.update_set(set_id, &patch).await {
            tracing::warn!(set_id = %set_id, error = %e, "Set update failed, reverting");
            let set = self.set_mut(exercise_id, index)?;
            (set.weight, set.reps) = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Mark a set completed or not. Same optimistic rules as [`update_set`](Self::update_set).
    pub async fn set_completed(
        &mut self,
        exercise_id: &str,
        index: usize,
        completed: bool,
    ) -> Result<()> {
        let set = self.set_mut(exercise_id, index)?;
        let previous = set.completed;
        set.completed = completed;
        let (set_id, persisted) = (set.id, set.is_persisted());

        if !persisted || previous == completed {
            return Ok(());
        }

        let patch = WorkoutSetPatch {
            completed: Some(completed),
            ..Default::default()
        };
        if let Err(e) = self.gateway.update_set(set_id, &patch).await {
            tracing::warn!(set_id = %set_id, error = %e, "Set completion update failed, reverting");
            self.set_mut(exercise_id, index)?.completed = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Flip a set's completion and return the new value.
    pub async fn toggle_set_completed(&mut self, exercise_id: &str, index: usize) -> Result<bool> {
        let completed = !self.set_mut(exercise_id, index)?.completed;
        self.set_completed(exercise_id, index, completed).await?;
        Ok(completed)
    }

    // ─── Commit ──────────────────────────────────────────────────

    /// Start the workout: persist the workout, its exercise links and sets.
    ///
    /// A failure creating the workout row is returned as is. Any later
    /// failure is an [`AppError::PartialCommit`].
    pub async fn commit(&mut self, title: Option<String>) -> Result<Workout> {
        if self.active_workout.is_some() {
            return Err(AppError::Validation(
                "Workout already started; resume or discard it first".to_string(),
            ));
        }

        let draft = Workout::start(self.user_id.clone(), title);
        let workout = self.gateway.create_workout(&draft).await?;
        tracing::info!(
            workout_id = %workout.id,
            exercises = self.exercises.len(),
            "Workout created"
        );

        self.active_workout = Some(workout.clone());
        self.persist_remaining(workout).await
    }

    /// Retry the rows a partial commit did not save.
    pub async fn resume_commit(&mut self, failure: PartialCommitError) -> Result<Workout> {
        let workout = self.workout_for(&failure)?;
        tracing::info!(
            workout_id = %workout.id,
            saved_exercises = failure.progress.saved_details.len(),
            "Resuming partial commit"
        );
        self.persist_remaining(workout).await
    }

    /// Delete everything a partial commit saved, then forget the workout.
    ///
    /// Local exercises and sets are kept so the user can commit again.
    pub async fn discard_partial_commit(&mut self, failure: PartialCommitError) -> Result<()> {
        let workout = self.workout_for(&failure)?;

        let mut detail_ids: Vec<Uuid> = failure.progress.saved_details.iter().map(|d| d.id).collect();
        for link in self.links.values() {
            if !detail_ids.contains(&link.id) {
                detail_ids.push(link.id);
            }
        }

        for details_id in &detail_ids {
            self.gateway.delete_sets_for_details(*details_id).await?;
        }
        self.gateway
            .delete_exercise_details_for_workout(workout.id)
            .await?;
        self.gateway.delete_workout(workout.id).await?;

        self.forget_persisted();
        tracing::info!(workout_id = %workout.id, links = detail_ids.len(), "Partial workout discarded");
        Ok(())
    }

    /// Save exercises and sets added since the workout was started.
    ///
    /// Failures are reported like a commit failure and can be resumed.
    pub async fn sync(&mut self) -> Result<Workout> {
        let workout = self
            .active_workout
            .clone()
            .ok_or_else(|| AppError::Validation("No workout in progress".to_string()))?;
        self.persist_remaining(workout).await
    }

    /// Save outstanding rows, mark the workout completed and reset the builder.
    ///
    /// Nothing is cleared if saving or completing fails.
    pub async fn finish_workout(&mut self) -> Result<Workout> {
        let workout = self.sync().await?;
        let completed = self.gateway.complete_workout(workout.id).await?;
        self.clear_all();
        Ok(completed)
    }

    fn workout_for(&self, failure: &PartialCommitError) -> Result<Workout> {
        match &self.active_workout {
            Some(active) if active.id == failure.workout_id() => Ok(active.clone()),
            _ => Err(AppError::Validation(format!(
                "Workout {} is not in progress in this builder",
                failure.workout_id()
            ))),
        }
    }

    fn forget_persisted(&mut self) {
        self.active_workout = None;
        self.links.clear();
        self.pending_links.clear();
        for set in self.exercise_sets.values_mut().flatten() {
            set.details_id = None;
        }
    }

    /// Steps 2 and 3: save every link and set not yet saved, in order.
    async fn persist_remaining(&mut self, workout: Workout) -> Result<Workout> {
        let gateway = self.gateway.clone();
        let exercise_ids: Vec<String> = self.exercises.iter().map(|e| e.id.clone()).collect();

        let mut progress = CommitProgress {
            workout: workout.clone(),
            saved_details: Vec::new(),
            saved_set_ids: Vec::new(),
            total_exercises: exercise_ids.len(),
            total_sets: self.exercise_sets.values().map(Vec::len).sum(),
        };

        for exercise_id in exercise_ids {
            let details = match self.links.get(&exercise_id) {
                Some(existing) => existing.clone(),
                None => {
                    let link = self
                        .pending_links
                        .entry(exercise_id.clone())
                        .or_insert_with(|| WorkoutExerciseDetails::link(workout.id, exercise_id.clone()))
                        .clone();

                    let saved = match gateway.create_exercise_details(&link).await {
                        Ok(saved) => saved,
                        Err(e) if is_conflict(&e) => link,
                        Err(e) => {
                            tracing::warn!(
                                workout_id = %workout.id,
                                exercise_id = %exercise_id,
                                error = %e,
                                "Failed to link exercise"
                            );
                            return Err(partial(progress, CommitStep::ExerciseDetails { exercise_id }, e));
                        }
                    };
                    self.pending_links.remove(&exercise_id);
                    self.links.insert(exercise_id.clone(), saved.clone());
                    saved
                }
            };
            progress.saved_details.push(details.clone());

            let sets = self.exercise_sets.entry(exercise_id.clone()).or_default();
            for (index, set) in sets.iter_mut().enumerate() {
                if set.is_persisted() {
                    progress.saved_set_ids.push(set.id);
                    continue;
                }

                let row = set.to_row(details.id, index, Utc::now());
                let saved_id = match gateway.create_set(&row).await {
                    Ok(saved) => saved.id,
                    Err(e) if is_conflict(&e) => row.id,
                    Err(e) => {
                        tracing::warn!(
                            workout_id = %workout.id,
                            exercise_id = %exercise_id,
                            index,
                            error = %e,
                            "Failed to save set"
                        );
                        return Err(partial(progress, CommitStep::Set { exercise_id, index }, e));
                    }
                };
                set.id = saved_id;
                set.details_id = Some(details.id);
                progress.saved_set_ids.push(saved_id);
            }
        }

        tracing::info!(
            workout_id = %workout.id,
            exercises = progress.saved_details.len(),
            sets = progress.saved_set_ids.len(),
            "Workout committed"
        );
        Ok(workout)
    }

    // ─── Drafts ──────────────────────────────────────────────────

    /// Snapshot the uncommitted accumulation.
    pub fn to_draft(&self) -> WorkoutDraft {
        WorkoutDraft {
            user_id: self.user_id.clone(),
            exercises: self.exercises.clone(),
            exercise_sets: self.exercise_sets.clone(),
            saved_at: Utc::now(),
        }
    }

    /// Save the accumulation so it survives this builder. Only uncommitted
    /// workouts can be drafted.
    pub fn save_draft(&self, store: &DraftStore) -> Result<()> {
        if self.active_workout.is_some() {
            return Err(AppError::Validation(
                "A started workout cannot be saved as a draft".to_string(),
            ));
        }
        store.save(self.to_draft());
        Ok(())
    }

    /// Replace the accumulation with the user's saved draft, if any.
    pub fn restore_draft(&mut self, store: &DraftStore) -> bool {
        let Some(draft) = store.load(&self.user_id) else {
            return false;
        };
        self.clear_all();
        for exercise in draft.exercises {
            let mut sets = draft
                .exercise_sets
                .get(&exercise.id)
                .cloned()
                .unwrap_or_default();
            for set in &mut sets {
                set.details_id = None;
            }
            self.exercise_sets.insert(exercise.id.clone(), sets);
            self.exercises.push(exercise);
        }
        true
    }
}

fn partial(progress: CommitProgress, failed_step: CommitStep, source: AppError) -> AppError {
    PartialCommitError {
        progress,
        failed_step,
        source: Box::new(source),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> WorkoutBuilder {
        WorkoutBuilder::new(DataGateway::offline(), "user-1")
    }

    #[test]
    fn test_add_is_idempotent_by_id() {
        let mut b = builder();
        assert!(b.add_exercise(Exercise::new("1", "Bench Press")));
        assert!(!b.add_exercise_with_sets(Exercise::new("1", "Bench"), 5));
        assert_eq!(b.exercises().len(), 1);
        assert_eq!(b.total_sets_count("1"), DEFAULT_SET_COUNT);
    }

    #[test]
    fn test_fresh_sets_are_zeroed() {
        let mut b = builder();
        b.add_exercise_with_sets(Exercise::new("1", "Squat"), 2);
        for set in b.sets("1") {
            assert_eq!(set.weight, 0.0);
            assert_eq!(set.reps, 0);
            assert!(!set.completed);
            assert!(!set.is_persisted());
        }
        assert_ne!(b.sets("1")[0].id, b.sets("1")[1].id);
    }

    #[test]
    fn test_zero_sets_is_never_completed() {
        let mut b = builder();
        b.add_exercise_with_sets(Exercise::new("1", "Plank"), 0);
        assert!(!b.is_exercise_completed("1"));
        assert!(!b.is_exercise_completed("missing"));
    }

    #[test]
    fn test_remove_set_of_unknown_exercise() {
        let mut b = builder();
        assert!(matches!(b.remove_set("nope", 0), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sync_without_workout_is_rejected() {
        let mut b = builder();
        b.add_exercise(Exercise::new("1", "Row"));
        assert!(matches!(b.sync().await, Err(AppError::Validation(_))));
        assert!(matches!(b.finish_workout().await, Err(AppError::Validation(_))));
        assert_eq!(b.exercises().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_offline_is_clean_failure() {
        let mut b = builder();
        b.add_exercise(Exercise::new("1", "Row"));
        let err = b.commit(None).await.unwrap_err();
        assert!(!err.is_partial_commit());
        assert!(b.active_workout().is_none());
    }
}
