// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod exercise;
pub mod profile;
pub mod template;
pub mod user;
pub mod workout;

pub use exercise::Exercise;
pub use profile::{Profile, ProfilePatch, QuestionnaireAnswers};
pub use template::{NewWorkoutTemplate, WorkoutTemplate};
pub use user::User;
pub use workout::{
    ExerciseEntry, Workout, WorkoutExerciseDetails, WorkoutSet, WorkoutSetPatch, WorkoutStatus,
    WorkoutStatusPatch, WorkoutWithExercises,
};
