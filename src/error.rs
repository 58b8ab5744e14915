// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error taxonomy shared by the session store, data gateway and workout builder.

use crate::models::{Workout, WorkoutExerciseDetails};
use serde::Serialize;
use uuid::Uuid;

/// Failures reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Sign up failed")]
    SignUpFailed,

    #[error("Sign in failed")]
    SignInFailed,

    #[error("Session expired")]
    SessionExpired,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Authentication error: {0}")]
    Unknown(String),
}

/// Transport-level failures talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Gateway not initialized (offline mode)")]
    NotInitialized,

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Response bytes did not match the expected record shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodingError {
    #[error("Unexpected response shape: {0}")]
    Shape(String),

    #[error("Unrecognized date: {0}")]
    Date(String),
}

impl DecodingError {
    /// Prefix carried by serde errors raised from the flexible date parser.
    pub const DATE_MARKER: &'static str = "unrecognized date format";

    /// Classify a serde_json error, separating date failures from shape failures.
    pub fn from_json(err: &serde_json::Error) -> Self {
        let msg = err.to_string();
        if msg.contains(Self::DATE_MARKER) {
            DecodingError::Date(msg)
        } else {
            DecodingError::Shape(msg)
        }
    }
}

/// Which step of a workout commit failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStep {
    /// Linking an exercise to the workout.
    ExerciseDetails { exercise_id: String },
    /// Persisting one set of an already linked exercise.
    Set { exercise_id: String, index: usize },
}

/// Rows that were successfully written before a commit stopped.
#[derive(Debug, Clone)]
pub struct CommitProgress {
    pub workout: Workout,
    /// Saved link rows, in accumulation order.
    pub saved_details: Vec<WorkoutExerciseDetails>,
    pub saved_set_ids: Vec<Uuid>,
    pub total_exercises: usize,
    pub total_sets: usize,
}

/// A workout commit failed after the workout row was created.
///
/// The created rows are left in place; callers either resume the commit or
/// discard the partial workout.
#[derive(Debug)]
pub struct PartialCommitError {
    pub progress: CommitProgress,
    pub failed_step: CommitStep,
    pub source: Box<AppError>,
}

impl std::fmt::Display for PartialCommitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Workout {} created, {} of {} exercises and {} of {} sets saved: {}",
            self.progress.workout.id,
            self.progress.saved_details.len(),
            self.progress.total_exercises,
            self.progress.saved_set_ids.len(),
            self.progress.total_sets,
            self.source
        )
    }
}

impl std::error::Error for PartialCommitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl PartialCommitError {
    pub fn workout_id(&self) -> Uuid {
        self.progress.workout.id
    }
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Decoding(#[from] DecodingError),

    #[error(transparent)]
    PartialCommit(#[from] PartialCommitError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Short message plus retry hint for user-facing callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub message: String,
    pub retryable: bool,
}

impl AppError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(NetworkError::NotInitialized) => false,
            AppError::Network(_) => true,
            AppError::PartialCommit(_) => true,
            _ => false,
        }
    }

    pub fn is_partial_commit(&self) -> bool {
        matches!(self, AppError::PartialCommit(_))
    }

    pub fn user_facing(&self) -> UserFacingError {
        let message = match self {
            AppError::Auth(AuthError::SignInFailed) => "Incorrect email or password.".to_string(),
            AppError::Auth(AuthError::SignUpFailed) => "Could not create the account.".to_string(),
            AppError::Auth(AuthError::SessionExpired) => {
                "Your session expired. Please sign in again.".to_string()
            }
            AppError::Auth(AuthError::Unauthorized) => "You are not signed in.".to_string(),
            AppError::Auth(AuthError::Unknown(_)) => "Authentication failed.".to_string(),
            AppError::Network(NetworkError::Timeout) => "The request timed out.".to_string(),
            AppError::Network(NetworkError::NotInitialized) => {
                "The service is not available.".to_string()
            }
            AppError::Network(_) => "Network problem. Please try again.".to_string(),
            AppError::Decoding(_) => "Received unexpected data from the server.".to_string(),
            AppError::PartialCommit(err) => format!(
                "Workout created, {} of {} exercises saved.",
                err.progress.saved_details.len(),
                err.progress.total_exercises
            ),
            AppError::Validation(msg) => msg.clone(),
            AppError::Rejected { .. } => "The server rejected the request.".to_string(),
            AppError::NotFound(what) => format!("{} not found.", what),
            AppError::Storage(_) | AppError::Internal(_) => "Something went wrong.".to_string(),
        };

        UserFacingError {
            message,
            retryable: self.is_retryable(),
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
