// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session, workout building and storage helpers.

pub mod auth;
pub mod drafts;
pub mod storage;
pub mod workout_builder;

pub use auth::{
    AuthClient, FileSessionPersistence, MemorySessionPersistence, SessionPersistence,
    SessionSnapshot, SessionStore, StoredSession,
};
pub use drafts::{DraftStore, WorkoutDraft};
pub use storage::StorageUrls;
pub use workout_builder::{PlannedSet, WorkoutBuilder, DEFAULT_SET_COUNT};
