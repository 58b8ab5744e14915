// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Exercise catalog model.
//!
//! List-valued attributes are stored as flat strings (comma-joined, or
//! newline-joined for instructions). The accessors below split them for
//! display; the flat string stays authoritative.

use crate::services::storage::StorageUrls;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Storage bucket holding exercise demonstration GIFs.
pub const EXERCISE_GIF_BUCKET: &str = "exercise-gifs";

/// Catalog entry describing a movement. Read-only for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_type: Option<String>,
    /// Comma-joined muscle names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_muscles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_muscles: Option<String>,
    /// Newline-joined steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muscle_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_part: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    /// Absolute URL or a path inside [`EXERCISE_GIF_BUCKET`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gif_url: Option<String>,
}

impl PartialEq for Exercise {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Exercise {}

impl Hash for Exercise {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn split_list(value: Option<&str>, separator: char) -> Vec<String> {
    value
        .map(|v| {
            v.split(separator)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl Exercise {
    /// Minimal catalog entry, mostly useful for building fixtures.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            exercise_type: None,
            primary_muscles: None,
            secondary_muscles: None,
            instructions: None,
            experience_level: None,
            muscle_group: None,
            description: None,
            benefits: None,
            equipment: None,
            force_type: None,
            mechanics: None,
            body_part: None,
            target: None,
            experience: None,
            gif_url: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed exercise")
    }

    pub fn primary_muscles_list(&self) -> Vec<String> {
        split_list(self.primary_muscles.as_deref(), ',')
    }

    pub fn secondary_muscles_list(&self) -> Vec<String> {
        split_list(self.secondary_muscles.as_deref(), ',')
    }

    pub fn benefits_list(&self) -> Vec<String> {
        split_list(self.benefits.as_deref(), ',')
    }

    pub fn equipment_list(&self) -> Vec<String> {
        split_list(self.equipment.as_deref(), ',')
    }

    /// Instruction steps in order.
    pub fn instruction_steps(&self) -> Vec<String> {
        split_list(self.instructions.as_deref(), '\n')
    }

    /// Resolve the demonstration GIF to a fetchable URL.
    pub fn gif_asset_url(&self, storage: &StorageUrls) -> Option<String> {
        let gif = self.gif_url.as_deref()?.trim();
        if gif.is_empty() {
            None
        } else if gif.starts_with("http://") || gif.starts_with("https://") {
            Some(gif.to_string())
        } else {
            Some(storage.public_url(EXERCISE_GIF_BUCKET, gif))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_accessors() {
        let mut ex = Exercise::new("1", "Bench Press");
        ex.primary_muscles = Some("chest, triceps,,".to_string());
        ex.instructions = Some("Lie on the bench\n\nLower the bar\nPress up\n".to_string());
        ex.equipment = None;

        assert_eq!(ex.primary_muscles_list(), vec!["chest", "triceps"]);
        assert_eq!(
            ex.instruction_steps(),
            vec!["Lie on the bench", "Lower the bar", "Press up"]
        );
        assert!(ex.equipment_list().is_empty());
    }

    #[test]
    fn test_identity_is_by_id() {
        let a = Exercise::new("42", "Squat");
        let b = Exercise::new("42", "Back Squat");
        assert_eq!(a, b);
        assert_ne!(a, Exercise::new("43", "Squat"));
    }

    #[test]
    fn test_gif_asset_url() {
        let storage = StorageUrls::new("https://cdn.example.com/storage/v1/object/public");
        let mut ex = Exercise::new("1", "Row");
        assert_eq!(ex.gif_asset_url(&storage), None);

        ex.gif_url = Some("rows/barbell row.gif".to_string());
        assert_eq!(
            ex.gif_asset_url(&storage).as_deref(),
            Some("https://cdn.example.com/storage/v1/object/public/exercise-gifs/rows/barbell%20row.gif")
        );

        ex.gif_url = Some("https://other.example.com/row.gif".to_string());
        assert_eq!(
            ex.gif_asset_url(&storage).as_deref(),
            Some("https://other.example.com/row.gif")
        );
    }
}
