//! Data access layer (backend REST API).

pub mod gateway;
pub mod operations;
pub mod transport;

pub use gateway::{
    DataGateway, Pagination, QueryBuilder, Response, RowPolicy, MAX_PAGES, PAGE_SIZE,
};
pub use transport::{HttpTransport, RestRequest, RestResponse, RestTransport};

/// Resource (table) names as constants.
pub mod resources {
    pub const PROFILES: &str = "profiles";
    pub const EXERCISES: &str = "exercises";
    pub const WORKOUTS: &str = "workouts";
    /// Join rows linking exercises to workouts
    pub const WORKOUT_EXERCISE_DETAILS: &str = "workout_exercise_details";
    pub const WORKOUT_SETS: &str = "workout_sets";
    pub const WORKOUT_TEMPLATES: &str = "workout_templates";
}
