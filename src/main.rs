// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness tracker command-line client.
//!
//! Restores (or creates) a session against the backend and reports the
//! exercise catalog size and the user's recent workouts.

use fitness_tracker::{config::Config, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Workouts listed at startup.
const RECENT_WORKOUTS: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(backend = %config.backend_url, "Starting fitness tracker client");

    let state = AppState::from_config(config)?;

    if let Err(e) = state.session.check_session().await {
        tracing::warn!(error = %e, "Could not restore session");
    }

    if !state.session.is_authenticated().await {
        let (Ok(email), Ok(password)) = (
            std::env::var("FITNESS_EMAIL"),
            std::env::var("FITNESS_PASSWORD"),
        ) else {
            tracing::info!("Not signed in; set FITNESS_EMAIL and FITNESS_PASSWORD to sign in");
            return Ok(());
        };
        state.session.sign_in(&email, &password).await?;
    }

    let user = state
        .session
        .current_user()
        .await
        .ok_or("Signed in without a user")?;
    tracing::info!(user_id = %user.id, name = %user.display_name(), "Session ready");

    let catalog = state.gateway.fetch_exercise_catalog().await?;
    tracing::info!(count = catalog.len(), "Exercise catalog loaded");

    let workouts = state.gateway.fetch_workouts_for_user(&user.id).await?;
    for workout in workouts.iter().take(RECENT_WORKOUTS) {
        tracing::info!(
            workout_id = %workout.id,
            title = workout.title.as_deref().unwrap_or("Untitled"),
            status = %workout.status,
            created_at = %workout.created_at,
            "Recent workout"
        );
    }

    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitness_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
