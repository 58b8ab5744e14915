// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitness tracker client core.
//!
//! This crate provides the data-access layer over the hosted backend (REST
//! query builder, auth session handling, tolerant model decoding) and the
//! client-side workout builder that persists a workout, its exercise links
//! and its sets.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{DataGateway, HttpTransport};
use services::{
    FileSessionPersistence, MemorySessionPersistence, SessionPersistence, SessionStore,
    StorageUrls,
};
use std::sync::Arc;

/// Shared client state, built once at startup.
pub struct AppState {
    pub config: Config,
    pub gateway: DataGateway,
    pub session: SessionStore,
    pub storage: StorageUrls,
}

impl AppState {
    /// Wire the HTTP transport, gateway and session store from `config`.
    pub fn from_config(config: Config) -> error::Result<Self> {
        let transport = HttpTransport::new(
            config.backend_url.clone(),
            config.anon_key.clone(),
            config.request_timeout,
        )?;
        let gateway = DataGateway::new(Arc::new(transport), config.request_timeout);

        let persistence: Arc<dyn SessionPersistence> = match &config.session_file {
            Some(path) => Arc::new(FileSessionPersistence::new(path.clone())),
            None => Arc::new(MemorySessionPersistence::new()),
        };

        Ok(Self {
            session: SessionStore::new(gateway.clone(), persistence),
            storage: StorageUrls::new(config.storage_base_url.clone()),
            gateway,
            config,
        })
    }
}
