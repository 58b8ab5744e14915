// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public object-storage URLs.

/// Builds `<storage_base>/<bucket>/<path>` asset URLs.
#[derive(Debug, Clone)]
pub struct StorageUrls {
    base_url: String,
}

impl StorageUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of `path` inside `bucket`. Each path segment is percent-encoded.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encoded.join("/")
        )
    }
}
