// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider client and the session store built on it.
//!
//! Handles:
//! - Password sign-in and sign-up
//! - Sign-out (remote revoke, local state always cleared)
//! - Session restore on cold start, refreshing expired access tokens
//! - Token rotation on the shared data gateway

use crate::db::transport::{RestRequest, RestResponse};
use crate::db::DataGateway;
use crate::error::{AppError, AuthError, DecodingError, NetworkError, Result};
use crate::models::{Profile, User};
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use validator::Validate;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Identity provider client.
#[derive(Clone)]
pub struct AuthClient {
    gateway: DataGateway,
}

impl AuthClient {
    /// Share the gateway's transport and timeout.
    pub fn new(gateway: DataGateway) -> Self {
        Self { gateway }
    }

    /// Exchange email and password for a session.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let request = RestRequest::new(Method::POST, "auth/v1/token")
            .query_param("grant_type", "password")
            .json(serde_json::json!({ "email": email, "password": password }));

        self.send_json(request, AuthError::SignInFailed).await
    }

    /// Register a new account.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &UserMetadata,
    ) -> Result<AuthResponse> {
        let request = RestRequest::new(Method::POST, "auth/v1/signup").json(serde_json::json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));

        self.send_json(request, AuthError::SignUpFailed).await
    }

    /// Exchange a refresh token for a new session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse> {
        let request = RestRequest::new(Method::POST, "auth/v1/token")
            .query_param("grant_type", "refresh_token")
            .json(serde_json::json!({ "refresh_token": refresh_token }));

        self.send_json(request, AuthError::SessionExpired).await
    }

    /// Revoke the session identified by `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let request =
            RestRequest::new(Method::POST, "auth/v1/logout").bearer(Some(access_token.to_string()));
        self.send(request, AuthError::Unauthorized).await?;
        tracing::info!("Remote session revoked");
        Ok(())
    }

    async fn send_json(&self, request: RestRequest, rejected: AuthError) -> Result<AuthResponse> {
        let response = self.send(request, rejected).await?;
        serde_json::from_slice(&response.body).map_err(|e| DecodingError::from_json(&e).into())
    }

    async fn send(&self, request: RestRequest, rejected: AuthError) -> Result<RestResponse> {
        let transport = self.gateway.transport()?;

        let response = tokio::time::timeout(self.gateway.timeout(), transport.send(request))
            .await
            .map_err(|_| NetworkError::Timeout)??;

        if response.is_success() {
            return Ok(response);
        }

        let status = response.status;
        let body = response.text();

        match status {
            400 | 422 => Err(rejected.into()),
            401 | 403 => Err(AuthError::Unauthorized.into()),
            408 | 429 | 500..=599 => {
                tracing::warn!(status, "Identity provider returned retryable status");
                Err(NetworkError::Status { status, body }.into())
            }
            _ => Err(AuthError::Unknown(format!("HTTP {}: {}", status, body)).into()),
        }
    }
}

/// Profile fields attached to the account at sign-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Account as returned by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    fn into_user(self, fallback_email: &str) -> User {
        User {
            id: self.id,
            email: self.email.unwrap_or_else(|| fallback_email.to_string()),
            first_name: self.user_metadata.first_name,
            last_name: self.user_metadata.last_name,
            avatar_url: self.user_metadata.avatar_url,
        }
    }
}

/// Token pair issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
}

/// Sign-in, sign-up and refresh response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: AuthUser,
    /// Absent when sign-up awaits email confirmation
    #[serde(default)]
    pub session: Option<AuthSession>,
}

#[derive(Deserialize)]
struct AccessClaims {
    exp: i64,
}

/// Read the `exp` claim of an access token without verifying its signature.
///
/// The token is only inspected to decide whether to refresh; the backend
/// verifies it on every request.
pub fn access_token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = jsonwebtoken::Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<AccessClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(&[]),
        &validation,
    )
    .ok()?;
    DateTime::from_timestamp(data.claims.exp, 0)
}

fn token_is_fresh(token: &str, now: DateTime<Utc>) -> bool {
    access_token_expiry(token)
        .is_some_and(|exp| now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < exp)
}

// ─────────────────────────────────────────────────────────────────────────────
// Session persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Session saved between launches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Where the session survives between launches.
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> Result<Option<StoredSession>>;
    fn save(&self, session: &StoredSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps the session for the lifetime of the process only.
#[derive(Default)]
pub struct MemorySessionPersistence {
    inner: std::sync::Mutex<Option<StoredSession>>,
}

impl MemorySessionPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: StoredSession) -> Self {
        Self {
            inner: std::sync::Mutex::new(Some(session)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<StoredSession>>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Storage("session lock poisoned".to_string()))
    }
}

impl SessionPersistence for MemorySessionPersistence {
    fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        *self.lock()? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// Stores the session as a JSON file.
pub struct FileSessionPersistence {
    path: PathBuf,
}

impl FileSessionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionPersistence for FileSessionPersistence {
    fn load(&self) -> Result<Option<StoredSession>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Storage(e.to_string())),
        };
        match serde_json::from_slice(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let raw = serde_json::to_vec(session)
            .map_err(|e| AppError::Storage(format!("Failed to encode session: {}", e)))?;
        std::fs::write(&self.path, raw).map_err(|e| AppError::Storage(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionStore - authenticated identity and token lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub current_user: Option<User>,
    pub is_authenticated: bool,
}

#[derive(Default)]
struct SessionState {
    current_user: Option<User>,
    tokens: Option<AuthSession>,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_user: self.current_user.clone(),
            is_authenticated: self.tokens.is_some(),
        }
    }
}

#[derive(Debug, Validate)]
struct Credentials {
    #[validate(email)]
    email: String,
    #[validate(length(min = 6))]
    password: String,
}

impl Credentials {
    /// Malformed credentials fail as `rejected` without reaching the backend.
    fn checked(email: &str, password: &str, rejected: AuthError) -> Result<Self> {
        let credentials = Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        if let Err(e) = credentials.validate() {
            tracing::info!(error = %e, "Credentials rejected locally");
            return Err(rejected.into());
        }
        Ok(credentials)
    }
}

/// Holds the authenticated user and keeps the gateway's token current.
///
/// Every operation holds the state lock from start to finish, so sign-in,
/// sign-up, sign-out, restore and refresh never interleave on one store.
pub struct SessionStore {
    auth: AuthClient,
    gateway: DataGateway,
    persistence: Arc<dyn SessionPersistence>,
    state: Mutex<SessionState>,
    events: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    pub fn new(gateway: DataGateway, persistence: Arc<dyn SessionPersistence>) -> Self {
        let (events, _) = watch::channel(SessionSnapshot::default());
        Self {
            auth: AuthClient::new(gateway.clone()),
            gateway,
            persistence,
            state: Mutex::new(SessionState::default()),
            events,
        }
    }

    /// Receive a snapshot after every sign-in, sign-out, restore and refresh.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.lock().await.current_user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.tokens.is_some()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .tokens
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    /// Sign in with email and password. State is unchanged on failure.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let credentials = Credentials::checked(email, password, AuthError::SignInFailed)?;
        let mut state = self.state.lock().await;

        let response = self
            .auth
            .sign_in_with_password(&credentials.email, &credentials.password)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign in failed"))?;

        let session = response
            .session
            .ok_or_else(|| AuthError::Unknown("sign in returned no session".to_string()))?;
        let user = response.user.into_user(&credentials.email);

        self.establish(&mut state, user.clone(), session).await;
        tracing::info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    /// Create an account, then create its profile on a best-effort basis.
    ///
    /// When the provider withholds the session (email confirmation pending)
    /// the user is returned but the store stays signed out.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User> {
        let credentials = Credentials::checked(email, password, AuthError::SignUpFailed)?;
        let mut state = self.state.lock().await;

        let metadata = UserMetadata {
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            avatar_url: None,
        };
        let response = self
            .auth
            .sign_up(&credentials.email, &credentials.password, &metadata)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign up failed"))?;

        let user = response.user.into_user(&credentials.email);

        match response.session {
            Some(session) => self.establish(&mut state, user.clone(), session).await,
            None => tracing::info!(user_id = %user.id, "Sign up pending email confirmation"),
        }

        let profile = Profile::new(user.id.clone(), user.email.clone(), first_name, last_name);
        if let Err(e) = self.gateway.create_profile(&profile).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to create profile, continuing anyway");
        }

        tracing::info!(user_id = %user.id, "Signed up");
        Ok(user)
    }

    /// Revoke the remote session and clear local state.
    ///
    /// Local state is cleared even when the remote call fails; that error is
    /// returned afterwards.
    pub async fn sign_out(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        let remote = match state.tokens.as_ref() {
            Some(tokens) => self.auth.sign_out(&tokens.access_token).await,
            None => Ok(()),
        };
        if let Err(e) = &remote {
            tracing::warn!(error = %e, "Remote sign out failed, clearing local session anyway");
        }

        let cleared = self.reset(&mut state).await;
        tracing::info!("Signed out");

        remote?;
        cleared
    }

    /// Restore a persisted session on cold start.
    ///
    /// A still-valid access token is used as is, without a network call; an
    /// expired one is refreshed. A session that cannot be refreshed is
    /// cleared and reported as [`AuthError::SessionExpired`].
    pub async fn check_session(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        let Some(stored) = self.persistence.load()? else {
            tracing::debug!("No persisted session");
            return Ok(());
        };

        if token_is_fresh(&stored.access_token, Utc::now()) {
            let session = AuthSession {
                access_token: stored.access_token,
                refresh_token: stored.refresh_token,
            };
            tracing::info!(user_id = %stored.user.id, "Restored persisted session");
            self.establish(&mut state, stored.user, session).await;
            return Ok(());
        }

        tracing::info!(user_id = %stored.user.id, "Access token expired, refreshing");
        let fallback_email = stored.user.email.clone();
        self.refresh_locked(&mut state, &stored.refresh_token, &fallback_email)
            .await
    }

    /// Rotate the access token using the current refresh token.
    pub async fn refresh_session(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        let refresh_token = state
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .ok_or(AuthError::Unauthorized)?;
        let fallback_email = state
            .current_user
            .as_ref()
            .map(|u| u.email.clone())
            .unwrap_or_default();

        self.refresh_locked(&mut state, &refresh_token, &fallback_email)
            .await
    }

    async fn refresh_locked(
        &self,
        state: &mut SessionState,
        refresh_token: &str,
        fallback_email: &str,
    ) -> Result<()> {
        match self.auth.refresh(refresh_token).await {
            Ok(AuthResponse {
                user,
                session: Some(session),
            }) => {
                let user = user.into_user(fallback_email);
                tracing::info!(user_id = %user.id, "Session refreshed");
                self.establish(state, user, session).await;
                Ok(())
            }
            // Keep the stored session so the refresh can be retried
            Err(AppError::Network(e)) => Err(e.into()),
            Ok(_) | Err(_) => {
                tracing::warn!("Session could not be refreshed, clearing it");
                if let Err(e) = self.reset(state).await {
                    tracing::warn!(error = %e, "Failed to clear persisted session");
                }
                Err(AuthError::SessionExpired.into())
            }
        }
    }

    async fn establish(&self, state: &mut SessionState, user: User, session: AuthSession) {
        self.gateway
            .set_access_token(Some(session.access_token.clone()))
            .await;

        let stored = StoredSession {
            user: user.clone(),
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        };
        if let Err(e) = self.persistence.save(&stored) {
            tracing::warn!(error = %e, "Failed to persist session");
        }

        state.current_user = Some(user);
        state.tokens = Some(session);
        self.events.send_replace(state.snapshot());
    }

    async fn reset(&self, state: &mut SessionState) -> Result<()> {
        *state = SessionState::default();
        self.gateway.set_access_token(None).await;
        self.events.send_replace(state.snapshot());
        self.persistence.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_exp(exp: i64) -> String {
        let claims = serde_json::json!({ "sub": "user-1", "exp": exp, "aud": "authenticated" });
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_access_token_expiry_reads_exp() {
        let exp = Utc::now().timestamp() + 3600;
        let token = token_with_exp(exp);
        assert_eq!(access_token_expiry(&token).unwrap().timestamp(), exp);
    }

    #[test]
    fn test_token_freshness_uses_margin() {
        let now = Utc::now();
        assert!(token_is_fresh(&token_with_exp(now.timestamp() + 3600), now));
        assert!(!token_is_fresh(&token_with_exp(now.timestamp() + 60), now));
        assert!(!token_is_fresh("not-a-jwt", now));
    }

    #[test]
    fn test_credentials_validation() {
        assert!(Credentials::checked(" user@example.com ", "secret1", AuthError::SignInFailed).is_ok());
        assert!(matches!(
            Credentials::checked("not-an-email", "secret1", AuthError::SignInFailed),
            Err(AppError::Auth(AuthError::SignInFailed))
        ));
        assert!(matches!(
            Credentials::checked("user@example.com", "123", AuthError::SignUpFailed),
            Err(AppError::Auth(AuthError::SignUpFailed))
        ));
    }
}
