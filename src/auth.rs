//! Auth façade: login, logout, profile loading and the startup auth-check.
//!
//! SYSTEM CONTEXT
//! ==============
//! Pages and forms call into [`AuthService`] and read [`AuthSnapshot`]; the
//! route guard awaits [`AuthService::check_auth_status`] before rendering.
//!
//! DESIGN
//! ======
//! The startup check runs once per service. Concurrent and repeated callers
//! share the first run through a `OnceCell`. It never navigates: only login
//! and (forced) logout move the user.

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::api::endpoints::member;
use crate::client::ApiClient;
use crate::envelope::Envelope;
use crate::error::ClientError;
use crate::executor::RequestOptions;
use crate::refresh::{FailurePolicy, RefreshOutcome};
use crate::session::Member;

/// Sign-in form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub login_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    access_token: Option<String>,
    #[serde(alias = "user")]
    member: Option<Member>,
}

/// Where the startup auth-check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Authenticated,
    /// Token accepted but the profile service answered 5xx; no member loaded.
    Degraded,
    Unauthenticated,
}

/// What consumers may read of the session. Never exposes the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub member: Option<Member>,
}

pub struct AuthService {
    client: ApiClient,
    startup: OnceCell<AuthStatus>,
}

impl AuthService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client, startup: OnceCell::new() }
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        let session = self.client.session().snapshot();
        AuthSnapshot { is_authenticated: session.is_authenticated, is_loading: session.is_loading, member: session.member }
    }

    /// Sign in. On a well-formed success the session is populated and the
    /// user is sent to the landing route; any other envelope is returned
    /// untouched for display.
    ///
    /// # Errors
    ///
    /// Returns an error only if the credentials cannot be encoded.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Envelope, ClientError> {
        let options = RequestOptions::post()
            .body(serde_json::to_value(credentials)?)
            .skip_auth_attach();
        let envelope = self.client.execute(member::LOGIN, options).await?;
        if !envelope.success {
            tracing::info!(status = ?envelope.status, "login rejected");
            return Ok(envelope);
        }

        let payload = envelope
            .data
            .clone()
            .and_then(|data| serde_json::from_value::<LoginPayload>(data).ok());
        match payload {
            Some(LoginPayload { access_token: Some(token), member: Some(member) }) => {
                tracing::info!(login_id = %member.login_id, "logged in");
                self.client.session().login(token, member);
                self.client
                    .navigator()
                    .navigate(&self.client.config().landing_route);
            }
            _ => tracing::warn!("login response missing member or access token"),
        }
        Ok(envelope)
    }

    /// Best-effort remote logout, local clear, navigation.
    pub async fn logout(&self) {
        self.client.coordinator().force_logout().await;
    }

    /// Fetch the profile through the normal refresh path and store it.
    ///
    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn load_profile(&self) -> Result<Envelope<Member>, ClientError> {
        let envelope = self.fetch_profile(RequestOptions::get()).await?;
        if let Some(member) = envelope.data.clone() {
            let session = self.client.session();
            session.set_member(Some(member));
            session.set_authenticated(true);
        }
        Ok(envelope)
    }

    /// Reissue the access token, then reload the profile.
    ///
    /// A rejected reissue leaves the session as it was, unless a request
    /// that hit a 401 joined the same reissue; then logout is forced.
    ///
    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn refresh_auth(&self) -> Result<Envelope<Member>, ClientError> {
        match self.client.coordinator().refresh(FailurePolicy::Passive).await {
            RefreshOutcome::Refreshed(_) => self.load_profile().await,
            RefreshOutcome::Failed(envelope) => Ok(envelope.decode()),
        }
    }

    /// Resolve the session at startup. Runs at most once; later and
    /// concurrent callers get the first run's result.
    pub async fn check_auth_status(&self) -> AuthStatus {
        *self
            .startup
            .get_or_init(|| self.run_startup_check())
            .await
    }

    async fn run_startup_check(&self) -> AuthStatus {
        let session = self.client.session();
        let status = if session.access_token().is_none() && !session.is_authenticated() {
            AuthStatus::Unauthenticated
        } else {
            self.verify_stored_session().await
        };
        session.set_loading(false);
        tracing::info!(?status, "startup auth check finished");
        status
    }

    async fn verify_stored_session(&self) -> AuthStatus {
        let session = self.client.session();

        if let Some(member) = self.probe_profile().await.data {
            session.set_member(Some(member));
            session.set_authenticated(true);
            return AuthStatus::Authenticated;
        }

        if let RefreshOutcome::Failed(_) = self.client.coordinator().refresh(FailurePolicy::Passive).await {
            session.clear_auth();
            return AuthStatus::Unauthenticated;
        }

        let retry = self.probe_profile().await;
        if let Some(member) = retry.data {
            session.set_member(Some(member));
            session.set_authenticated(true);
            AuthStatus::Authenticated
        } else if retry.is_server_error() {
            tracing::warn!(status = ?retry.status, "profile unavailable after refresh; keeping session");
            session.set_member(None);
            session.set_authenticated(true);
            AuthStatus::Degraded
        } else {
            session.clear_auth();
            AuthStatus::Unauthenticated
        }
    }

    /// Profile fetch that bypasses the coordinator.
    async fn probe_profile(&self) -> Envelope<Member> {
        match self.fetch_profile(RequestOptions::get().skip_auth_refresh()).await {
            Ok(envelope) => envelope,
            Err(e) => Envelope::failure(e.to_string()),
        }
    }

    async fn fetch_profile(&self, options: RequestOptions) -> Result<Envelope<Member>, ClientError> {
        let envelope = self.client.execute(member::PROFILE, options).await?;
        Ok(envelope.decode::<Member>())
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
