//! Authenticated API client.
//!
//! DESIGN
//! ======
//! `ApiClient` composes the executor and the refresh coordinator. Each call is
//! one logical request with at most two exchanges: the initial one and, after
//! a 401 that the coordinator recovers from, exactly one replay. A 401 on the
//! replay is returned to the caller as-is.

use std::sync::Arc;

use serde::Serialize;

use crate::config::ClientConfig;
use crate::envelope::Envelope;
use crate::error::ClientError;
use crate::executor::{Attempt, Executor, RequestOptions};
use crate::navigation::Navigator;
use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::session::{SessionState, SessionStore};
use crate::transport::{ReqwestTransport, Transport};

#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    executor: Arc<Executor>,
    coordinator: RefreshCoordinator,
    session: Arc<SessionState>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Build a client over `reqwest`, hydrating the session from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        let session = Arc::new(SessionState::hydrate(store));
        Ok(Self::with_transport(config, transport, session, navigator))
    }

    /// Build a client over any transport with an existing session.
    #[must_use]
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let executor = Arc::new(Executor::new(&config, transport, Arc::clone(&session)));
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&executor),
            Arc::clone(&session),
            Arc::clone(&navigator),
            config.landing_route.clone(),
        );
        Self { config: Arc::new(config), executor, coordinator, session, navigator }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Execute a request, refreshing and replaying once on 401.
    ///
    /// # Errors
    ///
    /// Returns an error only for malformed calls (see [`Executor::execute`]).
    pub async fn execute(&self, endpoint: &str, options: RequestOptions) -> Result<Envelope, ClientError> {
        let first = self
            .executor
            .send_once(endpoint, &options, Attempt::Initial)
            .await?;

        if !first.envelope.is_unauthorized() || !options.refresh_eligible() {
            return Ok(first.envelope);
        }
        // Nothing to refresh: the request went out without a token.
        let Some(used_token) = first.token.as_deref() else {
            return Ok(first.envelope);
        };

        match self.coordinator.recover(Some(used_token)).await {
            RefreshOutcome::Refreshed(_) => {
                let replay = self
                    .executor
                    .send_once(endpoint, &options, Attempt::Replay)
                    .await?;
                if replay.envelope.is_unauthorized() {
                    tracing::warn!(%endpoint, "replay rejected after refresh; not retrying");
                }
                Ok(replay.envelope)
            }
            RefreshOutcome::Failed(_) => Ok(first.envelope),
        }
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn get(&self, endpoint: &str) -> Result<Envelope, ClientError> {
        self.execute(endpoint, RequestOptions::get()).await
    }

    /// # Errors
    ///
    /// Returns an error for malformed calls or a body that cannot be encoded.
    pub async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Envelope, ClientError> {
        self.execute(endpoint, RequestOptions::post().body(serde_json::to_value(body)?))
            .await
    }

    /// # Errors
    ///
    /// Returns an error for malformed calls or a body that cannot be encoded.
    pub async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Envelope, ClientError> {
        self.execute(endpoint, RequestOptions::put().body(serde_json::to_value(body)?))
            .await
    }

    /// # Errors
    ///
    /// Returns an error for malformed calls or a body that cannot be encoded.
    pub async fn patch<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Envelope, ClientError> {
        self.execute(endpoint, RequestOptions::patch().body(serde_json::to_value(body)?))
            .await
    }

    /// # Errors
    ///
    /// Returns an error only for malformed calls.
    pub async fn delete(&self, endpoint: &str) -> Result<Envelope, ClientError> {
        self.execute(endpoint, RequestOptions::delete()).await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
