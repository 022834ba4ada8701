//! Refresh coordinator: one token reissue for any number of 401s.
//!
//! ARCHITECTURE
//! ============
//! Two phases, `Idle` and `Refreshing`, guarded by one mutex together with the
//! waiter list. The first caller that needs a refresh flips the phase, spawns
//! the reissue call on its own task and waits like everybody else. Callers
//! arriving while `Refreshing` push a oneshot sender and wait. When the
//! reissue settles, the task drains the list and flips back to `Idle` in one
//! critical section, then sends the same outcome to every waiter.
//!
//! The failure policy belongs to the refresh, not to whoever started it: a
//! 401 that joins a passive refresh upgrades it to `ForceLogout`. The reissue
//! also records the session epoch it started under; if the session was cleared
//! or replaced meanwhile, the new token is discarded and every waiter fails
//! without touching the session.
//!
//! TRADE-OFFS
//! ==========
//! The reissue runs on a spawned task, so cancelling or timing out any
//! individual request never cancels the shared refresh. A 401 on a request
//! sent with a token that has since been rotated skips the reissue and replays
//! with the current token; one arriving after the session was cleared fails
//! without another reissue.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::api::endpoints;
use crate::envelope::Envelope;
use crate::executor::{Executor, RequestOptions};
use crate::navigation::Navigator;
use crate::session::SessionState;

pub const REISSUE_ENDPOINT: &str = endpoints::member::REISSUE;
pub const LOGOUT_ENDPOINT: &str = endpoints::member::LOGOUT;

const SIGNED_OUT_MESSAGE: &str = "signed out";

/// What happens to the session when a reissue is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Remote logout, local clear, navigate to the landing route.
    ForceLogout,
    /// Leave the session alone; the caller decides.
    Passive,
}

/// Result shared by every waiter of one refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The new access token, already written to the session.
    Refreshed(String),
    /// The reissue failed; carries its envelope.
    Failed(Envelope),
}

impl RefreshOutcome {
    #[must_use]
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed(_))
    }
}

enum Phase {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
        policy: FailurePolicy,
    },
}

enum Trigger<'a> {
    /// A 401 on a request that carried `used_token`.
    Unauthorized { used_token: Option<&'a str> },
    Explicit,
}

struct Inner {
    executor: Arc<Executor>,
    session: Arc<SessionState>,
    navigator: Arc<dyn Navigator>,
    landing_route: String,
    phase: Mutex<Phase>,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(
        executor: Arc<Executor>,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
        landing_route: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                session,
                navigator,
                landing_route: landing_route.into(),
                phase: Mutex::new(Phase::Idle),
            }),
        }
    }

    /// True while a reissue call is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock_phase(), Phase::Refreshing { .. })
    }

    /// Recover from a 401 seen on a request sent with `used_token`.
    ///
    /// Joins the in-flight refresh if there is one. A rejected reissue forces
    /// logout before any waiter is released.
    pub async fn recover(&self, used_token: Option<&str>) -> RefreshOutcome {
        self.run(Trigger::Unauthorized { used_token }, FailurePolicy::ForceLogout)
            .await
    }

    /// Refresh on demand, joining the in-flight refresh if there is one.
    ///
    /// Joining with `ForceLogout` upgrades a passive refresh; joining with
    /// `Passive` never downgrades one.
    pub async fn refresh(&self, policy: FailurePolicy) -> RefreshOutcome {
        self.run(Trigger::Explicit, policy).await
    }

    /// Best-effort remote logout, then unconditional local clear and
    /// navigation to the landing route.
    pub async fn force_logout(&self) {
        force_logout(&self.inner).await;
    }

    async fn run(&self, trigger: Trigger<'_>, policy: FailurePolicy) -> RefreshOutcome {
        let receiver = {
            let mut phase = self.inner.lock_phase();
            let (sender, receiver) = oneshot::channel();
            match &mut *phase {
                Phase::Refreshing { waiters, policy: current } => {
                    waiters.push(sender);
                    if policy == FailurePolicy::ForceLogout {
                        *current = FailurePolicy::ForceLogout;
                    }
                    tracing::debug!(waiters = waiters.len(), policy = ?*current, "joined in-flight refresh");
                }
                Phase::Idle => {
                    if let Trigger::Unauthorized { used_token } = trigger {
                        match self.inner.session.access_token() {
                            Some(current) if used_token != Some(current.as_str()) => {
                                tracing::debug!("token rotated since request was sent; replaying");
                                return RefreshOutcome::Refreshed(current);
                            }
                            None => {
                                tracing::debug!("session cleared since request was sent; not refreshing");
                                return RefreshOutcome::Failed(Envelope::failure(SIGNED_OUT_MESSAGE));
                            }
                            Some(_) => {}
                        }
                    }
                    let epoch = self.inner.session.epoch();
                    *phase = Phase::Refreshing { waiters: vec![sender], policy };
                    tokio::spawn(reissue(Arc::clone(&self.inner), epoch));
                }
            }
            receiver
        };

        receiver
            .await
            .unwrap_or_else(|_| RefreshOutcome::Failed(Envelope::failure("refresh task ended without a result")))
    }
}

impl Inner {
    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn failure_policy(&self) -> FailurePolicy {
        match &*self.lock_phase() {
            Phase::Refreshing { policy, .. } => *policy,
            Phase::Idle => FailurePolicy::Passive,
        }
    }

    /// Flip back to `Idle` and hand `outcome` to every waiter.
    fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = match std::mem::replace(&mut *self.lock_phase(), Phase::Idle) {
            Phase::Refreshing { waiters, .. } => waiters,
            Phase::Idle => Vec::new(),
        };
        tracing::info!(waiters = waiters.len(), refreshed = outcome.is_refreshed(), "refresh settled");
        for waiter in waiters {
            // A waiter whose request was cancelled has dropped its receiver.
            let _ = waiter.send(outcome.clone());
        }
    }
}

async fn reissue(inner: Arc<Inner>, epoch: u64) {
    tracing::debug!("reissuing access token");
    let options = RequestOptions::post().skip_auth_attach();
    let outcome = match inner.executor.execute(REISSUE_ENDPOINT, &options).await {
        Ok(envelope) if envelope.success => match access_token_of(&envelope) {
            Some(token) if inner.session.replace_access_token(epoch, token.clone()) => RefreshOutcome::Refreshed(token),
            Some(_) => RefreshOutcome::Failed(Envelope::failure(SIGNED_OUT_MESSAGE)),
            None => {
                let mut missing = Envelope::failure("reissue response carried no access token");
                missing.status = envelope.status;
                RefreshOutcome::Failed(missing)
            }
        },
        Ok(envelope) => RefreshOutcome::Failed(envelope),
        Err(e) => RefreshOutcome::Failed(Envelope::failure(e.to_string())),
    };

    if let RefreshOutcome::Failed(envelope) = &outcome {
        let policy = inner.failure_policy();
        if inner.session.epoch() == epoch {
            tracing::warn!(status = ?envelope.status, error = envelope.error_message(), ?policy, "token reissue failed");
            if policy == FailurePolicy::ForceLogout {
                force_logout(&inner).await;
            }
        } else {
            tracing::info!("session changed during reissue; discarding result");
        }
    }

    inner.settle(&outcome);
}

async fn force_logout(inner: &Inner) {
    let options = RequestOptions::post().skip_auth_attach();
    match inner.executor.execute(LOGOUT_ENDPOINT, &options).await {
        Ok(envelope) if envelope.success => tracing::debug!("remote logout acknowledged"),
        Ok(envelope) => tracing::debug!(error = envelope.error_message(), "remote logout failed; ignoring"),
        Err(e) => tracing::debug!(error = %e, "remote logout failed; ignoring"),
    }
    inner.session.clear_auth();
    inner.navigator.navigate(&inner.landing_route);
    tracing::info!("session cleared");
}

fn access_token_of(envelope: &Envelope) -> Option<String> {
    let data = envelope.data.as_ref()?;
    data.get("accessToken")
        .or_else(|| data.get("access_token"))
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
