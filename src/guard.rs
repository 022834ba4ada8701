//! Route guard for pages that require a signed-in member.

use std::sync::Arc;

use crate::auth::AuthService;
use crate::navigation::LOGIN_ROUTE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Not signed in; the user was sent to this route.
    Redirect(String),
}

pub struct RouteGuard {
    auth: Arc<AuthService>,
    redirect_to: String,
}

impl RouteGuard {
    /// Guard redirecting to the login page.
    #[must_use]
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self::with_redirect(auth, LOGIN_ROUTE)
    }

    #[must_use]
    pub fn with_redirect(auth: Arc<AuthService>, redirect_to: impl Into<String>) -> Self {
        Self { auth, redirect_to: redirect_to.into() }
    }

    /// Wait for the startup auth-check, then decide. Never decides while the
    /// session is still loading.
    pub async fn check(&self) -> GuardDecision {
        self.auth.check_auth_status().await;
        if self.auth.snapshot().is_authenticated {
            return GuardDecision::Allow;
        }
        tracing::debug!(route = %self.redirect_to, "guard redirect");
        self.auth.client().navigator().navigate(&self.redirect_to);
        GuardDecision::Redirect(self.redirect_to.clone())
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
