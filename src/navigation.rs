//! Navigation primitive used after login and forced logout.
//!
//! The client never renders anything itself; it asks the host application to
//! move the user to a route.

pub const HOME_ROUTE: &str = "/";
pub const LOGIN_ROUTE: &str = "/login";

/// Host-provided route change.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Navigator for headless hosts: records the route change in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) {
        tracing::info!(%route, "navigate");
    }
}
