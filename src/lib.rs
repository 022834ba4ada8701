//! Storefront API client.
//!
//! ARCHITECTURE
//! ============
//! ```text
//! AuthService / RouteGuard / api::*        consumers
//!        |
//!    ApiClient ---- RefreshCoordinator     one reissue per burst of 401s
//!        |                |
//!     Executor -----------+                one exchange -> Envelope
//!        |
//!    Transport (reqwest)  SessionState --> SessionStore
//! ```
//!
//! Every call resolves to an [`Envelope`]; `Err` is reserved for malformed
//! calls and construction failures.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod guard;
pub mod navigation;
pub mod refresh;
pub mod session;
pub mod transport;

#[cfg(test)]
pub mod test_helpers;

pub use auth::{AuthService, AuthSnapshot, AuthStatus, LoginRequest};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use envelope::Envelope;
pub use error::ClientError;
pub use executor::RequestOptions;
pub use guard::{GuardDecision, RouteGuard};
pub use navigation::{LogNavigator, Navigator};
pub use refresh::{FailurePolicy, RefreshCoordinator, RefreshOutcome};
pub use session::{FileSessionStore, Member, MemorySessionStore, SessionState, SessionStore};
