//! Scripted backend and navigator shared by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::navigation::Navigator;
use crate::session::{Member, SessionState};
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

pub const TEST_BASE_URL: &str = "http://api.test";
pub const LOGIN_PASSWORD: &str = "pw";
pub const LOGIN_TOKEN: &str = "login-token";

/// One request as the backend saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub bearer: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// In-memory backend.
///
/// - `/member/reissue` rotates to the scripted token, or answers 401.
/// - `/member/login` accepts any login id with password `pw`.
/// - `/member/logout` and `/public/*` never check the token.
/// - `/status/<code>` answers `<code>` for a valid token.
/// - canned paths answer their fixed response.
/// - everything else answers 401 unless the bearer token is the valid one.
#[derive(Default)]
pub struct FakeBackend {
    valid_token: Mutex<Option<String>>,
    reissue_token: Mutex<Option<String>>,
    reissue_delay: Duration,
    profile_status: Mutex<Option<u16>>,
    always_unauthorized: Vec<String>,
    slow: Vec<(String, Duration)>,
    network_down: Vec<String>,
    canned: Vec<(String, u16, Value)>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid_token(self, token: &str) -> Self {
        *lock(&self.valid_token) = Some(token.to_owned());
        self
    }

    pub fn reissues_to(self, token: &str) -> Self {
        *lock(&self.reissue_token) = Some(token.to_owned());
        self
    }

    pub fn reissue_delay(mut self, delay: Duration) -> Self {
        self.reissue_delay = delay;
        self
    }

    pub fn profile_status(self, status: u16) -> Self {
        *lock(&self.profile_status) = Some(status);
        self
    }

    pub fn always_unauthorized(mut self, path: &str) -> Self {
        self.always_unauthorized.push(path.to_owned());
        self
    }

    pub fn slow(mut self, path: &str, delay: Duration) -> Self {
        self.slow.push((path.to_owned(), delay));
        self
    }

    pub fn network_down(mut self, path: &str) -> Self {
        self.network_down.push(path.to_owned());
        self
    }

    /// Answer `path` with a fixed response regardless of the token.
    pub fn canned(mut self, path: &str, status: u16, body: Value) -> Self {
        self.canned.push((path.to_owned(), status, body));
        self
    }

    pub fn set_profile_status(&self, status: Option<u16>) {
        *lock(&self.profile_status) = status;
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|call| call.path == path).collect()
    }

    pub fn reissue_count(&self) -> usize {
        self.calls_to("/member/reissue").len()
    }

    fn authorized(&self, bearer: Option<&str>) -> bool {
        let valid = lock(&self.valid_token);
        valid.is_some() && valid.as_deref() == bearer
    }
}

#[async_trait::async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = request.url.path().to_owned();
        let bearer = request.bearer_token().map(ToOwned::to_owned);
        lock(&self.calls).push(Call {
            method: request.method.clone(),
            path: path.clone(),
            query: request.url.query().map(ToOwned::to_owned),
            bearer: bearer.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        });

        if let Some((_, delay)) = self.slow.iter().find(|(slow, _)| *slow == path) {
            tokio::time::sleep(*delay).await;
        }
        if self.network_down.contains(&path) {
            return Err(TransportError::Network("connection refused".to_owned()));
        }
        if let Some((_, status, body)) = self.canned.iter().find(|(canned, _, _)| *canned == path) {
            return Ok(respond(*status, body));
        }
        if self.always_unauthorized.contains(&path) {
            return Ok(respond(401, &json!({ "error": "Unauthorized" })));
        }

        match path.as_str() {
            "/member/reissue" => {
                tokio::time::sleep(self.reissue_delay).await;
                let next = lock(&self.reissue_token).clone();
                match next {
                    Some(token) => {
                        *lock(&self.valid_token) = Some(token.clone());
                        Ok(respond(200, &json!({ "data": { "accessToken": token } })))
                    }
                    None => Ok(respond(401, &json!({ "error": "refresh token expired" }))),
                }
            }
            "/member/logout" => Ok(respond(200, &json!({ "message": "logged out" }))),
            "/member/login" => {
                let body = request.body.unwrap_or(Value::Null);
                if body.get("password").and_then(Value::as_str) != Some(LOGIN_PASSWORD) {
                    return Ok(respond(401, &json!({ "error": "invalid credentials" })));
                }
                let login_id = body.get("loginId").and_then(Value::as_str).unwrap_or_default();
                *lock(&self.valid_token) = Some(LOGIN_TOKEN.to_owned());
                Ok(respond(
                    200,
                    &json!({
                        "data": {
                            "accessToken": LOGIN_TOKEN,
                            "member": { "loginId": login_id, "name": "Kim" }
                        },
                        "message": "welcome"
                    }),
                ))
            }
            public if public.starts_with("/public") => Ok(respond(200, &json!({ "data": { "path": public } }))),
            _ if !self.authorized(bearer.as_deref()) => Ok(respond(401, &json!({ "error": "token expired" }))),
            "/member/profile" => {
                let status = *lock(&self.profile_status);
                match status {
                    Some(status) => Ok(respond(status, &json!({ "error": "profile service down" }))),
                    None => Ok(respond(200, &json!({ "data": member_json("kim") }))),
                }
            }
            status if status.starts_with("/status/") => {
                let code = status.trim_start_matches("/status/").parse().unwrap_or(500);
                Ok(respond(code, &json!({ "error": "boom" })))
            }
            other => Ok(respond(200, &json!({ "data": { "path": other, "token": bearer } }))),
        }
    }
}

fn respond(status: u16, body: &Value) -> HttpResponse {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default()
        .to_owned();
    HttpResponse { status, reason, body: body.to_string() }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub fn member_json(login_id: &str) -> Value {
    json!({ "loginId": login_id, "name": "Kim", "email": "kim@example.com" })
}

pub fn test_member(login_id: &str) -> Member {
    Member { login_id: login_id.to_owned(), name: "Kim".to_owned(), email: None, phone: None }
}

/// Navigator that remembers every route it was asked for.
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        lock(&self.routes).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        lock(&self.routes).push(route.to_owned());
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::with_base_url(TEST_BASE_URL).expect("test base url is valid")
}

/// Session holding `token`, marked authenticated.
pub fn signed_in_session(token: &str) -> Arc<SessionState> {
    let session = SessionState::in_memory();
    session.login(token.to_owned(), test_member("kim"));
    session.set_loading(true);
    Arc::new(session)
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub navigator: Arc<RecordingNavigator>,
    pub client: ApiClient,
}

impl Harness {
    pub fn new(backend: FakeBackend, session: Arc<SessionState>) -> Self {
        Self::with_config(backend, session, test_config())
    }

    pub fn with_config(backend: FakeBackend, session: Arc<SessionState>, config: ClientConfig) -> Self {
        let backend = Arc::new(backend);
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::with_transport(
            config,
            Arc::clone(&backend) as Arc<dyn Transport>,
            session,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );
        Self { backend, navigator, client }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        self.client.session()
    }
}
