//! Admin sessions and the guard middleware for admin routes

use super::error::ApiError;
use super::AppState;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::RngCore;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

/// Name of the admin session cookie
pub const SESSION_COOKIE: &str = "photobooth_session";

const TOKEN_BYTES: usize = 32;

/// In-memory admin sessions keyed by bearer token
#[derive(Debug)]
pub struct SessionStore {
    password: Option<String>,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Instant>>,
}

impl SessionStore {
    /// Create a store; with no password every login is refused
    #[must_use]
    pub fn new(password: Option<String>, ttl: Duration) -> Self {
        Self {
            password,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check `candidate` and open a session on success
    ///
    /// # Errors
    /// - `Unauthorized` for a wrong password or when admin login is disabled
    pub fn login(&self, candidate: &str) -> Result<String, ApiError> {
        let Some(password) = self.password.as_deref() else {
            tracing::warn!("Admin login attempted but no admin password is configured");
            return Err(ApiError::Unauthorized);
        };
        if !bool::from(password.as_bytes().ct_eq(candidate.as_bytes())) {
            tracing::warn!("Rejected admin login");
            return Err(ApiError::Unauthorized);
        }

        let token = generate_token();
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ApiError::Internal("session lock poisoned".into()))?;
        let now = Instant::now();
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), now + self.ttl);
        tracing::info!(active_sessions = sessions.len(), "Admin session opened");
        Ok(token)
    }

    /// Whether `token` names a live session
    #[must_use]
    pub fn validate(&self, token: &str) -> bool {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(token).copied())
            .is_some_and(|expires| expires > Instant::now())
    }

    /// Revoke `token`; unknown tokens are ignored
    pub fn logout(&self, token: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(token);
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(TOKEN_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Session token from `Authorization: Bearer` or the session cookie
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value opening a session
#[must_use]
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        ttl.as_secs()
    )
}

/// `Set-Cookie` value clearing the session
#[must_use]
pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

/// Require a live admin session
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match require_admin_inner(&state, req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_admin_inner(
    state: &AppState,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    if !state.sessions.validate(&token) {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}
