use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "careerhub_session";

/// Idle time after which a session is dropped.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 24 * 60;

/// Contact details remembered after a single application, reused by multi-apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub username: String,
    pub skill: Option<String>,
    pub user_details: Option<UserDetails>,
    /// Refreshed on every authenticated request.
    pub last_seen: DateTime<Utc>,
}

/// In-memory sessions keyed by the random token in the session cookie.
/// Sessions do not survive a restart, and expire after `ttl` without use.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionData>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Starts a session, dropping any that have expired meanwhile.
    pub async fn create(&self, username: &str) -> Uuid {
        let token = Uuid::new_v4();
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, data| !self.is_expired(data, now));
        if sessions.len() < before {
            debug!("Evicted {} expired session(s)", before - sessions.len());
        }

        sessions.insert(
            token,
            SessionData {
                username: username.to_string(),
                skill: None,
                user_details: None,
                last_seen: now,
            },
        );
        token
    }

    /// The live session for `token`, refreshing its idle timer.
    /// An expired session is removed and reported as absent.
    pub async fn get(&self, token: Uuid) -> Option<SessionData> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let data = sessions.get_mut(&token)?;
        if self.is_expired(data, now) {
            sessions.remove(&token);
            debug!("Session expired");
            return None;
        }
        data.last_seen = now;
        Some(data.clone())
    }

    /// Applies `f` to a live session. Returns false if the session is gone.
    pub async fn update<F>(&self, token: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut SessionData),
    {
        match self.sessions.write().await.get_mut(&token) {
            Some(data) => {
                f(data);
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, token: Uuid) -> Option<SessionData> {
        self.sessions.write().await.remove(&token)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn is_expired(&self, data: &SessionData, now: DateTime<Utc>) -> bool {
        now - data.last_seen > self.ttl
    }
}

pub fn session_cookie(token: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn session_token(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Extractor for handlers that require a logged-in user. Rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: Uuid,
    pub data: SessionData,
}

impl CurrentSession {
    pub fn username(&self) -> &str {
        &self.data.username
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar).ok_or_else(AppError::login_required)?;
        let data = state
            .sessions
            .get(token)
            .await
            .ok_or_else(AppError::login_required)?;
        Ok(CurrentSession { token, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = SessionStore::default();
        let token = store.create("alice").await;
        assert_eq!(store.get(token).await.unwrap().username, "alice");

        assert!(store.update(token, |s| s.skill = Some("rust".into())).await);
        assert_eq!(store.get(token).await.unwrap().skill.as_deref(), Some("rust"));

        assert!(store.remove(token).await.is_some());
        assert!(store.get(token).await.is_none());
        assert!(!store.update(token, |s| s.skill = None).await);
    }

    #[tokio::test]
    async fn test_idle_session_expires_and_is_evicted() {
        let store = SessionStore::new(Duration::minutes(30));
        let stale = store.create("alice").await;
        assert!(store.update(stale, |s| s.last_seen -= Duration::minutes(31)).await);

        assert!(store.get(stale).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_create_sweeps_expired_sessions() {
        let store = SessionStore::new(Duration::minutes(30));
        let stale = store.create("alice").await;
        let fresh = store.create("bob").await;
        store.update(stale, |s| s.last_seen -= Duration::hours(1)).await;

        store.create("carol").await;
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get(fresh).await.unwrap().username, "bob");
    }

    #[test]
    fn test_cookie_round_trip() {
        let token = Uuid::new_v4();
        let jar = CookieJar::new().add(session_cookie(token));
        assert_eq!(session_token(&jar), Some(token));
        assert!(session_cookie(token).http_only().unwrap_or(false));
    }
}
