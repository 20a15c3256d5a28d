use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::chat::ChatSession;

pub const SESSION_COOKIE: &str = "sqlchat_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// One-shot message shown above the chat after a form action.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }
}

/// Per-browser state: the chat session plus a pending notice.
pub struct BrowserSession {
    pub chat: ChatSession,
    pub notice: Option<Notice>,
}

pub type SessionHandle = Arc<Mutex<BrowserSession>>;

struct Slot {
    session: SessionHandle,
    last_seen: DateTime<Utc>,
}

/// Sessions keyed by the id stored in the session cookie. Idle sessions are
/// dropped, which also drops their database handle.
pub struct SessionStore {
    slots: Mutex<HashMap<String, Slot>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_minutes: i64) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            idle_timeout: Duration::minutes(idle_minutes),
        }
    }

    /// Returns the session named by the cookie, creating one (and setting the
    /// cookie) when it is missing or expired.
    pub async fn resolve<F>(&self, jar: CookieJar, new_session: F) -> (CookieJar, SessionHandle)
    where
        F: FnOnce() -> ChatSession,
    {
        let now = Utc::now();
        let mut slots = self.slots.lock().await;
        self.evict_idle(&mut slots, now);

        if let Some(id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
            if let Some(slot) = slots.get_mut(&id) {
                slot.last_seen = now;
                return (jar, Arc::clone(&slot.session));
            }
        }

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(BrowserSession {
            chat: new_session(),
            notice: None,
        }));
        slots.insert(
            id.clone(),
            Slot {
                session: Arc::clone(&session),
                last_seen: now,
            },
        );
        info!("Started session {}", id);

        let cookie = Cookie::build((SESSION_COOKIE, id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);

        (jar.add(cookie), session)
    }

    /// Tears down the cookie's session; returns the jar with the cookie removed.
    pub async fn end(&self, jar: CookieJar) -> (CookieJar, bool) {
        let Some(id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return (jar, false);
        };

        let removed = self.slots.lock().await.remove(&id).is_some();
        if removed {
            info!("Ended session {}", id);
        }

        (jar.remove(Cookie::build(SESSION_COOKIE).path("/")), removed)
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    fn evict_idle(&self, slots: &mut HashMap<String, Slot>, now: DateTime<Utc>) {
        slots.retain(|id, slot| {
            let keep = now - slot.last_seen < self.idle_timeout;
            if !keep {
                info!("Session {} expired", id);
            }
            keep
        });
    }
}
