use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::claims::decode_claims;
use super::credentials::{CredentialStore, TOKEN_KEY};
use super::navigation::{Navigator, AUTH_PATH};
use crate::models::UserProfile;

/// Grace period after the token's own expiry before logging out.
const EXPIRY_BUFFER_MS: i64 = 1000;

/// Longest delay a single expiry timer may wait (2^31 - 1 ms, ~24.8 days).
/// Longer-lived tokens are logged out at this ceiling instead of at expiry.
pub const MAX_TIMER_DELAY_MS: i64 = (1 << 31) - 1;

/// Buffered session events per subscriber
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    Expired,
    AuthFailure,
    ExternalSignOut,
    UserRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { expires_at: Option<DateTime<Utc>> },
    LoggedOut { reason: LogoutReason },
}

/// Public view of the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NoSession,
    /// `expires_at` is `None` when the token's claims could not be read
    Active { expires_at: Option<DateTime<Utc>> },
    Expired,
}

enum SessionState {
    NoSession,
    Active {
        expires_at: Option<DateTime<Utc>>,
        // Superseded timers are left to run out; they re-check the stored token
        _timer: Option<JoinHandle<()>>,
    },
    Expired,
}

/// Delay before the expiry timer for a token should fire.
///
/// Returns `None` when the token has already expired.
pub fn expiry_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    if expires_at <= now {
        return None;
    }
    let remaining_ms = (expires_at - now)
        .num_milliseconds()
        .saturating_add(EXPIRY_BUFFER_MS);
    Some(Duration::from_millis(remaining_ms.min(MAX_TIMER_DELAY_MS) as u64))
}

/// Owns the lifecycle of the stored credential.
///
/// Constructed once per process and shared by `Arc` with everything that
/// issues HTTP calls. Timers and the cross-tab listener run on the ambient
/// tokio runtime.
pub struct SessionManager {
    credentials: CredentialStore,
    navigator: Arc<dyn Navigator>,
    auth_path: String,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(credentials: CredentialStore, navigator: Arc<dyn Navigator>) -> Arc<Self> {
        Self::with_auth_path(credentials, navigator, AUTH_PATH)
    }

    pub fn with_auth_path(
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
        auth_path: &str,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            credentials,
            navigator,
            auth_path: auth_path.to_string(),
            state: Mutex::new(SessionState::NoSession),
            events,
        })
    }

    /// Load the stored credential at process start and arm its expiry.
    pub fn initialize(self: &Arc<Self>) -> SessionStatus {
        self.initialize_at(Utc::now())
    }

    pub fn initialize_at(self: &Arc<Self>, now: DateTime<Utc>) -> SessionStatus {
        match self.credentials.load() {
            Some(token) => self.activate(token, now),
            None => {
                debug!("No stored credential at startup");
                self.set_state(SessionState::NoSession);
                SessionStatus::NoSession
            }
        }
    }

    /// Persist a freshly issued token and schedule its expiry.
    ///
    /// Returns `NoSession` when the token could not be stored; requests would
    /// otherwise go out without it.
    pub fn sign_in(self: &Arc<Self>, token: &str, user: Option<&UserProfile>) -> SessionStatus {
        if !self.credentials.save(token, user) {
            warn!("Sign-in not persisted, staying signed out");
            self.set_state(SessionState::NoSession);
            return SessionStatus::NoSession;
        }
        let status = self.activate(token.to_string(), Utc::now());
        if let SessionStatus::Active { expires_at } = status {
            info!(expires_at = ?expires_at, "Signed in");
            let _ = self.events.send(SessionEvent::SignedIn { expires_at });
        }
        status
    }

    fn activate(self: &Arc<Self>, token: String, now: DateTime<Utc>) -> SessionStatus {
        let Some(claims) = decode_claims(&token) else {
            warn!("Token claims unreadable, keeping session without expiry enforcement");
            self.set_state(SessionState::Active {
                expires_at: None,
                _timer: None,
            });
            return SessionStatus::Active { expires_at: None };
        };

        match expiry_delay(claims.expires_at, now) {
            None => {
                info!(expired_at = %claims.expires_at, "Stored token already expired");
                self.logout(LogoutReason::Expired);
                SessionStatus::Expired
            }
            Some(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "Scheduling session expiry");
                let timer = self.schedule_expiry(token, delay);
                self.set_state(SessionState::Active {
                    expires_at: Some(claims.expires_at),
                    _timer: Some(timer),
                });
                SessionStatus::Active {
                    expires_at: Some(claims.expires_at),
                }
            }
        }
    }

    fn schedule_expiry(self: &Arc<Self>, token: String, delay: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = manager.upgrade() {
                manager.on_expiry_timer(&token);
            }
        })
    }

    fn on_expiry_timer(&self, token: &str) {
        if self.credentials.load().as_deref() == Some(token) {
            info!("Session token expired");
            self.logout(LogoutReason::Expired);
        } else {
            debug!("Expiry timer superseded by a newer credential");
        }
    }

    /// End the session: clear the credential and force a full navigation to
    /// the authentication screen. Safe to call any number of times.
    pub fn logout(&self, reason: LogoutReason) {
        self.credentials.clear();
        self.set_state(match reason {
            LogoutReason::Expired => SessionState::Expired,
            _ => SessionState::NoSession,
        });

        let current = self.navigator.current_path();
        if current != self.auth_path {
            info!(reason = ?reason, from = %current, "Logging out");
            self.navigator.hard_redirect(&self.auth_path);
        } else {
            debug!(reason = ?reason, "Logout while already on the authentication screen");
        }

        let _ = self.events.send(SessionEvent::LoggedOut { reason });
    }

    /// Follow token removals made by other handles of the same storage.
    ///
    /// Returns `None` when the storage backend cannot observe other handles;
    /// the session then behaves as a single tab.
    pub fn watch_external_changes(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut changes = self.credentials.subscribe()?;
        let manager = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            while let Some(event) = changes.next().await {
                let Some(manager) = manager.upgrade() else {
                    debug!("Session manager dropped, stopping storage listener");
                    break;
                };
                if event.key != TOKEN_KEY || event.new_value.is_some() {
                    continue;
                }
                info!("Token removed in another tab");
                manager.logout(LogoutReason::ExternalSignOut);
            }
        }))
    }

    /// Bearer token to attach to outgoing requests
    pub fn current_token(&self) -> Option<String> {
        self.credentials.load()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.credentials.user()
    }

    pub fn status(&self) -> SessionStatus {
        match self.state.lock() {
            Ok(state) => match &*state {
                SessionState::NoSession => SessionStatus::NoSession,
                SessionState::Active { expires_at, .. } => SessionStatus::Active {
                    expires_at: *expires_at,
                },
                SessionState::Expired => SessionStatus::Expired,
            },
            Err(_) => SessionStatus::NoSession,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn auth_path(&self) -> &str {
        &self.auth_path
    }

    fn set_state(&self, next: SessionState) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(_) => warn!("Session state lock poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::encode_token;
    use crate::auth::navigation::MemoryNavigator;
    use crate::storage::{FileStore, KeyValueStore, MemoryStore, SharedStorage, StoreError};
    use serde_json::json;

    const NOW_SECS: i64 = 1_700_000_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW_SECS, 0).unwrap()
    }

    fn token_expiring_at(exp_secs: i64, sub: &str) -> String {
        encode_token(&json!({"sub": sub, "exp": exp_secs}))
    }

    fn token_valid_for_an_hour(sub: &str) -> String {
        token_expiring_at(Utc::now().timestamp() + 3600, sub)
    }

    fn manager_with(
        store: Arc<dyn KeyValueStore>,
    ) -> (Arc<SessionManager>, Arc<MemoryNavigator>, CredentialStore) {
        let credentials = CredentialStore::new(store);
        let navigator = Arc::new(MemoryNavigator::new("/dashboard"));
        let manager = SessionManager::new(credentials.clone(), navigator.clone());
        (manager, navigator, credentials)
    }

    fn logouts(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<LogoutReason> {
        let mut reasons = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::LoggedOut { reason } = event {
                reasons.push(reason);
            }
        }
        reasons
    }

    #[test]
    fn test_expiry_delay() {
        let now = now();
        assert_eq!(expiry_delay(now - chrono::Duration::seconds(5), now), None);
        assert_eq!(expiry_delay(now, now), None);
        assert_eq!(
            expiry_delay(now + chrono::Duration::milliseconds(2000), now),
            Some(Duration::from_millis(3000))
        );
        assert_eq!(
            expiry_delay(now + chrono::Duration::days(90), now),
            Some(Duration::from_millis(MAX_TIMER_DELAY_MS as u64))
        );
    }

    #[tokio::test]
    async fn test_no_credential_at_startup() {
        let (manager, navigator, _) = manager_with(Arc::new(MemoryStore::new()));
        assert_eq!(manager.initialize_at(now()), SessionStatus::NoSession);
        assert!(navigator.redirects().is_empty());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_credential_logs_out_at_startup() {
        let (manager, navigator, credentials) = manager_with(Arc::new(MemoryStore::new()));
        credentials.save(&token_expiring_at(NOW_SECS - 5, "1"), None);
        let mut events = manager.subscribe();

        assert_eq!(manager.initialize_at(now()), SessionStatus::Expired);

        assert_eq!(credentials.load(), None);
        assert_eq!(navigator.redirects(), vec!["/auth".to_string()]);
        assert_eq!(logouts(&mut events), vec![LogoutReason::Expired]);
        assert_eq!(manager.status(), SessionStatus::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_after_buffer() {
        let (manager, navigator, credentials) = manager_with(Arc::new(MemoryStore::new()));
        credentials.save(&token_expiring_at(NOW_SECS + 2, "1"), None);
        let mut events = manager.subscribe();

        let status = manager.initialize_at(now());
        assert!(matches!(status, SessionStatus::Active { expires_at: Some(_) }));

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(credentials.load().is_some());
        assert!(navigator.redirects().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(credentials.load(), None);
        assert_eq!(navigator.redirects(), vec!["/auth".to_string()]);
        assert_eq!(logouts(&mut events), vec![LogoutReason::Expired]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(logouts(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_leaves_newer_credential_alone() {
        let (manager, navigator, credentials) = manager_with(Arc::new(MemoryStore::new()));
        credentials.save(&token_expiring_at(NOW_SECS + 2, "a"), None);
        manager.initialize_at(now());

        // Credential B replaces A before A's timer fires
        let token_b = token_valid_for_an_hour("b");
        manager.sign_in(&token_b, None);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(credentials.load().as_deref(), Some(token_b.as_str()));
        assert!(navigator.redirects().is_empty());
        assert!(matches!(manager.status(), SessionStatus::Active { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_after_direct_store_replacement() {
        let (manager, navigator, credentials) = manager_with(Arc::new(MemoryStore::new()));
        credentials.save(&token_expiring_at(NOW_SECS + 2, "a"), None);
        manager.initialize_at(now());

        credentials.save("replacement-token", None);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(credentials.load().as_deref(), Some("replacement-token"));
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (manager, navigator, credentials) = manager_with(Arc::new(MemoryStore::new()));
        manager.sign_in(&token_valid_for_an_hour("1"), None);

        manager.logout(LogoutReason::UserRequested);
        manager.logout(LogoutReason::AuthFailure);
        manager.logout(LogoutReason::AuthFailure);

        assert_eq!(credentials.load(), None);
        assert_eq!(navigator.current_path(), "/auth");
        assert_eq!(navigator.redirects(), vec!["/auth".to_string()]);
        assert_eq!(manager.status(), SessionStatus::NoSession);
    }

    #[tokio::test]
    async fn test_logout_on_auth_screen_does_not_redirect() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        let navigator = Arc::new(MemoryNavigator::new("/auth"));
        let manager = SessionManager::new(credentials, navigator.clone());

        manager.logout(LogoutReason::AuthFailure);
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_claims_stay_signed_in() {
        let (manager, navigator, credentials) = manager_with(Arc::new(MemoryStore::new()));
        credentials.save("opaque-session-token", None);

        assert_eq!(
            manager.initialize_at(now()),
            SessionStatus::Active { expires_at: None }
        );
        assert!(manager.is_authenticated());
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_publishes_event_and_stores_profile() {
        let (manager, _, _) = manager_with(Arc::new(MemoryStore::new()));
        let mut events = manager.subscribe();
        let user = UserProfile {
            email: "admin@example.org".to_string(),
            ..Default::default()
        };

        manager.sign_in(&token_valid_for_an_hour("1"), Some(&user));

        assert!(matches!(
            events.try_recv(),
            Ok(SessionEvent::SignedIn { expires_at: Some(_) })
        ));
        assert_eq!(manager.user().unwrap().email, "admin@example.org");
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_removal_logs_out_once() {
        let origin = SharedStorage::new();
        let this_tab = Arc::new(origin.open());
        let other_tab = origin.open();

        let (manager, navigator, credentials) = manager_with(this_tab);
        manager.sign_in(&token_valid_for_an_hour("1"), None);
        let watcher = manager.watch_external_changes().expect("memory storage broadcasts");
        let mut events = manager.subscribe();

        // A new value in another tab is not a logout
        other_tab.set(TOKEN_KEY, &token_valid_for_an_hour("2")).unwrap();
        other_tab.remove_all(&[TOKEN_KEY, "user"]).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("logout event")
            .unwrap();
        assert_eq!(
            event,
            SessionEvent::LoggedOut {
                reason: LogoutReason::ExternalSignOut
            }
        );
        assert!(
            tokio::time::timeout(Duration::from_secs(1), events.recv())
                .await
                .is_err()
        );
        assert_eq!(credentials.load(), None);
        assert_eq!(navigator.redirects(), vec!["/auth".to_string()]);

        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_stops_once_manager_is_dropped() {
        let origin = SharedStorage::new();
        let other_tab = origin.open();
        let (manager, _, _) = manager_with(Arc::new(origin.open()));
        let watcher = manager.watch_external_changes().unwrap();

        drop(manager);
        // Any change wakes the listener, not only a token removal
        other_tab.set("theme", "dark").unwrap();

        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("listener exits")
            .unwrap();
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sign_in_that_cannot_be_stored_stays_signed_out() {
        let (manager, navigator, _) = manager_with(Arc::new(ReadOnlyStore));
        let mut events = manager.subscribe();

        let status = manager.sign_in(&token_valid_for_an_hour("1"), None);

        assert_eq!(status, SessionStatus::NoSession);
        assert_eq!(manager.status(), SessionStatus::NoSession);
        assert!(!manager.is_authenticated());
        assert!(events.try_recv().is_err());
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_recovers_corrupt_storage_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(store.path(), r#"{"token": "a.b"#).unwrap();
        let (manager, _, credentials) = manager_with(Arc::new(store));

        assert_eq!(manager.initialize_at(now()), SessionStatus::NoSession);

        let token = token_valid_for_an_hour("1");
        let status = manager.sign_in(&token, None);
        assert!(matches!(status, SessionStatus::Active { expires_at: Some(_) }));
        assert_eq!(credentials.load(), Some(token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_removal_is_not_an_external_signal() {
        let origin = SharedStorage::new();
        let (manager, _, _) = manager_with(Arc::new(origin.open()));
        manager.sign_in(&token_valid_for_an_hour("1"), None);
        let _watcher = manager.watch_external_changes().unwrap();
        let mut events = manager.subscribe();

        manager.logout(LogoutReason::UserRequested);

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::LoggedOut {
                reason: LogoutReason::UserRequested
            }
        );
        assert!(
            tokio::time::timeout(Duration::from_secs(1), events.recv())
                .await
                .is_err()
        );
    }
}
