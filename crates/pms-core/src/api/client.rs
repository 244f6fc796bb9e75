//! API client for the pastoral records service.
//!
//! `ApiClient` bundles the authenticated pipeline with one `Resource` per
//! collection and the account endpoints, plus the few flows that touch both
//! the API and the session.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use super::auth::AuthApi;
use super::pipeline::authenticated;
use super::resource::Resource;
use super::transport::{ReqwestTransport, Transport};
use crate::auth::{LogoutReason, SessionManager, SessionStatus};
use crate::models::{Area, Credentials, Hierarchy, Parish, Pastor, PastorForm, UserProfile, Zone};

pub const PASTORS_PATH: &str = "/api/accounts/pastors/";
pub const ZONES_PATH: &str = "/api/accounts/zones/";
pub const AREAS_PATH: &str = "/api/accounts/areas/";
pub const PARISHES_PATH: &str = "/api/accounts/parishes/";

/// How an edit is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// PUT the whole record
    Replace,
    /// PATCH only what the form carries
    #[default]
    Partial,
}

/// Clone is cheap - the transport and session are shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Client for the API at `api_base`, authenticated through `session`
    pub fn new(api_base: &str, session: Arc<SessionManager>) -> Result<Self> {
        let transport = ReqwestTransport::new(api_base).context("Failed to build HTTP client")?;
        Ok(Self::with_transport(transport, session))
    }

    /// Wrap any transport in the authenticated pipeline
    pub fn with_transport<T: Transport + 'static>(transport: T, session: Arc<SessionManager>) -> Self {
        Self {
            transport: Arc::new(authenticated(transport, session.clone())),
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn pastors(&self) -> Resource<Pastor> {
        Resource::new(self.transport.clone(), PASTORS_PATH)
    }

    pub fn zones(&self) -> Resource<Zone> {
        Resource::new(self.transport.clone(), ZONES_PATH)
    }

    pub fn areas(&self) -> Resource<Area> {
        Resource::new(self.transport.clone(), AREAS_PATH)
    }

    pub fn parishes(&self) -> Resource<Parish> {
        Resource::new(self.transport.clone(), PARISHES_PATH)
    }

    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.transport.clone())
    }

    /// Log in and start a session with the issued token
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionStatus> {
        let response = self.auth().login(credentials).await?;
        let user = response.user.unwrap_or_else(|| UserProfile {
            email: credentials.email.clone(),
            ..Default::default()
        });
        let status = self.session.sign_in(&response.access, Some(&user));
        if status == SessionStatus::NoSession {
            bail!("Logged in, but the credential could not be saved");
        }
        info!(email = %credentials.email, status = ?status, "Login complete");
        Ok(status)
    }

    /// Tell the server to drop the token, then end the local session.
    /// Server errors are ignored; the local logout always happens.
    pub async fn sign_out(&self) {
        if let Err(e) = self.auth().logout().await {
            debug!(error = %e, "Server-side logout failed, clearing local session anyway");
        }
        self.session.logout(LogoutReason::UserRequested);
    }

    /// All pastors, narrowed to those whose name or title contains `term`.
    /// The list endpoint has no search parameter, so filtering is local.
    pub async fn search_pastors(&self, term: Option<&str>) -> Result<Vec<Pastor>> {
        let pastors = self.pastors().list().await?;
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(pastors);
        };
        let total = pastors.len();
        let matched: Vec<Pastor> = pastors.into_iter().filter(|p| p.matches(term)).collect();
        debug!(term, total, matched = matched.len(), "Filtered pastors");
        Ok(matched)
    }

    pub async fn create_pastor(&self, form: &PastorForm) -> Result<Pastor> {
        let payload = form.to_payload().context("Failed to build pastor payload")?;
        self.pastors().create(payload).await
    }

    pub async fn update_pastor(&self, id: i64, form: &PastorForm, mode: UpdateMode) -> Result<Pastor> {
        let payload = form.to_payload().context("Failed to build pastor payload")?;
        match mode {
            UpdateMode::Replace => self.pastors().replace(id, payload).await,
            UpdateMode::Partial => self.pastors().partial_update(id, payload).await,
        }
    }

    /// Fetch zones, areas and parishes concurrently
    pub async fn fetch_hierarchy(&self) -> Result<Hierarchy> {
        let zones = self.zones();
        let areas = self.areas();
        let parishes = self.parishes();
        let (zones, areas, parishes) =
            futures::try_join!(zones.list(), areas.list(), parishes.list())?;
        debug!(
            zones = zones.len(),
            areas = areas.len(),
            parishes = parishes.len(),
            "Hierarchy fetched"
        );
        Ok(Hierarchy {
            zones,
            areas,
            parishes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::pipeline::testing::RecordingTransport;
    use crate::api::{ApiError, Attachment};
    use crate::auth::claims::encode_token;
    use crate::auth::{CredentialStore, MemoryNavigator, Navigator};
    use crate::storage::file::STORAGE_FILE;
    use crate::storage::{FileStore, MemoryStore};
    use reqwest::{header, Method};
    use serde_json::{json, Value};

    fn client() -> (ApiClient, Arc<RecordingTransport>, Arc<MemoryNavigator>) {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        let navigator = Arc::new(MemoryNavigator::new("/dashboard"));
        let session = SessionManager::new(credentials, navigator.clone());
        let transport = RecordingTransport::new();
        (
            ApiClient::with_transport(transport.clone(), session),
            transport,
            navigator,
        )
    }

    fn fresh_token() -> String {
        encode_token(&json!({"sub": "1", "exp": chrono::Utc::now().timestamp() + 3600}))
    }

    #[tokio::test]
    async fn test_login_starts_session_and_authorizes_requests() {
        let (client, transport, _) = client();
        let token = fresh_token();
        transport.respond(200, &json!({"access": token}).to_string());
        transport.respond(200, "[]");

        let status = client
            .login(&Credentials {
                email: "admin@example.org".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(status, SessionStatus::Active { expires_at: Some(_) }));
        assert_eq!(client.session().user().unwrap().email, "admin@example.org");

        client.zones().list().await.unwrap();
        let expected = format!("Bearer {}", token);
        assert_eq!(
            transport.last_request().headers[header::AUTHORIZATION],
            expected.as_str()
        );
    }

    #[tokio::test]
    async fn test_login_fails_when_token_cannot_be_stored() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the storage file should be makes every write fail
        std::fs::create_dir(dir.path().join(STORAGE_FILE)).unwrap();
        let credentials = CredentialStore::new(Arc::new(FileStore::new(dir.path())));
        let session = SessionManager::new(credentials, Arc::new(MemoryNavigator::new("/auth")));
        let transport = RecordingTransport::new();
        let client = ApiClient::with_transport(transport.clone(), session);
        transport.respond(200, &json!({"access": fresh_token()}).to_string());

        let err = client
            .login(&Credentials {
                email: "admin@example.org".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("could not be saved"));
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_edit_with_photo_is_multipart() {
        let (client, transport, _) = client();
        client.session().sign_in(&fresh_token(), None);
        transport.respond(200, r#"{"id":3,"full_name":"Jane Doe"}"#);

        let form = PastorForm {
            full_name: "Jane Doe".to_string(),
            spouse: "John Doe".to_string(),
            anniversary: "2001-05-05".to_string(),
            children: "Ada\nBola".to_string(),
            photograph: Some(Attachment::new("jane.png", vec![1, 2]).with_mime_type("image/png")),
            ..Default::default()
        };
        let updated = client
            .update_pastor(3, &form, UpdateMode::Partial)
            .await
            .unwrap();
        assert_eq!(updated.id, Some(3));

        let request = transport.last_request();
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.path, "/api/accounts/pastors/3/");
        assert!(request.headers.get(header::CONTENT_TYPE).is_none());
        assert!(request.body.is_multipart());

        let family: Value = serde_json::from_str(request.body.form_text("family_info").unwrap()).unwrap();
        assert_eq!(
            family,
            json!({"spouse_name": "John Doe", "wedding_anniversary": "2001-05-05"})
        );
        let children: Value = serde_json::from_str(request.body.form_text("children").unwrap()).unwrap();
        assert_eq!(children, json!([{"name": "Ada"}, {"name": "Bola"}]));
        assert_eq!(request.body.form_file("photograph").unwrap().file_name, "jane.png");
    }

    #[tokio::test]
    async fn test_create_without_photo_is_json() {
        let (client, transport, _) = client();
        transport.respond(201, r#"{"id":8,"full_name":"New Pastor"}"#);

        let form = PastorForm {
            full_name: "New Pastor".to_string(),
            ..Default::default()
        };
        client.create_pastor(&form).await.unwrap();

        let request = transport.last_request();
        assert_eq!(request.method, Method::POST);
        assert!(!request.body.is_multipart());
    }

    #[tokio::test]
    async fn test_expired_token_error_forces_logout_and_reaches_caller() {
        let (client, transport, navigator) = client();
        client.session().sign_in(&fresh_token(), None);
        transport.respond(401, r#"{"code":"token_not_valid"}"#);

        let err = client.pastors().retrieve(1).await.unwrap_err();

        assert!(err
            .downcast_ref::<ApiError>()
            .map(ApiError::is_auth_failure)
            .unwrap_or(false));
        assert!(!client.session().is_authenticated());
        assert_eq!(navigator.current_path(), "/auth");
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_if_server_fails() {
        let (client, transport, navigator) = client();
        client.session().sign_in(&fresh_token(), None);
        transport.respond(500, "boom");

        client.sign_out().await;

        assert_eq!(transport.last_request().path, "/api/accounts/logout/");
        assert!(transport.last_request().has_authorization());
        assert!(!client.session().is_authenticated());
        assert_eq!(navigator.redirects(), vec!["/auth".to_string()]);
    }

    #[tokio::test]
    async fn test_search_filters_full_list_by_name_or_title() {
        let (client, transport, _) = client();
        let everyone = r#"[
            {"id":1,"full_name":"John Ade"},
            {"id":2,"full_name":"Mary Obi","professional_info":{"title":"Bishop"}}
        ]"#;
        transport.respond(200, everyone);
        transport.respond(200, everyone);
        transport.respond(200, everyone);

        let found = client.search_pastors(Some("  john ")).await.unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.full_name.as_str()).collect();
        assert_eq!(names, vec!["John Ade"]);
        assert!(transport.last_request().query.is_empty());

        let found = client.search_pastors(Some("BISHOP")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, Some(2));

        assert_eq!(client.search_pastors(Some("   ")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_hierarchy() {
        let (client, transport, _) = client();
        transport.respond(200, r#"[{"id":1,"name":"Zone A"}]"#);
        transport.respond(200, r#"{"results":[{"id":2,"name":"Area B","zone":1},{"id":3,"name":"Area C","zone":1}]}"#);
        transport.respond(200, r#"[]"#);

        let hierarchy = client.fetch_hierarchy().await.unwrap();
        assert_eq!(hierarchy.zones.len(), 1);
        assert_eq!(hierarchy.areas_in(1).count(), 2);
        assert!(hierarchy.parishes.is_empty());

        let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec![ZONES_PATH, AREAS_PATH, PARISHES_PATH]);
    }
}
