use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::request::{ApiRequest, RequestBody};
use super::transport::Transport;
use crate::models::{Credentials, LoginResponse, Registration};

pub const REGISTER_PATH: &str = "/api/accounts/register/";
pub const LOGIN_PATH: &str = "/api/accounts/login/";
pub const LOGOUT_PATH: &str = "/api/accounts/logout/";

/// Account endpoints. Register and login are anonymous entry points.
#[derive(Clone)]
pub struct AuthApi {
    transport: Arc<dyn Transport>,
}

impl AuthApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Exchange email and password for an access token
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let body = serde_json::to_value(credentials).context("Failed to encode credentials")?;
        let response = self
            .transport
            .send(ApiRequest::post(LOGIN_PATH).with_body(RequestBody::Json(body)))
            .await
            .context("Failed to send login request")?;
        response.json().context("Failed to parse login response")
    }

    /// Create an administrator account; always sent as multipart
    pub async fn register(&self, registration: &Registration) -> Result<Value> {
        let payload = registration
            .to_payload()
            .context("Failed to encode registration")?;
        let response = self
            .transport
            .send(ApiRequest::post(REGISTER_PATH).with_body(payload.into_multipart()))
            .await
            .context("Failed to send registration")?;
        if response.body.is_empty() {
            return Ok(Value::Null);
        }
        response.json().context("Failed to parse registration response")
    }

    /// Invalidate the current token on the server
    pub async fn logout(&self) -> Result<()> {
        self.transport
            .send(ApiRequest::post(LOGOUT_PATH).with_body(RequestBody::Json(json!({}))))
            .await
            .context("Failed to send logout request")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::pipeline::testing::RecordingTransport;
    use crate::api::Attachment;

    #[tokio::test]
    async fn test_login_posts_json_credentials() {
        let transport = RecordingTransport::new();
        transport.respond(200, r#"{"access":"a.b.c","refresh":"r.r.r"}"#);
        let auth = AuthApi::new(Arc::new(transport.clone()));

        let response = auth
            .login(&Credentials {
                email: "admin@example.org".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.access, "a.b.c");
        let request = transport.last_request();
        assert_eq!(request.path, LOGIN_PATH);
        assert_eq!(
            request.body,
            RequestBody::Json(json!({"email": "admin@example.org", "password": "secret"}))
        );
    }

    #[tokio::test]
    async fn test_register_is_multipart_with_optional_picture() {
        let transport = RecordingTransport::new();
        transport.respond(201, r#"{"email":"new@example.org"}"#);
        transport.respond(201, "");
        let auth = AuthApi::new(Arc::new(transport.clone()));

        let mut registration = Registration {
            email: "new@example.org".to_string(),
            first_name: "Ngozi".to_string(),
            last_name: "Eze".to_string(),
            phone_number: "0800".to_string(),
            password: "pw".to_string(),
            password2: "pw".to_string(),
            profile_picture: None,
        };
        auth.register(&registration).await.unwrap();
        let body = transport.last_request().body;
        assert!(body.is_multipart());
        assert_eq!(body.form_text("first_name"), Some("Ngozi"));
        assert!(body.form_file("profile_picture").is_none());

        registration.profile_picture = Some(Attachment::new("me.png", vec![7]));
        assert_eq!(auth.register(&registration).await.unwrap(), Value::Null);
        let body = transport.last_request().body;
        assert_eq!(body.form_file("profile_picture").unwrap().bytes, vec![7]);
        assert_eq!(body.form_text("password2"), Some("pw"));
    }
}
