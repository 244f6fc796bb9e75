//! The authenticated request pipeline.
//!
//! Two stages wrap whatever transport actually sends requests:
//!
//! - `AttachCredential` adds `Authorization: Bearer <token>` from the session
//!   unless the request already carries an authorization header
//! - `DetectAuthFailure` watches failed responses and ends the session when
//!   one looks like an authentication failure, then hands the error back
//!   unchanged
//!
//! Entity clients never see tokens; they only talk to a `Transport`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::request::{ApiRequest, ApiResponse};
use super::transport::Transport;
use super::ApiError;
use crate::auth::{LogoutReason, SessionManager};

pub struct AttachCredential<T> {
    inner: T,
    session: Arc<SessionManager>,
}

impl<T: Transport> AttachCredential<T> {
    pub fn new(inner: T, session: Arc<SessionManager>) -> Self {
        Self { inner, session }
    }
}

#[async_trait]
impl<T: Transport> Transport for AttachCredential<T> {
    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if !request.has_authorization() {
            if let Some(token) = self.session.current_token() {
                if let Err(e) = request.set_bearer(&token) {
                    warn!(error = %e, "Stored token cannot be sent, continuing without it");
                }
            }
        }
        self.inner.send(request).await
    }
}

pub struct DetectAuthFailure<T> {
    inner: T,
    session: Arc<SessionManager>,
}

impl<T: Transport> DetectAuthFailure<T> {
    pub fn new(inner: T, session: Arc<SessionManager>) -> Self {
        Self { inner, session }
    }
}

#[async_trait]
impl<T: Transport> Transport for DetectAuthFailure<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let method = request.method.clone();
        let path = request.path.clone();
        match self.inner.send(request).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_auth_failure() => {
                warn!(%method, %path, error = %e, "Authentication failure, ending session");
                self.session.logout(LogoutReason::AuthFailure);
                Err(e)
            }
            Err(e) => {
                debug!(%method, %path, error = %e, "Request failed");
                Err(e)
            }
        }
    }
}

/// The full pipeline around `transport`
pub type Authenticated<T> = DetectAuthFailure<AttachCredential<T>>;

pub fn authenticated<T: Transport>(transport: T, session: Arc<SessionManager>) -> Authenticated<T> {
    DetectAuthFailure::new(AttachCredential::new(transport, session.clone()), session)
}
