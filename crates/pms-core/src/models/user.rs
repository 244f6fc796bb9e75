use serde::{Deserialize, Serialize};

use crate::api::{Attachment, Payload};

/// Cached profile of the signed-in administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Sign-up form; always sent as multipart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub password: String,
    pub password2: String,
    #[serde(skip)]
    pub profile_picture: Option<Attachment>,
}

impl Registration {
    pub fn passwords_match(&self) -> bool {
        self.password == self.password2
    }

    pub fn to_payload(&self) -> Result<Payload, crate::api::ApiError> {
        Ok(Payload::from_record(self)?.attach("profile_picture", self.profile_picture.clone()))
    }
}
