//! REST API client module for the pastoral records service.
//!
//! Requests flow through a `Transport` pipeline: `AttachCredential` adds the
//! stored bearer token, `DetectAuthFailure` ends the session when the server
//! rejects it, and `ReqwestTransport` does the HTTP. Entity clients
//! (`Resource<T>`, `AuthApi`) only build requests and parse replies.

pub mod auth;
pub mod client;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod request;
pub mod resource;
pub mod transport;

pub use auth::AuthApi;
pub use client::{ApiClient, UpdateMode};
pub use error::{ApiError, ErrorBody};
pub use payload::Payload;
pub use pipeline::{authenticated, AttachCredential, Authenticated, DetectAuthFailure};
pub use request::{ApiRequest, ApiResponse, Attachment, FormValue, RequestBody};
pub use resource::Resource;
pub use transport::{ReqwestTransport, Transport};
