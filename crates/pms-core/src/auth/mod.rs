//! Authentication module for managing the stored credential and its session.
//!
//! This module provides:
//! - `CredentialStore`: token and cached profile on top of a `KeyValueStore`
//! - `decode_claims`: unverified expiry lookup in a bearer token
//! - `SessionManager`: expiry timers, cross-tab logout and the logout action
//! - `Navigator`: the seam used to force the user back to the sign-in screen
//!
//! A session expires one second after the token's `exp` claim, when a request
//! fails authentication, or when another tab removes the token.

pub mod claims;
pub mod credentials;
pub mod navigation;
pub mod session;

pub use claims::{decode_claims, Claims};
pub use credentials::{CredentialStore, TOKEN_KEY, USER_KEY};
pub use navigation::{MemoryNavigator, Navigator, AUTH_PATH};
pub use session::{expiry_delay, LogoutReason, SessionEvent, SessionManager, SessionStatus};
