//! trellis launch engine
//!
//! Implements the LTI 1.3 launch protocol for the tool side: the OIDC
//! third-party-initiated login ([`OidcLoginInitiator`]) and the launch
//! validation pipeline ([`LaunchValidator`]) that turns an inbound signed
//! id_token plus stored anti-replay state into a trusted [`LaunchContext`].
//!
//! The engine is transport-agnostic: a hosting web application extracts
//! the login/launch parameters from its framework of choice, calls
//! [`OidcLoginInitiator::initiate`] / [`LaunchValidator::validate`], and
//! renders the redirect or the launch result. Registration lookup and
//! storage are supplied through the `trellis-core` collaborator traits;
//! in-memory implementations suitable for tests and single-process hosts
//! live in [`memory`].

pub mod context;
pub mod discovery;
pub mod jwks;
pub mod login;
pub mod memory;
pub mod token;
pub mod validate;

pub use context::{
    AgsAccessor, DeepLinkAccessor, GroupsAccessor, LaunchContext, LaunchMessage, NrpsAccessor,
};
pub use discovery::PlatformDiscovery;
pub use jwks::JwksCache;
pub use login::{LoginConfig, LoginRedirect, LoginRequest, OidcLoginInitiator};
pub use token::{RawIdToken, TokenVerifier};
pub use validate::{LaunchRequest, LaunchValidator, ValidatorConfig};
