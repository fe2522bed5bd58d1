//! trellis core library
//!
//! Shared vocabulary for the trellis LTI 1.3 tool library.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (RegistrationId, LaunchId)
//! - [`error`] - The launch error taxonomy (LtiError)
//! - [`claims`] - LTI claim URIs, role vocabulary, and the id_token payload model
//! - [`jwks`] - JSON Web Key Set models
//! - [`model`] - Platform, Tool, Registration, and LoginSession value objects
//! - [`traits`] - Collaborator contracts (registration directory, stores, JWKS fetcher)

pub mod claims;
pub mod error;
pub mod ids;
pub mod jwks;
pub mod model;
pub mod traits;

// Re-export main types for convenient access
pub use claims::{IdTokenHeader, LtiClaims, MessageType};
pub use error::{LtiError, LtiResult};
pub use ids::{LaunchId, RegistrationId};
pub use jwks::{Jwk, JwkSet};
pub use model::{LoginSession, Platform, Registration, Tool, ToolKeyPair};
pub use traits::{
    CachedLaunch, JwksFetcher, LaunchCache, LoginSessionStore, RegistrationDirectory,
    RegistrationLookup,
};
