//! Error types for LTI launch operations.
//!
//! Every failure in the login/launch flow is a typed value carrying an
//! audit code plus the structured metadata needed to log it (issuer,
//! client id, registration id, claim name). Failures are terminal for the
//! request that produced them; nothing here is retried internally.

use crate::ids::{LaunchId, RegistrationId};
use thiserror::Error;

/// Result type for LTI operations.
pub type LtiResult<T> = Result<T, LtiError>;

/// Launch error taxonomy.
///
/// One variant per failure point in the initiator and validator pipelines.
/// [`LtiError::code`] returns the stable audit-log code for each variant.
#[derive(Debug, Clone, Error)]
pub enum LtiError {
    // OIDC login initiation
    #[error("Missing required login parameter: {parameter}")]
    MissingLoginParameters { parameter: &'static str },

    #[error("Registration not found{}", issuer.as_ref().map(|i| format!(" for issuer {i}")).unwrap_or_default())]
    NoRegistration {
        /// Known when the lookup was issuer-scoped; absent when a stored
        /// registration id no longer resolves.
        issuer: Option<String>,
        client_id: Option<String>,
    },

    #[error("Issuer {issuer} resolves to {candidates} registrations; client_id required")]
    AmbiguousRegistration { issuer: String, candidates: usize },

    #[error("Client {client_id} is not registered for issuer {issuer}")]
    ClientNotRegistered { issuer: String, client_id: String },

    // Launch request extraction
    #[error("Missing state parameter")]
    MissingState,

    #[error("Missing id_token parameter")]
    MissingIdToken,

    #[error("Invalid id_token: {message}")]
    InvalidIdToken { message: String },

    // Anti-replay state
    #[error("Login state not found (never issued, already consumed, or storage lost it)")]
    StateNotFound,

    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Login data expired at {expired_at}")]
    ExpiredLoginData { expired_at: i64 },

    // Signature verification
    #[error("id_token header carries no kid")]
    NoKid,

    #[error("No public key matching kid {kid}")]
    NoMatchingPublicKey { kid: String },

    #[error("Algorithm {alg} is not allowed")]
    InvalidAlg { alg: String },

    #[error("Algorithm {alg} does not match key type {kty}")]
    MismatchedAlgKey { alg: String, kty: String },

    #[error("Invalid id_token signature")]
    InvalidSignature,

    #[error("Unable to fetch public key from {jwks_url}: {message}")]
    UnableToFetchPublicKey { jwks_url: String, message: String },

    // Nonce
    #[error("id_token carries no nonce")]
    MissingNonce,

    #[error("Nonce does not match the login session")]
    InvalidNonce,

    // Deployment
    #[error("id_token carries no deployment_id claim")]
    MissingDeploymentId,

    #[error("Deployment {deployment_id} is not configured for registration {registration_id}")]
    NoDeployment {
        deployment_id: String,
        registration_id: RegistrationId,
    },

    // Message validation
    #[error("id_token carries no message_type claim")]
    InvalidMessageType,

    #[error("Unrecognized message_type: {message_type}")]
    UnrecognizedMessageType { message_type: String },

    #[error("Invalid message: claim {claim}: {message}")]
    InvalidMessage {
        claim: &'static str,
        message: String,
    },

    // Fetch layer
    #[error("Failed to fetch JWKS from {jwks_url}: {message}")]
    JwksFetchFailed { jwks_url: String, message: String },

    #[error("Failed to fetch OIDC configuration from {url}: {message}")]
    OidcConfigFetchFailed { url: String, message: String },

    // Launch resumption
    #[error("No cached launch for {launch_id}")]
    LaunchNotFound { launch_id: LaunchId },

    // Infrastructure (not a protocol verdict)
    #[error("Store error: {message}")]
    Store { message: String },
}

impl LtiError {
    /// Stable audit-log code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingLoginParameters { .. } => "MISSING_LOGIN_PARAMETERS",
            Self::NoRegistration { .. } | Self::AmbiguousRegistration { .. } => "NO_REGISTRATION",
            Self::ClientNotRegistered { .. } => "CLIENT_NOT_REGISTERED",
            Self::MissingState => "MISSING_STATE",
            Self::MissingIdToken => "MISSING_ID_TOKEN",
            Self::InvalidIdToken { .. } => "INVALID_ID_TOKEN",
            Self::StateNotFound => "STATE_NOT_FOUND",
            Self::InvalidState => "INVALID_STATE",
            Self::ExpiredLoginData { .. } => "EXPIRED_LOGIN_DATA",
            Self::NoKid => "NO_KID",
            Self::NoMatchingPublicKey { .. } => "NO_MATCHING_PUBLIC_KEY",
            Self::InvalidAlg { .. } => "INVALID_ALG",
            Self::MismatchedAlgKey { .. } => "MISMATCHED_ALG_KEY",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::UnableToFetchPublicKey { .. } => "UNABLE_TO_FETCH_PUBLIC_KEY",
            Self::MissingNonce => "MISSING_NONCE",
            Self::InvalidNonce => "INVALID_NONCE",
            Self::MissingDeploymentId => "MISSING_DEPLOYMENT_ID",
            Self::NoDeployment { .. } => "NO_DEPLOYMENT",
            Self::InvalidMessageType => "INVALID_MESSAGE_TYPE",
            Self::UnrecognizedMessageType { .. } => "UNRECOGNIZED_MESSAGE_TYPE",
            Self::InvalidMessage { .. } => "INVALID_MESSAGE",
            Self::JwksFetchFailed { .. } => "FAILED_TO_FETCH_JWKS",
            Self::OidcConfigFetchFailed { .. } => "FAILED_TO_FETCH_OIDC_CONFIG",
            Self::LaunchNotFound { .. } => "LAUNCH_NOT_FOUND",
            Self::Store { .. } => "STORE_ERROR",
        }
    }

    /// True when the launch should be re-initiated from the platform
    /// (consumed or expired anti-replay state).
    #[must_use]
    pub fn is_replay(&self) -> bool {
        matches!(self, Self::StateNotFound | Self::ExpiredLoginData { .. })
    }

    /// True when the failure concerns the id_token itself (format,
    /// signature, or claim contents).
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdToken { .. }
                | Self::NoKid
                | Self::NoMatchingPublicKey { .. }
                | Self::InvalidAlg { .. }
                | Self::MismatchedAlgKey { .. }
                | Self::InvalidSignature
                | Self::MissingNonce
                | Self::InvalidNonce
                | Self::InvalidMessageType
                | Self::UnrecognizedMessageType { .. }
                | Self::InvalidMessage { .. }
        )
    }

    /// Wrap a store backend failure.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
