//! Configuration-time value objects.
//!
//! Platforms, tools, and registrations are immutable once constructed;
//! every field is resolved at construction time. The launch engine never
//! mutates them.

use crate::ids::RegistrationId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A learning platform (the issuer side of a registration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    /// Issuer URL, compared verbatim against the id_token `iss` claim.
    pub issuer: String,
    /// OIDC authentication endpoint the login redirect targets.
    pub authentication_url: String,
    /// OAuth2 token endpoint (used by service clients, not by the launch).
    pub access_token_url: String,
    /// JWKS endpoint publishing the platform's signing keys.
    pub jwks_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The tool side of a registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Default launch URL (target of the authentication redirect).
    pub launch_url: String,
    /// Third-party-initiated login URL registered with the platform.
    pub initiation_url: String,
    /// JWKS endpoint publishing the tool's own keys.
    pub jwks_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_linking_url: Option<String>,
}

/// Tool-owned key material attached to a registration, used to sign
/// tool-originating messages (deep-linking responses, service token
/// requests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolKeyPair {
    pub kid: String,
    pub public_key_pem: String,
    pub private_key_pem: String,
}

/// The trust relationship between one platform and one tool.
///
/// Invariants: `(platform.issuer, client_id)` identifies at most one
/// active registration, and `deployment_ids` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub client_id: String,
    pub platform: Platform,
    pub tool: Tool,
    pub deployment_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_keys: Option<ToolKeyPair>,
    pub is_active: bool,
}

impl Registration {
    #[must_use]
    pub fn has_deployment_id(&self, deployment_id: &str) -> bool {
        self.deployment_ids.iter().any(|d| d == deployment_id)
    }

    /// First configured deployment, used when the platform omits
    /// `lti_deployment_id` from the login request.
    #[must_use]
    pub fn default_deployment_id(&self) -> Option<&str> {
        self.deployment_ids.first().map(String::as_str)
    }
}

/// Ephemeral anti-replay state created by the login initiator and consumed
/// exactly once by the launch validator.
///
/// Stored keyed by its `state` value so concurrent logins from the same
/// browser cannot overwrite each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSession {
    pub state: String,
    pub nonce: String,
    pub registration_id: RegistrationId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LoginSession {
    /// Create a session expiring `ttl` from now.
    #[must_use]
    pub fn new(
        state: impl Into<String>,
        nonce: impl Into<String>,
        registration_id: RegistrationId,
        ttl: std::time::Duration,
    ) -> Self {
        let created_at = Utc::now();
        let expires_at = created_at
            + Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(300));
        Self {
            state: state.into(),
            nonce: nonce.into(),
            registration_id,
            created_at,
            expires_at,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
