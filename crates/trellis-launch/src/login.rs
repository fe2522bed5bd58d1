//! OIDC third-party-initiated login.
//!
//! The platform opens the tool's initiation URL with a login hint; the
//! initiator resolves the registration, mints fresh anti-replay state, and
//! answers with the authentication redirect back to the platform. One
//! session-store write, no network calls.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use trellis_core::{
    LoginSession, LoginSessionStore, LtiError, LtiResult, Registration, RegistrationDirectory,
    RegistrationId, RegistrationLookup,
};

/// Default lifetime of a login session (5 minutes).
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(300);

/// The third-party-initiated login request, as extracted by the host from
/// the platform's GET/POST parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub iss: String,
    pub login_hint: String,
    pub target_link_uri: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub lti_deployment_id: Option<String>,
    #[serde(default)]
    pub lti_message_hint: Option<String>,
}

/// Result of a successful login initiation.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Authentication URL to redirect the browser to (302).
    pub url: String,
    /// The state token bound to this login.
    pub state: String,
    /// The nonce that must come back inside the id_token.
    pub nonce: String,
    pub registration_id: RegistrationId,
}

/// Configuration for login initiation.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// Lifetime of the stored login session.
    pub state_ttl: Duration,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            state_ttl: DEFAULT_STATE_TTL,
        }
    }
}

impl LoginConfig {
    /// Create a config with a custom session lifetime.
    #[must_use]
    pub fn with_state_ttl(state_ttl: Duration) -> Self {
        Self { state_ttl }
    }
}

/// Builds the OIDC authentication redirect and persists anti-replay state.
#[derive(Clone)]
pub struct OidcLoginInitiator {
    directory: Arc<dyn RegistrationDirectory>,
    sessions: Arc<dyn LoginSessionStore>,
    config: LoginConfig,
}

impl OidcLoginInitiator {
    pub fn new(
        directory: Arc<dyn RegistrationDirectory>,
        sessions: Arc<dyn LoginSessionStore>,
        config: LoginConfig,
    ) -> Self {
        Self {
            directory,
            sessions,
            config,
        }
    }

    /// Handle a third-party-initiated login and produce the authentication
    /// redirect.
    #[instrument(skip(self, request), fields(issuer = %request.iss))]
    pub async fn initiate(&self, request: &LoginRequest) -> LtiResult<LoginRedirect> {
        Self::validate_login_request(request)?;

        let registration = self
            .resolve_registration(&request.iss, request.client_id.as_deref())
            .await?;

        // A deployment hint from the platform must match the registration.
        if let Some(deployment_id) = non_empty(request.lti_deployment_id.as_deref()) {
            if !registration.has_deployment_id(deployment_id) {
                return Err(LtiError::NoDeployment {
                    deployment_id: deployment_id.to_string(),
                    registration_id: registration.id,
                });
            }
        }

        let state = generate_token();
        let nonce = generate_token();

        self.sessions
            .put(LoginSession::new(
                state.clone(),
                nonce.clone(),
                registration.id,
                self.config.state_ttl,
            ))
            .await?;

        let url = Self::build_authentication_url(&registration, request, &state, &nonce)?;

        info!(
            registration_id = %registration.id,
            client_id = %registration.client_id,
            "Initiated LTI login"
        );

        Ok(LoginRedirect {
            url,
            state,
            nonce,
            registration_id: registration.id,
        })
    }

    fn validate_login_request(request: &LoginRequest) -> LtiResult<()> {
        if request.iss.is_empty() {
            return Err(LtiError::MissingLoginParameters { parameter: "iss" });
        }
        if request.login_hint.is_empty() {
            return Err(LtiError::MissingLoginParameters {
                parameter: "login_hint",
            });
        }
        if request.target_link_uri.is_empty() {
            return Err(LtiError::MissingLoginParameters {
                parameter: "target_link_uri",
            });
        }
        Ok(())
    }

    async fn resolve_registration(
        &self,
        issuer: &str,
        client_id: Option<&str>,
    ) -> LtiResult<Registration> {
        let client_id = non_empty(client_id);

        let registration = match self
            .directory
            .find_by_platform_issuer(issuer, client_id)
            .await?
        {
            RegistrationLookup::Found(registration) => registration,
            RegistrationLookup::NotFound => {
                return Err(match client_id {
                    Some(client_id) => LtiError::ClientNotRegistered {
                        issuer: issuer.to_string(),
                        client_id: client_id.to_string(),
                    },
                    None => LtiError::NoRegistration {
                        issuer: Some(issuer.to_string()),
                        client_id: None,
                    },
                });
            }
            RegistrationLookup::Ambiguous(candidates) => {
                return Err(LtiError::AmbiguousRegistration {
                    issuer: issuer.to_string(),
                    candidates,
                });
            }
        };

        if !registration.is_active {
            return Err(LtiError::NoRegistration {
                issuer: Some(issuer.to_string()),
                client_id: client_id.map(String::from),
            });
        }

        Ok(registration)
    }

    fn build_authentication_url(
        registration: &Registration,
        request: &LoginRequest,
        state: &str,
        nonce: &str,
    ) -> LtiResult<String> {
        let mut auth_url =
            url::Url::parse(&registration.platform.authentication_url).map_err(|e| {
                LtiError::store(format!(
                    "registration {} has an invalid authentication URL: {e}",
                    registration.id
                ))
            })?;

        {
            let mut query = auth_url.query_pairs_mut();
            query.append_pair("scope", "openid");
            query.append_pair("response_type", "id_token");
            query.append_pair("response_mode", "form_post");
            query.append_pair("prompt", "none");
            query.append_pair("client_id", &registration.client_id);
            query.append_pair("redirect_uri", &request.target_link_uri);
            query.append_pair("login_hint", &request.login_hint);
            query.append_pair("state", state);
            query.append_pair("nonce", nonce);

            if let Some(hint) = non_empty(request.lti_message_hint.as_deref()) {
                query.append_pair("lti_message_hint", hint);
            }
        }

        Ok(auth_url.to_string())
    }
}

/// Mint a URL-safe token carrying 256 bits of CSPRNG entropy
/// (43 base64url characters, no padding).
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
