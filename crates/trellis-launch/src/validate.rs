//! The launch validation pipeline.
//!
//! Turns an inbound authentication response (state + id_token form post)
//! plus stored anti-replay state into a trusted [`LaunchContext`]. The
//! steps are sequential and fail-fast; a failure is terminal for the
//! request and the launch must be re-initiated from the platform. The
//! anti-replay session is consumed before any token inspection, so a
//! replayed request dies on `STATE_NOT_FOUND` no matter how valid its
//! token is.

use crate::context::{LaunchContext, LaunchMessage};
use crate::token::{RawIdToken, TokenVerifier, DEFAULT_ALLOWED_ALGS};
use chrono::Utc;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use trellis_core::{
    JwksFetcher, LaunchCache, LaunchId, LoginSessionStore, LtiClaims, LtiError, LtiResult,
    Registration, RegistrationDirectory,
};

/// Default clock-skew tolerance for time-based claims (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Default lifetime of a cached launch (1 hour), long enough to cover a
/// deep-linking round trip back to the tool.
pub const DEFAULT_LAUNCH_TTL: Duration = Duration::from_secs(3600);

/// The authentication response form-posted by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchRequest {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub id_token: String,
}

/// Configuration for launch validation.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Tolerance applied to exp/iat/nbf checks.
    pub clock_skew: Duration,
    /// TTL of cached launches.
    pub launch_ttl: Duration,
    /// Accepted signature algorithms.
    pub allowed_algs: Vec<Algorithm>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            clock_skew: DEFAULT_CLOCK_SKEW,
            launch_ttl: DEFAULT_LAUNCH_TTL,
            allowed_algs: DEFAULT_ALLOWED_ALGS.to_vec(),
        }
    }
}

impl ValidatorConfig {
    /// Create a config with a custom clock-skew tolerance.
    #[must_use]
    pub fn with_clock_skew(clock_skew: Duration) -> Self {
        Self {
            clock_skew,
            ..Default::default()
        }
    }

    /// Set the cached-launch TTL.
    #[must_use]
    pub fn launch_ttl(mut self, launch_ttl: Duration) -> Self {
        self.launch_ttl = launch_ttl;
        self
    }

    /// Set the accepted signature algorithms.
    #[must_use]
    pub fn allowed_algs(mut self, allowed_algs: Vec<Algorithm>) -> Self {
        self.allowed_algs = allowed_algs;
        self
    }
}

/// Validates platform-originating launch requests.
#[derive(Clone)]
pub struct LaunchValidator {
    directory: Arc<dyn RegistrationDirectory>,
    sessions: Arc<dyn LoginSessionStore>,
    cache: Arc<dyn LaunchCache>,
    jwks: Arc<dyn JwksFetcher>,
    verifier: TokenVerifier,
    config: ValidatorConfig,
}

impl LaunchValidator {
    pub fn new(
        directory: Arc<dyn RegistrationDirectory>,
        sessions: Arc<dyn LoginSessionStore>,
        cache: Arc<dyn LaunchCache>,
        jwks: Arc<dyn JwksFetcher>,
        config: ValidatorConfig,
    ) -> Self {
        let verifier = TokenVerifier::new(config.allowed_algs.clone());
        Self {
            directory,
            sessions,
            cache,
            jwks,
            verifier,
            config,
        }
    }

    /// Run the full validation pipeline on an authentication response.
    #[instrument(skip(self, request))]
    pub async fn validate(&self, request: &LaunchRequest) -> LtiResult<LaunchContext> {
        // 1. Extract request
        if request.state.is_empty() {
            return Err(LtiError::MissingState);
        }
        if request.id_token.is_empty() {
            return Err(LtiError::MissingIdToken);
        }

        // 2. Consume the login session. Single use: whatever happens next,
        // this state can never be presented again.
        let session = self
            .sessions
            .take(&request.state)
            .await?
            .ok_or(LtiError::StateNotFound)?;

        if session.is_expired() {
            warn!(
                registration_id = %session.registration_id,
                expired_at = %session.expires_at,
                "Login session expired before launch"
            );
            return Err(LtiError::ExpiredLoginData {
                expired_at: session.expires_at.timestamp(),
            });
        }

        // 3. Defensive equality check, guards stores that match keys
        // non-exactly.
        if session.state != request.state {
            return Err(LtiError::InvalidState);
        }

        // 4. Resolve the registration the login was initiated against.
        let registration = self
            .directory
            .find(&session.registration_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or(LtiError::NoRegistration {
                issuer: None,
                client_id: None,
            })?;

        // 5. Parse the compact JWS.
        let token = RawIdToken::parse(&request.id_token)?;

        // 6. Verify the signature against the platform's published keys.
        let kid = token.kid()?;
        let jwks = self
            .jwks
            .fetch(&registration.platform.jwks_url)
            .await
            .map_err(|e| match e {
                LtiError::JwksFetchFailed { jwks_url, message } => {
                    LtiError::UnableToFetchPublicKey { jwks_url, message }
                }
                other => other,
            })?;
        let key = self.verifier.resolve_key(&jwks, kid)?;
        self.verifier.verify(&token, key)?;

        // 7. Standard OIDC claims.
        self.verify_standard_claims(&token.claims, &registration)?;

        // 8. Nonce must match the one minted at initiation.
        match token.claims.nonce.as_deref() {
            None | Some("") => return Err(LtiError::MissingNonce),
            Some(nonce) if nonce != session.nonce => return Err(LtiError::InvalidNonce),
            Some(_) => {}
        }

        // 9. Deployment scoping.
        let deployment_id = token
            .claims
            .deployment_id
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or(LtiError::MissingDeploymentId)?;
        if !registration.has_deployment_id(deployment_id) {
            return Err(LtiError::NoDeployment {
                deployment_id: deployment_id.to_string(),
                registration_id: registration.id,
            });
        }

        // 10. Message type and variant-specific claims.
        let message = LaunchMessage::from_claims(&token.claims)?;

        // 11. Build the context and cache it for resumption.
        let launch_id = LaunchId::new();
        let context = LaunchContext::new(
            launch_id,
            registration,
            deployment_id.to_string(),
            token.claims.clone(),
            message,
        );

        self.cache
            .put(&launch_id, &context.to_cached(), self.config.launch_ttl)
            .await?;

        info!(
            launch_id = %launch_id,
            registration_id = %context.registration().id,
            message_type = %context.message().message_type(),
            "Launch validated"
        );

        Ok(context)
    }

    /// Step 7: issuer, audience, authorized party, and time-based claims.
    /// Every violation is an invalid message carrying the claim name.
    fn verify_standard_claims(
        &self,
        claims: &LtiClaims,
        registration: &Registration,
    ) -> LtiResult<()> {
        match claims.iss.as_deref() {
            None | Some("") => {
                return Err(LtiError::InvalidMessage {
                    claim: "iss",
                    message: "missing".to_string(),
                })
            }
            Some(iss) if iss != registration.platform.issuer => {
                warn!(expected = %registration.platform.issuer, actual = ?iss, "Issuer mismatch");
                return Err(LtiError::InvalidMessage {
                    claim: "iss",
                    message: "issuer does not match the registration".to_string(),
                });
            }
            Some(_) => {}
        }

        if !claims.audience_contains(&registration.client_id) {
            return Err(LtiError::InvalidMessage {
                claim: "aud",
                message: "audience does not contain the client_id".to_string(),
            });
        }

        if let Some(azp) = claims.azp.as_deref().filter(|v| !v.is_empty()) {
            if azp != registration.client_id {
                return Err(LtiError::InvalidMessage {
                    claim: "azp",
                    message: "authorized party does not match the client_id".to_string(),
                });
            }
        }

        let now = Utc::now().timestamp();
        let skew = self.config.clock_skew.as_secs() as i64;

        match claims.exp {
            None => {
                return Err(LtiError::InvalidMessage {
                    claim: "exp",
                    message: "missing".to_string(),
                })
            }
            Some(exp) if exp + skew <= now => {
                return Err(LtiError::InvalidMessage {
                    claim: "exp",
                    message: "token has expired".to_string(),
                })
            }
            Some(_) => {}
        }

        match claims.iat {
            None => {
                return Err(LtiError::InvalidMessage {
                    claim: "iat",
                    message: "missing".to_string(),
                })
            }
            Some(iat) if iat - skew > now => {
                return Err(LtiError::InvalidMessage {
                    claim: "iat",
                    message: "token issued in the future".to_string(),
                })
            }
            Some(_) => {}
        }

        if let Some(nbf) = claims.nbf {
            if nbf - skew > now {
                return Err(LtiError::InvalidMessage {
                    claim: "nbf",
                    message: "token not yet valid".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use trellis_core::{Platform, Registration, RegistrationId, Tool};

    pub(crate) fn registration() -> Registration {
        Registration {
            id: RegistrationId::new(),
            client_id: "tool-1".to_string(),
            platform: Platform {
                issuer: "https://platform.example".to_string(),
                authentication_url: "https://platform.example/auth".to_string(),
                access_token_url: "https://platform.example/token".to_string(),
                jwks_url: "https://platform.example/jwks".to_string(),
                name: None,
            },
            tool: Tool {
                name: None,
                launch_url: "https://tool.example/launch".to_string(),
                initiation_url: "https://tool.example/init".to_string(),
                jwks_url: "https://tool.example/jwks".to_string(),
                deep_linking_url: None,
            },
            deployment_ids: vec!["dep-1".to_string()],
            tool_keys: None,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks::JwksCache;
    use crate::memory::{
        InMemoryLaunchCache, InMemoryLoginSessionStore, InMemoryRegistrationDirectory,
    };

    fn validator() -> LaunchValidator {
        LaunchValidator::new(
            Arc::new(InMemoryRegistrationDirectory::default()),
            Arc::new(InMemoryLoginSessionStore::new()),
            Arc::new(InMemoryLaunchCache::new()),
            Arc::new(JwksCache::default()),
            ValidatorConfig::default(),
        )
    }

    fn claims(overrides: &[(&str, serde_json::Value)]) -> LtiClaims {
        let mut payload = serde_json::json!({
            "iss": "https://platform.example",
            "aud": "tool-1",
            "exp": Utc::now().timestamp() + 3600,
            "iat": Utc::now().timestamp(),
        });
        for (key, value) in overrides {
            payload[*key] = value.clone();
        }
        serde_json::from_value(payload).unwrap()
    }

    #[tokio::test]
    async fn test_missing_state_and_token() {
        let v = validator();

        let err = v
            .validate(&LaunchRequest {
                state: String::new(),
                id_token: "x.y.z".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_STATE");

        let err = v
            .validate(&LaunchRequest {
                state: "some-state".to_string(),
                id_token: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_ID_TOKEN");
    }

    #[tokio::test]
    async fn test_unknown_state() {
        let v = validator();
        let err = v
            .validate(&LaunchRequest {
                state: "never-issued".to_string(),
                id_token: "x.y.z".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STATE_NOT_FOUND");
    }

    #[test]
    fn test_standard_claims_ok() {
        let v = validator();
        let registration = tests_support::registration();
        assert!(v.verify_standard_claims(&claims(&[]), &registration).is_ok());
    }

    #[test]
    fn test_issuer_mismatch() {
        let v = validator();
        let registration = tests_support::registration();
        let err = v
            .verify_standard_claims(
                &claims(&[("iss", serde_json::json!("https://evil.example"))]),
                &registration,
            )
            .unwrap_err();
        assert!(matches!(err, LtiError::InvalidMessage { claim: "iss", .. }));
    }

    #[test]
    fn test_audience_must_contain_client_id() {
        let v = validator();
        let registration = tests_support::registration();

        let err = v
            .verify_standard_claims(
                &claims(&[("aud", serde_json::json!("other-tool"))]),
                &registration,
            )
            .unwrap_err();
        assert!(matches!(err, LtiError::InvalidMessage { claim: "aud", .. }));

        // Array form containing the client_id passes
        let ok = v.verify_standard_claims(
            &claims(&[("aud", serde_json::json!(["other-tool", "tool-1"]))]),
            &registration,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_azp_must_match_when_present() {
        let v = validator();
        let registration = tests_support::registration();

        let err = v
            .verify_standard_claims(
                &claims(&[("azp", serde_json::json!("other-tool"))]),
                &registration,
            )
            .unwrap_err();
        assert!(matches!(err, LtiError::InvalidMessage { claim: "azp", .. }));

        let ok = v.verify_standard_claims(
            &claims(&[("azp", serde_json::json!("tool-1"))]),
            &registration,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_expired_token_outside_skew() {
        let v = validator();
        let registration = tests_support::registration();

        let err = v
            .verify_standard_claims(
                &claims(&[("exp", serde_json::json!(Utc::now().timestamp() - 600))]),
                &registration,
            )
            .unwrap_err();
        assert!(matches!(err, LtiError::InvalidMessage { claim: "exp", .. }));

        // Within the 300s skew window it still passes
        let ok = v.verify_standard_claims(
            &claims(&[("exp", serde_json::json!(Utc::now().timestamp() - 120))]),
            &registration,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_iat_and_nbf_in_the_future() {
        let v = validator();
        let registration = tests_support::registration();

        let err = v
            .verify_standard_claims(
                &claims(&[("iat", serde_json::json!(Utc::now().timestamp() + 600))]),
                &registration,
            )
            .unwrap_err();
        assert!(matches!(err, LtiError::InvalidMessage { claim: "iat", .. }));

        let err = v
            .verify_standard_claims(
                &claims(&[("nbf", serde_json::json!(Utc::now().timestamp() + 600))]),
                &registration,
            )
            .unwrap_err();
        assert!(matches!(err, LtiError::InvalidMessage { claim: "nbf", .. }));
    }

    #[test]
    fn test_missing_time_claims() {
        let v = validator();
        let registration = tests_support::registration();

        let mut no_exp = claims(&[]);
        no_exp.exp = None;
        let err = v.verify_standard_claims(&no_exp, &registration).unwrap_err();
        assert!(matches!(err, LtiError::InvalidMessage { claim: "exp", .. }));

        let mut no_iat = claims(&[]);
        no_iat.iat = None;
        let err = v.verify_standard_claims(&no_iat, &registration).unwrap_err();
        assert!(matches!(err, LtiError::InvalidMessage { claim: "iat", .. }));
    }
}
