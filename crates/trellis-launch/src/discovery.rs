//! OIDC discovery for platform configuration.
//!
//! Convenience for host applications configuring a registration from a
//! live platform: fetches `/.well-known/openid-configuration` and builds a
//! [`Platform`]. The launch pipeline itself never discovers; registrations
//! are resolved from the directory.

use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{info, instrument};
use trellis_core::{LtiError, LtiResult, Platform};

/// Bound on a discovery fetch.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// The subset of OIDC provider metadata a registration needs.
#[derive(Debug, Clone, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    jwks_uri: String,
}

/// Fetches platform OIDC configuration.
#[derive(Debug, Clone, Default)]
pub struct PlatformDiscovery;

impl PlatformDiscovery {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Discover a platform's endpoints from its issuer URL.
    #[instrument(skip(self), fields(issuer = %issuer_url))]
    pub async fn discover(&self, issuer_url: &str) -> LtiResult<Platform> {
        let issuer_url = issuer_url.trim_end_matches('/');
        let well_known = Self::well_known_url(issuer_url);

        // SSRF protection: validate before any outbound request
        validate_url_not_internal(&well_known).map_err(|e| LtiError::OidcConfigFetchFailed {
            url: well_known.clone(),
            message: format!("SSRF protection: {e}"),
        })?;

        // No redirects: a redirecting issuer is a misconfiguration at best
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(DISCOVERY_TIMEOUT)
            .build()
            .map_err(|e| LtiError::OidcConfigFetchFailed {
                url: well_known.clone(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        let response =
            client
                .get(&well_known)
                .send()
                .await
                .map_err(|e| LtiError::OidcConfigFetchFailed {
                    url: well_known.clone(),
                    message: format!("HTTP error: {e}"),
                })?;

        if !response.status().is_success() {
            return Err(LtiError::OidcConfigFetchFailed {
                url: well_known.clone(),
                message: format!("HTTP status {}", response.status()),
            });
        }

        let metadata: ProviderMetadata =
            response
                .json()
                .await
                .map_err(|e| LtiError::OidcConfigFetchFailed {
                    url: well_known.clone(),
                    message: format!("JSON parse error: {e}"),
                })?;

        if metadata.issuer.trim_end_matches('/') != issuer_url {
            return Err(LtiError::OidcConfigFetchFailed {
                url: well_known,
                message: "metadata issuer does not match the requested issuer".to_string(),
            });
        }

        info!(
            authorization_endpoint = %metadata.authorization_endpoint,
            jwks_uri = %metadata.jwks_uri,
            "Discovered platform endpoints"
        );

        Ok(Platform {
            issuer: metadata.issuer,
            authentication_url: metadata.authorization_endpoint,
            access_token_url: metadata.token_endpoint,
            jwks_url: metadata.jwks_uri,
            name: None,
        })
    }

    /// Well-known configuration URL for an issuer.
    #[must_use]
    pub fn well_known_url(issuer_url: &str) -> String {
        let issuer_url = issuer_url.trim_end_matches('/');
        format!("{issuer_url}/.well-known/openid-configuration")
    }
}

/// SSRF protection: reject URLs targeting internal/private services.
pub(crate) fn validate_url_not_internal(url_str: &str) -> Result<(), String> {
    let url = url::Url::parse(url_str).map_err(|e| format!("Invalid URL: {e}"))?;

    let scheme = url.scheme();
    if scheme != "https" {
        return Err(format!("Only HTTPS is allowed for platform URLs, got: {scheme}"));
    }

    let host = url
        .host_str()
        .ok_or_else(|| "URL has no host".to_string())?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        match ip {
            IpAddr::V4(v4) => {
                if v4.is_loopback()
                    || v4.is_private()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_unspecified()
                    || v4.is_documentation()
                {
                    return Err(format!("Internal/private IP not allowed: {host}"));
                }
            }
            IpAddr::V6(v6) => {
                if v6.is_loopback() || v6.is_unspecified() {
                    return Err(format!("Internal/private IP not allowed: {host}"));
                }
                let segs = v6.segments();
                if (segs[0] & 0xfe00) == 0xfc00 || (segs[0] & 0xffc0) == 0xfe80 {
                    return Err(format!("Internal/private IP not allowed: {host}"));
                }
            }
        }
    } else {
        let lower = host.to_lowercase();
        let blocked = [
            "localhost",
            "metadata.google.internal",
            "metadata.goog",
            "169.254.169.254",
        ];
        for b in blocked {
            if lower == b || lower.ends_with(&format!(".{b}")) {
                return Err(format!("Blocked hostname: {host}"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_url() {
        assert_eq!(
            PlatformDiscovery::well_known_url("https://platform.example"),
            "https://platform.example/.well-known/openid-configuration"
        );
        assert_eq!(
            PlatformDiscovery::well_known_url("https://platform.example/"),
            "https://platform.example/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_ssrf_guard() {
        assert!(validate_url_not_internal("https://platform.example/jwks").is_ok());
        assert!(validate_url_not_internal("http://platform.example/jwks").is_err());
        assert!(validate_url_not_internal("https://localhost/jwks").is_err());
        assert!(validate_url_not_internal("https://127.0.0.1/jwks").is_err());
        assert!(validate_url_not_internal("https://10.0.0.8/jwks").is_err());
        assert!(validate_url_not_internal("https://169.254.169.254/latest").is_err());
        assert!(validate_url_not_internal("https://metadata.google.internal/x").is_err());
    }

    #[tokio::test]
    async fn test_discover_rejects_http_issuer() {
        let discovery = PlatformDiscovery::new();
        let err = discovery.discover("http://platform.example").await.unwrap_err();
        assert_eq!(err.code(), "FAILED_TO_FETCH_OIDC_CONFIG");
    }
}
