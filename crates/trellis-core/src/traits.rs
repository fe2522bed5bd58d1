//! Collaborator contracts consumed by the launch engine.
//!
//! The engine owns the protocol logic; registration lookup, anti-replay
//! storage, launch caching, and JWKS retrieval are provided by the host
//! application through these traits. Backends must provide atomic per-key
//! operations: in particular [`LoginSessionStore::take`] must be an atomic
//! fetch-and-invalidate so two validators racing on the same state produce
//! exactly one winner.

use crate::claims::LtiClaims;
use crate::error::LtiResult;
use crate::ids::{LaunchId, RegistrationId};
use crate::jwks::JwkSet;
use crate::model::{LoginSession, Registration};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of an issuer-scoped registration lookup.
///
/// Ambiguity (an issuer with several registrations and no client_id to
/// pick one) is distinct from not-found; it is never encoded as a missing
/// value.
#[derive(Debug, Clone)]
pub enum RegistrationLookup {
    Found(Registration),
    NotFound,
    /// The issuer alone matched this many registrations.
    Ambiguous(usize),
}

/// Resolves registrations configured for this tool.
#[async_trait]
pub trait RegistrationDirectory: Send + Sync {
    /// Look up a registration by its identifier.
    async fn find(&self, id: &RegistrationId) -> LtiResult<Option<Registration>>;

    /// All registrations carrying the given client_id.
    async fn find_by_client_id(&self, client_id: &str) -> LtiResult<Vec<Registration>>;

    /// Resolve the unique active registration for `(issuer, client_id)`.
    /// With no client_id, the issuer alone must resolve uniquely.
    async fn find_by_platform_issuer(
        &self,
        issuer: &str,
        client_id: Option<&str>,
    ) -> LtiResult<RegistrationLookup>;
}

/// Single-use, TTL-bound storage for login anti-replay state.
#[async_trait]
pub trait LoginSessionStore: Send + Sync {
    /// Persist a session keyed by its `state` value.
    async fn put(&self, session: LoginSession) -> LtiResult<()>;

    /// Atomically fetch and invalidate the session stored under `state`.
    /// Returns `None` when no session exists (never issued, already
    /// consumed, or evicted). Expired sessions are still returned so the
    /// caller can distinguish expiry from replay.
    async fn take(&self, state: &str) -> LtiResult<Option<LoginSession>>;
}

/// Payload cached for a validated launch, allowing later resumption
/// without re-running validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedLaunch {
    pub registration_id: RegistrationId,
    pub deployment_id: String,
    pub claims: LtiClaims,
}

/// TTL-bound storage for validated launch payloads keyed by launch id.
#[async_trait]
pub trait LaunchCache: Send + Sync {
    async fn put(&self, launch_id: &LaunchId, launch: &CachedLaunch, ttl: Duration)
        -> LtiResult<()>;

    async fn get(&self, launch_id: &LaunchId) -> LtiResult<Option<CachedLaunch>>;
}

/// Retrieves a platform's published key set.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self, jwks_url: &str) -> LtiResult<JwkSet>;
}
