//! In-memory collaborator implementations.
//!
//! Suitable for tests and single-process hosts. Multi-process deployments
//! need shared backends (database, Redis) implemented host-side against
//! the `trellis-core` traits; the atomicity contract of
//! [`LoginSessionStore::take`] must hold there too.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use trellis_core::{
    CachedLaunch, LaunchCache, LaunchId, LoginSession, LoginSessionStore, LtiResult, Registration,
    RegistrationDirectory, RegistrationId, RegistrationLookup,
};

/// Registration directory backed by a map.
#[derive(Clone, Default)]
pub struct InMemoryRegistrationDirectory {
    registrations: Arc<RwLock<HashMap<RegistrationId, Registration>>>,
}

impl InMemoryRegistrationDirectory {
    #[must_use]
    pub fn new(registrations: Vec<Registration>) -> Self {
        let map = registrations.into_iter().map(|r| (r.id, r)).collect();
        Self {
            registrations: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn insert(&self, registration: Registration) {
        self.registrations
            .write()
            .await
            .insert(registration.id, registration);
    }
}

#[async_trait]
impl RegistrationDirectory for InMemoryRegistrationDirectory {
    async fn find(&self, id: &RegistrationId) -> LtiResult<Option<Registration>> {
        Ok(self.registrations.read().await.get(id).cloned())
    }

    async fn find_by_client_id(&self, client_id: &str) -> LtiResult<Vec<Registration>> {
        Ok(self
            .registrations
            .read()
            .await
            .values()
            .filter(|r| r.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn find_by_platform_issuer(
        &self,
        issuer: &str,
        client_id: Option<&str>,
    ) -> LtiResult<RegistrationLookup> {
        let registrations = self.registrations.read().await;
        let matches: Vec<&Registration> = registrations
            .values()
            .filter(|r| r.platform.issuer == issuer)
            .filter(|r| client_id.map_or(true, |c| r.client_id == c))
            .collect();

        Ok(match matches.as_slice() {
            [] => RegistrationLookup::NotFound,
            [registration] => RegistrationLookup::Found((*registration).clone()),
            many => RegistrationLookup::Ambiguous(many.len()),
        })
    }
}

/// Login session store backed by a map keyed by the state token.
///
/// `take` removes under the write lock, so two validators racing on the
/// same state see exactly one winner.
#[derive(Clone, Default)]
pub struct InMemoryLoginSessionStore {
    sessions: Arc<RwLock<HashMap<String, LoginSession>>>,
}

impl InMemoryLoginSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions (test helper).
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl LoginSessionStore for InMemoryLoginSessionStore {
    async fn put(&self, session: LoginSession) -> LtiResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.state.clone(), session);
        Ok(())
    }

    async fn take(&self, state: &str) -> LtiResult<Option<LoginSession>> {
        Ok(self.sessions.write().await.remove(state))
    }
}

/// Launch cache backed by a map with per-entry TTL, checked on read.
#[derive(Clone, Default)]
pub struct InMemoryLaunchCache {
    entries: Arc<RwLock<HashMap<LaunchId, (CachedLaunch, Instant, Duration)>>>,
}

impl InMemoryLaunchCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LaunchCache for InMemoryLaunchCache {
    async fn put(
        &self,
        launch_id: &LaunchId,
        launch: &CachedLaunch,
        ttl: Duration,
    ) -> LtiResult<()> {
        self.entries
            .write()
            .await
            .insert(*launch_id, (launch.clone(), Instant::now(), ttl));
        Ok(())
    }

    async fn get(&self, launch_id: &LaunchId) -> LtiResult<Option<CachedLaunch>> {
        {
            let entries = self.entries.read().await;
            match entries.get(launch_id) {
                None => return Ok(None),
                Some((launch, stored_at, ttl)) if stored_at.elapsed() <= *ttl => {
                    return Ok(Some(launch.clone()));
                }
                Some(_) => {}
            }
        }

        // Entry expired; drop it.
        self.entries.write().await.remove(launch_id);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{LtiClaims, Platform, Tool};

    fn registration(issuer: &str, client_id: &str) -> Registration {
        Registration {
            id: RegistrationId::new(),
            client_id: client_id.to_string(),
            platform: Platform {
                issuer: issuer.to_string(),
                authentication_url: format!("{issuer}/auth"),
                access_token_url: format!("{issuer}/token"),
                jwks_url: format!("{issuer}/jwks"),
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

    fn session(state: &str) -> LoginSession {
        LoginSession::new(state, "nonce-1", RegistrationId::new(), Duration::from_secs(300))
    }

    fn cached_launch() -> CachedLaunch {
        CachedLaunch {
            registration_id: RegistrationId::new(),
            deployment_id: "dep-1".to_string(),
            claims: serde_json::from_value::<LtiClaims>(serde_json::json!({})).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = InMemoryLoginSessionStore::new();
        store.put(session("state-1")).await.unwrap();

        assert!(store.take("state-1").await.unwrap().is_some());
        assert!(store.take("state-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_take_unknown_state() {
        let store = InMemoryLoginSessionStore::new();
        assert!(store.take("never-issued").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_take_has_one_winner() {
        let store = InMemoryLoginSessionStore::new();
        store.put(session("state-1")).await.unwrap();

        let (a, b) = tokio::join!(store.take("state-1"), store.take("state-1"));
        let winners = [a.unwrap(), b.unwrap()]
            .into_iter()
            .flatten()
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_sessions_do_not_overwrite_each_other() {
        let store = InMemoryLoginSessionStore::new();
        store.put(session("state-1")).await.unwrap();
        store.put(session("state-2")).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.take("state-1").await.unwrap().is_some());
        assert!(store.take("state-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_launch_cache_round_trip() {
        let cache = InMemoryLaunchCache::new();
        let launch_id = LaunchId::new();
        let launch = cached_launch();

        cache
            .put(&launch_id, &launch, Duration::from_secs(60))
            .await
            .unwrap();

        let loaded = cache.get(&launch_id).await.unwrap().unwrap();
        assert_eq!(loaded.deployment_id, "dep-1");
        assert_eq!(loaded.registration_id, launch.registration_id);
    }

    #[tokio::test]
    async fn test_launch_cache_expires() {
        let cache = InMemoryLaunchCache::new();
        let launch_id = LaunchId::new();

        cache
            .put(&launch_id, &cached_launch(), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get(&launch_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_directory_lookup_shapes() {
        let reg_a = registration("https://p.example", "tool-1");
        let reg_b = registration("https://p.example", "tool-2");
        let directory = InMemoryRegistrationDirectory::new(vec![reg_a.clone(), reg_b]);

        match directory
            .find_by_platform_issuer("https://p.example", Some("tool-1"))
            .await
            .unwrap()
        {
            RegistrationLookup::Found(found) => assert_eq!(found.id, reg_a.id),
            other => panic!("expected Found, got {other:?}"),
        }

        assert!(matches!(
            directory
                .find_by_platform_issuer("https://p.example", None)
                .await
                .unwrap(),
            RegistrationLookup::Ambiguous(2)
        ));

        assert!(matches!(
            directory
                .find_by_platform_issuer("https://other.example", None)
                .await
                .unwrap(),
            RegistrationLookup::NotFound
        ));

        assert_eq!(
            directory.find_by_client_id("tool-1").await.unwrap().len(),
            1
        );
        assert!(directory.find(&reg_a.id).await.unwrap().is_some());
    }
}
