//! Key-addressed, stale-while-revalidate cache for read endpoints.
//!
//! Every entry moves through `Empty -> Fetching -> {Fresh, Errored}` and
//! back to `Fetching` on a revalidation trigger, while the last good data
//! stays visible to subscribers throughout. At most one fetch is in flight
//! per key: concurrent revalidations join the pending fetch through a
//! watch channel instead of issuing duplicates.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::debug;

use cert_core::model::UserId;

use crate::error::RequestError;

//
// ─── KEYS ──────────────────────────────────────────────────────────────────────
//

/// Deterministic cache key derived from endpoint, query parameters and,
/// for identity-sensitive endpoints, the current user id, so entries
/// never leak across identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn endpoint(name: &str) -> Self {
        Self(name.to_string())
    }

    #[must_use]
    pub fn param(mut self, name: &str, value: impl fmt::Display) -> Self {
        let sep = if self.0.contains('?') { '&' } else { '?' };
        self.0.push(sep);
        self.0.push_str(name);
        self.0.push('=');
        self.0.push_str(&value.to_string());
        self
    }

    /// Scope the key to a user; anonymous viewers get their own entry.
    #[must_use]
    pub fn identity(self, user: Option<&UserId>) -> Self {
        match user {
            Some(id) => self.param("uid", id),
            None => self.param("uid", "anon"),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

/// Why a revalidation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationTrigger {
    /// The window regained focus.
    Focus,
    /// Network connectivity came back.
    Reconnect,
}

/// Per-subscription revalidation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub revalidate_on_focus: bool,
    pub revalidate_on_reconnect: bool,
    /// Window during which repeated fetches for the same key coalesce into
    /// one. Zero always refetches on explicit triggers.
    pub deduping_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            revalidate_on_focus: true,
            revalidate_on_reconnect: true,
            deduping_interval: Duration::from_secs(2),
        }
    }
}

impl CacheOptions {
    /// Guaranteed-freshness preset: every explicit trigger refetches.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            deduping_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

//
// ─── SNAPSHOTS ─────────────────────────────────────────────────────────────────
//

/// Point-in-time view of one cache entry, typed for the subscriber.
pub struct Snapshot<T> {
    /// Last successfully fetched value; survives later failed fetches and
    /// stays visible while a refetch is in flight.
    pub data: Option<Arc<T>>,
    /// Error from the most recent fetch, cleared by the next success.
    pub error: Option<Arc<RequestError>>,
    /// A fetch is in flight and no data has ever arrived.
    pub is_loading: bool,
    /// A fetch is in flight, regardless of cached data.
    pub is_validating: bool,
}

impl<T> Snapshot<T> {
    fn empty() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_validating: false,
        }
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_validating: self.is_validating,
        }
    }
}

impl<T> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("is_loading", &self.is_loading)
            .field("is_validating", &self.is_validating)
            .finish()
    }
}

//
// ─── ENTRIES ───────────────────────────────────────────────────────────────────
//

type StoredValue = Arc<dyn Any + Send + Sync>;
type StoredFuture = Pin<Box<dyn Future<Output = Result<StoredValue, RequestError>> + Send>>;
type StoredFetcher = Arc<dyn Fn() -> StoredFuture + Send + Sync>;

struct Entry {
    data: Option<StoredValue>,
    error: Option<Arc<RequestError>>,
    last_fetched_at: Option<Instant>,
    in_flight: bool,
    revision: u64,
    subscribers: usize,
    tx: watch::Sender<u64>,
}

impl Entry {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            data: None,
            error: None,
            last_fetched_at: None,
            in_flight: false,
            revision: 0,
            subscribers: 0,
            tx,
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
        let _ = self.tx.send(self.revision);
    }

    fn has_result(&self) -> bool {
        self.data.is_some() || self.error.is_some()
    }
}

//
// ─── CACHE ─────────────────────────────────────────────────────────────────────
//

/// Shared entry table. All entry transitions happen under one lock, so no
/// subscriber ever observes a half-updated entry; the lock is never held
/// across a fetch await.
#[derive(Default)]
pub struct RevalidatingCache {
    entries: Mutex<HashMap<String, Entry>>,
}

enum FetchPlan {
    /// This caller owns the fetch.
    Fetch,
    /// Another caller's fetch is in flight; wait for it.
    Join(watch::Receiver<u64>),
    /// Within the deduplication window; serve what is cached.
    Skip,
}

impl RevalidatingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a key with a typed fetcher.
    ///
    /// `key = None` disables the subscription (used while a slug or
    /// identity is not yet known): snapshots stay empty and revalidation
    /// is a no-op. Dropping the handle releases the subscription; entries
    /// without subscribers become eligible for [`Self::evict_unused`].
    pub fn subscribe<T, F, Fut>(
        self: &Arc<Self>,
        key: Option<CacheKey>,
        fetcher: F,
        options: CacheOptions,
    ) -> CacheHandle<T>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RequestError>> + Send + 'static,
    {
        if let Some(key) = &key {
            let mut entries = self.lock_entries();
            let entry = entries.entry(key.as_str().to_string()).or_insert_with(Entry::new);
            entry.subscribers += 1;
        }

        let fetcher: StoredFetcher = Arc::new(move || {
            let fut = fetcher();
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as StoredValue) })
                as StoredFuture
        });

        CacheHandle {
            cache: Arc::clone(self),
            key: key.map(|k| k.as_str().to_string()),
            fetcher,
            options,
            _marker: PhantomData,
        }
    }

    /// Mark the entry for `key` stale so the next revalidation refetches
    /// regardless of the deduplication window, and wake anything waiting
    /// on the entry. Used after writes that invalidate a read endpoint.
    pub fn mutate(&self, key: &CacheKey) {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.get_mut(key.as_str()) {
            entry.last_fetched_at = None;
            entry.bump();
            debug!(key = %key, "cache entry marked stale");
        }
    }

    /// Drop entries that no live handle subscribes to. Entries with a
    /// fetch in flight are kept until it settles.
    pub fn evict_unused(&self) {
        self.lock_entries()
            .retain(|_, entry| entry.subscribers > 0 || entry.in_flight);
    }

    /// Number of resident entries, including stale ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().expect("cache entry table poisoned")
    }

    fn release(&self, key: &str) {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
        }
    }

    fn plan_fetch(&self, key: &str, deduping_interval: Duration) -> FetchPlan {
        let mut entries = self.lock_entries();
        let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);

        if entry.in_flight {
            return FetchPlan::Join(entry.tx.subscribe());
        }
        if entry.has_result() {
            if let Some(at) = entry.last_fetched_at {
                if !deduping_interval.is_zero() && at.elapsed() < deduping_interval {
                    return FetchPlan::Skip;
                }
            }
        }
        entry.in_flight = true;
        entry.bump();
        FetchPlan::Fetch
    }

    fn settle(&self, key: &str, result: Result<StoredValue, RequestError>) {
        let mut entries = self.lock_entries();
        let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);
        match result {
            Ok(value) => {
                entry.data = Some(value);
                entry.error = None;
            }
            Err(err) => {
                debug!(key, error = %err, "cache fetch failed, retaining stale data");
                // keep stale data visible; only the error slot changes
                entry.error = Some(Arc::new(err));
            }
        }
        entry.last_fetched_at = Some(Instant::now());
        entry.in_flight = false;
        entry.bump();
    }

    fn abandon(&self, key: &str) {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.get_mut(key) {
            debug!(key, "fetch abandoned, releasing entry");
            entry.in_flight = false;
            entry.bump();
        }
    }

    fn is_in_flight(&self, key: &str) -> bool {
        self.lock_entries()
            .get(key)
            .is_some_and(|entry| entry.in_flight)
    }

    fn snapshot_raw(&self, key: &str) -> (Option<StoredValue>, Option<Arc<RequestError>>, bool) {
        let entries = self.lock_entries();
        match entries.get(key) {
            Some(entry) => (entry.data.clone(), entry.error.clone(), entry.in_flight),
            None => (None, None, false),
        }
    }
}

/// Holds the claimed fetch slot for one key.
///
/// A subscriber that wins the fetch may be dropped before its fetcher
/// resolves (the subscribing component unmounted mid-fetch). Dropping the
/// guard without settling releases the slot and wakes waiters, so an
/// abandoned fetch never leaves the entry stuck in flight.
struct InFlightGuard {
    cache: Arc<RevalidatingCache>,
    key: Option<String>,
}

impl InFlightGuard {
    fn claim(cache: Arc<RevalidatingCache>, key: String) -> Self {
        Self {
            cache,
            key: Some(key),
        }
    }

    fn settle(mut self, result: Result<StoredValue, RequestError>) {
        if let Some(key) = self.key.take() {
            self.cache.settle(&key, result);
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.cache.abandon(&key);
        }
    }
}

//
// ─── HANDLES ───────────────────────────────────────────────────────────────────
//

/// A live subscription to one cache key.
pub struct CacheHandle<T> {
    cache: Arc<RevalidatingCache>,
    key: Option<String>,
    fetcher: StoredFetcher,
    options: CacheOptions,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> CacheHandle<T> {
    /// Current view of the entry without touching the network.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        let Some(key) = &self.key else {
            return Snapshot::empty();
        };
        let (data, error, in_flight) = self.cache.snapshot_raw(key);
        let data = data.and_then(|value| value.downcast::<T>().ok());
        Snapshot {
            is_loading: in_flight && data.is_none(),
            is_validating: in_flight,
            data,
            error,
        }
    }

    /// Revalidate the entry, joining any fetch already in flight.
    ///
    /// Returns the snapshot after the fetch settles. Within the
    /// deduplication window this serves the cached result without a
    /// network call.
    pub async fn revalidate(&self) -> Snapshot<T> {
        let Some(key) = self.key.clone() else {
            return Snapshot::empty();
        };

        match self.cache.plan_fetch(&key, self.options.deduping_interval) {
            FetchPlan::Skip => self.snapshot(),
            FetchPlan::Join(mut rx) => {
                while self.cache.is_in_flight(&key) {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
                self.snapshot()
            }
            FetchPlan::Fetch => {
                let guard = InFlightGuard::claim(Arc::clone(&self.cache), key);
                let result = (self.fetcher)().await;
                guard.settle(result);
                self.snapshot()
            }
        }
    }

    /// Revalidate only if the entry has never produced a result: the
    /// "component mounted with no cached value" trigger.
    pub async fn ensure(&self) -> Snapshot<T> {
        let current = self.snapshot();
        if current.data.is_some() || current.error.is_some() || current.is_validating {
            return current;
        }
        self.revalidate().await
    }

    /// React to a focus/reconnect event according to this subscription's
    /// options.
    pub async fn trigger(&self, trigger: RevalidationTrigger) -> Snapshot<T> {
        let enabled = match trigger {
            RevalidationTrigger::Focus => self.options.revalidate_on_focus,
            RevalidationTrigger::Reconnect => self.options.revalidate_on_reconnect,
        };
        if enabled {
            self.revalidate().await
        } else {
            self.snapshot()
        }
    }

    #[must_use]
    pub fn options(&self) -> CacheOptions {
        self.options
    }
}

impl<T> Drop for CacheHandle<T> {
    fn drop(&mut self) {
        if let Some(key) = &self.key {
            self.cache.release(key);
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_deterministic_and_identity_scoped() {
        let anon = CacheKey::endpoint("certification-info")
            .param("slug", "aws-ccp")
            .identity(None);
        let user = CacheKey::endpoint("certification-info")
            .param("slug", "aws-ccp")
            .identity(Some(&UserId::new("u-1")));

        assert_eq!(anon.as_str(), "certification-info?slug=aws-ccp&uid=anon");
        assert_eq!(user.as_str(), "certification-info?slug=aws-ccp&uid=u-1");
        assert_ne!(anon, user);
    }

    #[test]
    fn default_options_dedupe_and_fresh_options_do_not() {
        assert!(!CacheOptions::default().deduping_interval.is_zero());
        assert!(CacheOptions::fresh().deduping_interval.is_zero());
        assert!(CacheOptions::fresh().revalidate_on_focus);
    }

    #[tokio::test]
    async fn disabled_subscription_never_fetches() {
        let cache = Arc::new(RevalidatingCache::new());
        let handle = cache.subscribe::<u32, _, _>(
            None,
            || async { Ok(7) },
            CacheOptions::default(),
        );
        let snap = handle.revalidate().await;
        assert!(snap.data.is_none());
        assert!(snap.error.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn dropping_the_last_handle_makes_the_entry_evictable() {
        let cache = Arc::new(RevalidatingCache::new());
        let key = CacheKey::endpoint("progress").identity(None);
        let handle = cache.subscribe::<u32, _, _>(
            Some(key),
            || async { Ok(1) },
            CacheOptions::default(),
        );
        handle.revalidate().await;
        assert_eq!(cache.len(), 1);

        cache.evict_unused();
        assert_eq!(cache.len(), 1, "live subscription must not be evicted");

        drop(handle);
        cache.evict_unused();
        assert!(cache.is_empty());
    }
}
