//! In-memory caches with per-call lifetimes
//!
//! Every cache domain (published versions, advisories, installed packages,
//! package-manager detection) is a [`KeyedCache`] owned by one [`CacheStores`]
//! context that is passed by handle to whoever needs it.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use semver::Version;
use tokio::time::Instant;

use crate::version::package_manager::PackageManager;
use crate::version::types::{Advisory, InstalledPackages, SharedFetch};

/// A value stamped with its creation time.
#[derive(Debug, Clone)]
pub struct TtlEntry<T> {
    value: T,
    created_at: Option<Instant>,
}

impl<T> TtlEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            created_at: Some(Instant::now()),
        }
    }

    /// True iff never invalidated and at most `lifetime` old.
    pub fn is_valid(&self, lifetime: Duration) -> bool {
        self.created_at
            .is_some_and(|created_at| created_at.elapsed() <= lifetime)
    }

    /// Marks the entry permanently invalid.
    pub fn invalidate(&mut self) {
        self.created_at = None;
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Map of [`TtlEntry`] values behind a mutex.
///
/// Lookups never fail: a poisoned lock is recovered since entries are
/// replaced wholesale and cannot be observed half-written.
pub struct KeyedCache<K, V> {
    entries: Mutex<HashMap<K, TtlEntry<V>>>,
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> KeyedCache<K, V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, TtlEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value if present and still valid under `lifetime`.
    pub fn get_valid<Q>(&self, key: &Q, lifetime: Duration) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock()
            .get(key)
            .filter(|entry| entry.is_valid(lifetime))
            .map(|entry| entry.value().clone())
    }

    /// Returns the value regardless of its age.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().get(key).map(|entry| entry.value().clone())
    }

    pub fn contains_valid<Q>(&self, key: &Q, lifetime: Duration) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock()
            .get(key)
            .is_some_and(|entry| entry.is_valid(lifetime))
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().insert(key, TtlEntry::new(value));
    }

    /// Returns the valid value for `key`, or stores and returns `create()`.
    ///
    /// Check and replacement happen under one lock, so concurrent callers for
    /// the same key observe the same stored value.
    pub fn get_or_insert_with(&self, key: K, lifetime: Duration, create: impl FnOnce() -> V) -> V {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(&key)
            && entry.is_valid(lifetime)
        {
            return entry.value().clone();
        }

        let value = create();
        entries.insert(key, TtlEntry::new(value.clone()));
        value
    }

    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.invalidate();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Process-wide cache context shared by every analysis.
pub struct CacheStores {
    /// Published versions per package name
    pub published: KeyedCache<String, SharedFetch<Arc<Vec<Version>>>>,
    /// Advisories per package name, empty when the package has none
    pub advisories: KeyedCache<String, Arc<Vec<Advisory>>>,
    /// Installed packages per project root
    pub installed: KeyedCache<PathBuf, SharedFetch<Arc<InstalledPackages>>>,
    /// Detected package manager per project root
    pub package_managers: KeyedCache<PathBuf, SharedFetch<PackageManager>>,
    /// Accumulated `<program> --version` probe results
    pub manager_support: Mutex<TtlEntry<HashMap<String, bool>>>,
}

impl Default for CacheStores {
    fn default() -> Self {
        Self {
            published: KeyedCache::default(),
            advisories: KeyedCache::default(),
            installed: KeyedCache::default(),
            package_managers: KeyedCache::default(),
            manager_support: Mutex::new(TtlEntry::new(HashMap::new())),
        }
    }
}
