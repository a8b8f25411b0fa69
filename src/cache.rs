// SPDX-License-Identifier: MPL-2.0

//! Cache library lookups that have already been answered.
//!
//! One restore resolves many graphs, often in parallel, and they ask for the same ranges over
//! and over. [CachingLibraryProvider] answers repeated requests from memory. Each key owns a
//! lock, so concurrent requests for the same range wait for a single lookup while requests
//! for other ranges proceed.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::framework::Framework;
use crate::library::LibraryRange;
use crate::provider::{LibraryProvider, ProviderError, ResolvedLibrary};

type CacheKey = (String, u16, Framework, Option<String>);

/// `None` until the first successful lookup.
type Slot = Arc<Mutex<Option<Option<ResolvedLibrary>>>>;

/// A [LibraryProvider] that remembers the answers of another one.
///
/// Faults are passed through and never cached, so a later request retries.
#[derive(Debug)]
pub struct CachingLibraryProvider<P> {
    inner: P,
    entries: DashMap<CacheKey, Slot>,
}

impl<P: LibraryProvider> CachingLibraryProvider<P> {
    /// Wraps `inner`.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
        }
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of answered lookups held.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().lock().is_some())
            .count()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets everything.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<P: LibraryProvider> LibraryProvider for CachingLibraryProvider<P> {
    fn find_library(
        &self,
        range: &LibraryRange,
        framework: &Framework,
        runtime_identifier: Option<&str>,
    ) -> Result<Option<ResolvedLibrary>, ProviderError> {
        let key = (
            range.canonical_key(),
            range.type_constraint.bits(),
            framework.clone(),
            runtime_identifier.map(str::to_string),
        );
        // The map guard is released before the lookup runs; only the slot stays locked.
        let slot = Arc::clone(&self.entries.entry(key).or_default());
        let mut cached = slot.lock();
        if let Some(found) = cached.as_ref() {
            return Ok(found.clone());
        }
        let found = self
            .inner
            .find_library(range, framework, runtime_identifier)?;
        *cached = Some(found.clone());
        Ok(found)
    }

    fn should_cancel(&self) -> Result<(), ProviderError> {
        self.inner.should_cancel()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rayon::prelude::*;
    use restore_versioning::VersionRange;

    use super::*;
    use crate::provider::OfflineLibraryProvider;

    struct Counting {
        inner: OfflineLibraryProvider,
        calls: AtomicUsize,
        fail: bool,
    }

    impl LibraryProvider for Counting {
        fn find_library(
            &self,
            range: &LibraryRange,
            framework: &Framework,
            runtime_identifier: Option<&str>,
        ) -> Result<Option<ResolvedLibrary>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("feed unreachable".into());
            }
            self.inner.find_library(range, framework, runtime_identifier)
        }
    }

    fn counting(fail: bool) -> CachingLibraryProvider<Counting> {
        let mut inner = OfflineLibraryProvider::new();
        inner.add_package("A", (1, 0, 0), []);
        CachingLibraryProvider::new(Counting {
            inner,
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[test]
    fn concurrent_requests_resolve_once() {
        let provider = counting(false);
        let framework: Framework = "net6.0".parse().unwrap();
        let range = LibraryRange::package("A", VersionRange::at_least((1, 0, 0)));
        (0..64).into_par_iter().for_each(|_| {
            let found = provider.find_library(&range, &framework, None).unwrap();
            assert!(found.is_some());
        });
        // Same request spelled differently shares the entry.
        let shouting = LibraryRange::package("a", "[1.0, )".parse().unwrap());
        provider.find_library(&shouting, &framework, None).unwrap();
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn faults_are_not_cached() {
        let provider = counting(true);
        let framework: Framework = "net6.0".parse().unwrap();
        let range = LibraryRange::package("A", VersionRange::at_least((1, 0, 0)));
        assert!(provider.find_library(&range, &framework, None).is_err());
        assert!(provider.find_library(&range, &framework, None).is_err());
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 2);
        assert!(provider.is_empty());
    }
}
