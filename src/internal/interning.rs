// SPDX-License-Identifier: MPL-2.0

//! Dense indices for library names and library ranges.
//!
//! The walker compares requests millions of times on large graphs. Interning turns each
//! distinct name or range into an [Id] so that those comparisons, and every map keyed by
//! them, work on small integers.

use std::marker::PhantomData;

use crate::internal::arena::Id;
use crate::library::{LibraryDependency, LibraryRange};
use crate::type_aliases::Map;

/// One per distinct [LibraryRange::canonical_key].
pub type LibraryRangeIndex = Id<LibraryRange>;

/// One per distinct library name, ignoring case.
pub type LibraryDependencyIndex = Id<LibraryDependency>;

/// Maps canonical keys to sequential ids. Ids are never reused or removed.
#[derive(Debug)]
pub struct InterningTable<T> {
    ids: Map<String, Id<T>>,
    keys: Vec<String>,
    _ty: PhantomData<fn() -> T>,
}

impl<T> Default for InterningTable<T> {
    fn default() -> Self {
        Self {
            ids: Map::default(),
            keys: Vec::new(),
            _ty: PhantomData,
        }
    }
}

impl<T> InterningTable<T> {
    fn intern_key(&mut self, key: String) -> Id<T> {
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }
        let id = Id::from_raw(self.keys.len());
        self.keys.push(key.clone());
        self.ids.insert(key, id);
        id
    }

    /// Canonical key behind `id`.
    #[cfg(test)]
    pub fn key(&self, id: Id<T>) -> &str {
        &self.keys[id.into_raw()]
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

impl InterningTable<LibraryRange> {
    pub fn intern(&mut self, range: &LibraryRange) -> LibraryRangeIndex {
        self.intern_key(range.canonical_key())
    }
}

impl InterningTable<LibraryDependency> {
    pub fn intern(&mut self, name: &str) -> LibraryDependencyIndex {
        self.intern_key(name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use restore_versioning::VersionRange;

    use super::*;
    use crate::library::LibraryDependencyTarget;

    #[test]
    fn names_ignore_case() {
        let mut table = InterningTable::<LibraryDependency>::default();
        let a = table.intern("PackageA");
        let b = table.intern("PackageB");
        assert_eq!(table.intern("packagea"), a);
        assert_ne!(a, b);
        assert_eq!(a.into_raw(), 0);
        assert_eq!(b.into_raw(), 1);
        assert_eq!(table.key(b), "packageb");
    }

    #[test]
    fn ranges_intern_by_canonical_form() {
        let mut table = InterningTable::<LibraryRange>::default();
        let a = table.intern(&LibraryRange::package("A", VersionRange::at_least((1, 0, 0))));
        let again = table.intern(&LibraryRange::new(
            "a",
            Some("1.0".parse().unwrap()),
            LibraryDependencyTarget::PACKAGE_PROJECT_EXTERNAL,
        ));
        let exact = table.intern(&LibraryRange::package("A", VersionRange::exact((1, 0, 0))));
        assert_eq!(a, again);
        assert_ne!(a, exact);
        assert_eq!(table.len(), 2);
    }
}
