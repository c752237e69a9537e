//! The allocator catalog of spec §6: a configurable mapping from allocator/releaser/reallocator
//! function names to the role ownership inference should assign them.

use rustc_hash::FxHashMap;

/// The role a recognized C library function plays with respect to ownership inference.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocatorRole {
    /// Allocates a single object; the returned pointer seeds a fresh ownership token.
    AllocatesOne,
    /// Allocates a contiguous run of objects; the returned pointer seeds an `OwningArray` token.
    AllocatesArray,
    /// Releases whatever token the argument pointer currently holds.
    Releases,
    /// Consumes the token held by its first argument and produces a fresh token for its result
    /// (the old token does not survive even if the address is unchanged).
    Reallocates,
}

/// Maps allocator/releaser/reallocator function names to their [`AllocatorRole`].
///
/// `default()` seeds the standard C library's allocation family; callers extend it with
/// project-specific wrappers (e.g. `xmalloc`, custom arena allocators) before running inference.
#[derive(Debug, Clone)]
pub struct AllocatorCatalog {
    roles: FxHashMap<Box<str>, AllocatorRole>,
}

impl AllocatorCatalog {
    pub fn empty() -> Self {
        Self {
            roles: FxHashMap::default(),
        }
    }

    pub fn role(&self, function_name: &str) -> Option<AllocatorRole> {
        self.roles.get(function_name).copied()
    }

    pub fn register(&mut self, function_name: impl Into<Box<str>>, role: AllocatorRole) {
        self.roles.insert(function_name.into(), role);
    }

    pub fn is_allocator(&self, function_name: &str) -> bool {
        matches!(
            self.role(function_name),
            Some(AllocatorRole::AllocatesOne | AllocatorRole::AllocatesArray)
        )
    }

    pub fn is_releaser(&self, function_name: &str) -> bool {
        matches!(self.role(function_name), Some(AllocatorRole::Releases))
    }

    pub fn is_reallocator(&self, function_name: &str) -> bool {
        matches!(self.role(function_name), Some(AllocatorRole::Reallocates))
    }
}

impl Default for AllocatorCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register("malloc", AllocatorRole::AllocatesOne);
        catalog.register("calloc", AllocatorRole::AllocatesArray);
        catalog.register("realloc", AllocatorRole::Reallocates);
        catalog.register("reallocarray", AllocatorRole::Reallocates);
        catalog.register("free", AllocatorRole::Releases);
        catalog.register("strdup", AllocatorRole::AllocatesArray);
        catalog.register("strndup", AllocatorRole::AllocatesArray);
        catalog.register("aligned_alloc", AllocatorRole::AllocatesOne);
        catalog
    }
}

/// The role a recognized POSIX threading function plays in codegen (spec §9 "Concurrency").
///
/// `ThreadSpawn`/`ThreadJoin` lower to real `std::thread` calls. `MutexOp` is elided entirely:
/// the global a mutex guards is already wrapped in its own `Mutex` by [`super`]'s global-mutation
/// analysis (spec §9 "Global mutable state"), and every read or write of that global already takes
/// its guard at the access site, so the original lock/unlock call sites have nothing left to do.
/// `CondOp` is recognized so a condition-variable call doesn't fall through as an unresolved
/// function, but is not lowered — see `DESIGN.md`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncRole {
    /// Spawns a new thread running the given start routine, e.g. `pthread_create`.
    ThreadSpawn,
    /// Blocks until a previously spawned thread finishes, e.g. `pthread_join`.
    ThreadJoin,
    /// A mutex lock/unlock/init/destroy call; elided, see above.
    MutexOp,
    /// A condition-variable call; recognized but not lowered.
    CondOp,
}

/// Maps POSIX threading function names to their [`SyncRole`], the concurrency counterpart of
/// [`AllocatorCatalog`].
#[derive(Debug, Clone)]
pub struct SyncCatalog {
    roles: FxHashMap<Box<str>, SyncRole>,
}

impl SyncCatalog {
    pub fn empty() -> Self {
        Self { roles: FxHashMap::default() }
    }

    pub fn role(&self, function_name: &str) -> Option<SyncRole> {
        self.roles.get(function_name).copied()
    }

    pub fn register(&mut self, function_name: impl Into<Box<str>>, role: SyncRole) {
        self.roles.insert(function_name.into(), role);
    }
}

impl Default for SyncCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register("pthread_create", SyncRole::ThreadSpawn);
        catalog.register("pthread_join", SyncRole::ThreadJoin);
        catalog.register("pthread_mutex_lock", SyncRole::MutexOp);
        catalog.register("pthread_mutex_unlock", SyncRole::MutexOp);
        catalog.register("pthread_mutex_init", SyncRole::MutexOp);
        catalog.register("pthread_mutex_destroy", SyncRole::MutexOp);
        catalog.register("pthread_cond_wait", SyncRole::CondOp);
        catalog.register("pthread_cond_signal", SyncRole::CondOp);
        catalog.register("pthread_cond_broadcast", SyncRole::CondOp);
        catalog.register("pthread_cond_init", SyncRole::CondOp);
        catalog.register("pthread_cond_destroy", SyncRole::CondOp);
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_standard_family() {
        let catalog = AllocatorCatalog::default();
        assert!(catalog.is_allocator("malloc"));
        assert!(catalog.is_allocator("calloc"));
        assert!(catalog.is_reallocator("realloc"));
        assert!(catalog.is_releaser("free"));
        assert_eq!(catalog.role("frobnicate"), None);
    }

    #[test]
    fn user_extensions_are_respected() {
        let mut catalog = AllocatorCatalog::default();
        catalog.register("xmalloc", AllocatorRole::AllocatesOne);
        assert!(catalog.is_allocator("xmalloc"));
    }

    #[test]
    fn sync_catalog_covers_pthread_family() {
        let catalog = SyncCatalog::default();
        assert_eq!(catalog.role("pthread_create"), Some(SyncRole::ThreadSpawn));
        assert_eq!(catalog.role("pthread_join"), Some(SyncRole::ThreadJoin));
        assert_eq!(catalog.role("pthread_mutex_lock"), Some(SyncRole::MutexOp));
        assert_eq!(catalog.role("pthread_cond_wait"), Some(SyncRole::CondOp));
        assert_eq!(catalog.role("frobnicate"), None);
    }
}
