//! Compiled-kernel cache.
//!
//! Programs are keyed by their full [`KernelSignature`], so the same
//! operation on different element types compiles separately. Entries are
//! never evicted.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::trace;

use crate::backend::Program;
use crate::renderer::KernelSignature;

pub struct KernelCache<K: ?Sized = dyn Program> {
    cache: RwLock<HashMap<KernelSignature, Arc<K>>>,
}

impl<K: ?Sized> KernelCache<K> {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, sig: &KernelSignature) -> Option<Arc<K>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sig)
            .cloned()
    }

    /// Returns the cached entry, or builds and inserts it.
    ///
    /// The build runs under the write lock after a second lookup, so
    /// concurrent first use of a signature builds it exactly once. A failed
    /// build leaves no entry behind.
    pub fn get_or_insert_with<F, E>(&self, sig: &KernelSignature, build: F) -> Result<Arc<K>, E>
    where
        F: FnOnce() -> Result<Arc<K>, E>,
    {
        if let Some(kernel) = self.get(sig) {
            trace!("kernel cache hit: {sig}");
            return Ok(kernel);
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(kernel) = cache.get(sig) {
            trace!("kernel cache hit after wait: {sig}");
            return Ok(Arc::clone(kernel));
        }

        let kernel = build()?;
        cache.insert(sig.clone(), Arc::clone(&kernel));
        Ok(kernel)
    }

    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: ?Sized> Default for KernelCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::ScalarType;
    use crate::ops::Operation;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn plus(ty: ScalarType) -> KernelSignature {
        KernelSignature::binary(Operation::Plus, ty, ty, ty)
    }

    #[test]
    fn test_kernel_cache_get_or_insert() {
        let cache: KernelCache<String> = KernelCache::new();
        assert!(cache.is_empty());

        let result: Result<_, ()> =
            cache.get_or_insert_with(&plus(ScalarType::I32), || Ok(Arc::new("int".to_string())));
        assert_eq!(*result.unwrap(), "int");

        // Second lookup is served from the cache
        let mut called = false;
        let result: Result<_, ()> = cache.get_or_insert_with(&plus(ScalarType::I32), || {
            called = true;
            Ok(Arc::new("other".to_string()))
        });
        assert!(!called);
        assert_eq!(*result.unwrap(), "int");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_kernel_cache_keys_on_types() {
        let cache: KernelCache<str> = KernelCache::new();
        let _ = cache.get_or_insert_with(&plus(ScalarType::I32), || Ok::<_, ()>(Arc::from("int")));
        let float = cache
            .get_or_insert_with(&plus(ScalarType::F32), || Ok::<_, ()>(Arc::from("float")))
            .unwrap();
        assert_eq!(&*float, "float");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache: KernelCache<u32> = KernelCache::new();
        let sig = plus(ScalarType::U8);

        let result = cache.get_or_insert_with(&sig, || Err("build log"));
        assert_eq!(result.unwrap_err(), "build log");
        assert!(cache.get(&sig).is_none());

        let result: Result<_, &str> = cache.get_or_insert_with(&sig, || Ok(Arc::new(7)));
        assert_eq!(*result.unwrap(), 7);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let cache: Arc<KernelCache<usize>> = Arc::new(KernelCache::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let sig = plus(ScalarType::I64);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                let sig = sig.clone();
                thread::spawn(move || {
                    cache
                        .get_or_insert_with(&sig, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, ()>(Arc::new(1))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(*handle.join().unwrap(), 1);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
