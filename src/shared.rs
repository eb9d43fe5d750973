use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::RegistryError;
use crate::factory::ResourceFactory;
use crate::handle::Handle;
use crate::parents::Parents;
use crate::registry::Registry;

/// A [`Registry`] that can be handed to several threads.
///
/// Lookup, registration, destroy, cleanup and compaction all take the same
/// lock, so a destroy and the sweep that follows it can never interleave with
/// a registration naming one of the nodes being torn down.
pub struct SharedRegistry<F: ResourceFactory> {
    pub(crate) ptr: Arc<Mutex<Registry<F>>>,
}

impl<F: ResourceFactory> Clone for SharedRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            ptr: Arc::clone(&self.ptr),
        }
    }
}

impl<F: ResourceFactory> From<Registry<F>> for SharedRegistry<F> {
    fn from(registry: Registry<F>) -> Self {
        Self {
            ptr: Arc::new(Mutex::new(registry)),
        }
    }
}

impl<F: ResourceFactory> SharedRegistry<F> {
    pub fn new(factory: F) -> Self {
        Registry::new(factory).into()
    }

    /// A panic inside the factory leaves the node marked as destroyed (the
    /// resource is moved out before `free` runs), so a poisoned lock still
    /// guards consistent bookkeeping.
    fn lock(&self) -> MutexGuard<'_, Registry<F>> {
        self.ptr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the registry.
    pub fn with<T>(&self, f: impl FnOnce(&mut Registry<F>) -> T) -> T {
        f(&mut self.lock())
    }

    pub fn register<P: Parents>(&self, resource: F::Resource, parents: P) -> Result<Handle, RegistryError> {
        self.lock().register(resource, parents)
    }

    pub fn try_register_with<P, A, E>(&self, parents: P, alloc: A) -> Result<Handle, RegistryError>
    where
        P: Parents,
        A: FnOnce(&mut F) -> Result<F::Resource, E>,
        E: Into<anyhow::Error>,
    {
        self.lock().try_register_with(parents, alloc)
    }

    pub fn destroy(&self, handle: Handle) -> usize {
        self.lock().destroy(handle)
    }

    pub fn cleanup(&self, handle: Handle) -> usize {
        self.lock().cleanup(handle)
    }

    pub fn compact(&self) -> usize {
        self.lock().compact()
    }

    pub fn assign(&self, slot: &mut Option<Handle>, value: Handle) -> Result<usize, RegistryError> {
        self.lock().assign(slot, value)
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.lock().is_live(handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[derive(Default)]
    struct Counter(Arc<AtomicUsize>);

    impl ResourceFactory for Counter {
        type Resource = usize;

        fn free(&mut self, _: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_threads_share_one_registry() {
        let freed = Arc::new(AtomicUsize::new(0));
        let shared = SharedRegistry::new(Counter(freed.clone()));
        let root = shared.register(0, ()).unwrap();

        let workers: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        let a = shared.register(t * 100 + i, root).unwrap();
                        let b = shared.register(t * 100 + i, (a, root)).unwrap();
                        shared.destroy(b);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        // The first cascade frees the shared root, later ones skip it.
        assert_eq!(freed.load(Ordering::SeqCst), 1 + 4 * 25 * 2);
        assert!(!shared.is_live(root));

        shared.compact();
        assert!(shared.is_empty());
    }

    /// Panics when asked to free `13`, counting every attempt.
    struct Faulty {
        attempts: Arc<AtomicUsize>,
        freed: Arc<AtomicUsize>,
    }

    impl ResourceFactory for Faulty {
        type Resource = usize;

        fn free(&mut self, resource: usize) {
            if resource == 13 {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                panic!("backend failed to free {resource}");
            }
            self.freed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_panicking_free_is_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let freed = Arc::new(AtomicUsize::new(0));
        let shared = SharedRegistry::new(Faulty {
            attempts: attempts.clone(),
            freed: freed.clone(),
        });

        let a = shared.register(1, ()).unwrap();
        let bad = shared.register(13, a).unwrap();
        let other = shared.register(2, ()).unwrap();

        let worker = {
            let shared = shared.clone();
            thread::spawn(move || shared.destroy(bad))
        };
        assert!(worker.join().is_err());
        assert!(shared.ptr.is_poisoned());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(freed.load(Ordering::SeqCst), 1);

        let retry = {
            let shared = shared.clone();
            thread::spawn(move || (shared.destroy(bad), shared.is_live(bad), shared.destroy(other)))
        };
        assert_eq!(retry.join().unwrap(), (0, false, 1));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(freed.load(Ordering::SeqCst), 2);

        shared.compact();
        assert!(shared.is_empty());
    }

    #[test]
    fn test_with_exposes_registry() {
        let shared = SharedRegistry::new(Counter::default());
        let a = shared.register(7, ()).unwrap();
        let value = shared.with(|reg| reg.get(a).copied());
        assert_eq!(value, Some(7));

        let mut slot = Some(a);
        let b = shared.register(8, ()).unwrap();
        assert_eq!(shared.assign(&mut slot, b).unwrap(), 1);
        assert_eq!(shared.len(), 1);
    }
}
