//! Cache of presentation instances that outlive their views.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::domain::ProviderKind;

/// A presentation instance that holds resources until disposed.
pub trait Disposable {
    fn dispose(self);
}

/// One cached view instance.
#[derive(Debug)]
pub struct CachedInstance<T> {
    pub instance: T,
    /// Visual state captured when the view was detached
    pub serialized_state: Option<String>,
    /// Provider the instance was rendering for
    pub provider: ProviderKind,
}

impl<T> CachedInstance<T> {
    pub fn new(instance: T, provider: ProviderKind) -> Self {
        Self {
            instance,
            serialized_state: None,
            provider,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.serialized_state = Some(state.into());
        self
    }
}

/// Keeps detached view instances keyed by session id.
///
/// Every instance that leaves the cache without being handed back to the
/// caller is disposed.
#[derive(Debug)]
pub struct InstanceCache<T: Disposable> {
    entries: HashMap<String, CachedInstance<T>>,
    /// Skip-cache flags and when they lapse
    skip_until: HashMap<String, Instant>,
    skip_window: Duration,
}

impl<T: Disposable> InstanceCache<T> {
    pub fn new(skip_window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            skip_until: HashMap::new(),
            skip_window,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&CachedInstance<T>> {
        self.entries.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut CachedInstance<T>> {
        self.entries.get_mut(session_id)
    }

    /// Cache an instance. Returns `false` if it was disposed instead.
    ///
    /// A pending skip flag is consumed here: the incoming instance and any
    /// entry already cached for the id are both disposed.
    pub fn set(&mut self, session_id: &str, entry: CachedInstance<T>) -> bool {
        if self.take_skip(session_id) {
            tracing::debug!(session_id, "skip flag set, disposing instead of caching");
            entry.instance.dispose();
            if let Some(old) = self.entries.remove(session_id) {
                old.instance.dispose();
            }
            return false;
        }

        if let Some(old) = self.entries.insert(session_id.to_string(), entry) {
            old.instance.dispose();
        }
        true
    }

    /// Hand an entry back to the caller without disposing it.
    pub fn remove(&mut self, session_id: &str) -> Option<CachedInstance<T>> {
        self.entries.remove(session_id)
    }

    /// Dispose the entry for a session (e.g. when the session exits).
    pub fn dispose(&mut self, session_id: &str) -> bool {
        self.skip_until.remove(session_id);
        match self.entries.remove(session_id) {
            Some(entry) => {
                entry.instance.dispose();
                true
            }
            None => false,
        }
    }

    /// Dispose the entry if it was rendering a different provider.
    pub fn invalidate_provider(&mut self, session_id: &str, provider: ProviderKind) -> bool {
        let stale = self
            .entries
            .get(session_id)
            .is_some_and(|entry| entry.provider != provider);
        if stale {
            tracing::debug!(session_id, %provider, "provider changed, dropping cached instance");
            self.dispose(session_id);
        }
        stale
    }

    /// Don't cache the next instance set for this session.
    ///
    /// The flag lapses after the skip window if nothing consumes it.
    pub fn mark_skip(&mut self, session_id: &str) {
        let now = Instant::now();
        self.prune_skips(now);
        self.skip_until
            .insert(session_id.to_string(), now + self.skip_window);
    }

    pub fn is_skipping(&self, session_id: &str) -> bool {
        self.skip_until
            .get(session_id)
            .is_some_and(|until| Instant::now() < *until)
    }

    fn take_skip(&mut self, session_id: &str) -> bool {
        let now = Instant::now();
        let skip = self
            .skip_until
            .remove(session_id)
            .is_some_and(|until| now < until);
        self.prune_skips(now);
        skip
    }

    /// Forget flags that lapsed without being consumed.
    fn prune_skips(&mut self, now: Instant) {
        self.skip_until.retain(|_, until| now < *until);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dispose everything.
    pub fn clear(&mut self) {
        self.skip_until.clear();
        for (_, entry) in self.entries.drain() {
            entry.instance.dispose();
        }
    }
}

impl<T: Disposable> Drop for InstanceCache<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct View {
        name: &'static str,
        disposed: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Disposable for View {
        fn dispose(self) {
            self.disposed.borrow_mut().push(self.name);
        }
    }

    struct Fixture {
        disposed: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                disposed: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn view(&self, name: &'static str) -> CachedInstance<View> {
            CachedInstance::new(
                View {
                    name,
                    disposed: self.disposed.clone(),
                },
                ProviderKind::Claude,
            )
        }

        fn disposed(&self) -> Vec<&'static str> {
            self.disposed.borrow().clone()
        }
    }

    #[test]
    fn test_set_and_get() {
        let fx = Fixture::new();
        let mut cache = InstanceCache::new(Duration::from_secs(2));
        assert!(cache.set("t1", fx.view("a").with_state("scroll=10")));

        let entry = cache.get("t1").unwrap();
        assert_eq!(entry.instance.name, "a");
        assert_eq!(entry.serialized_state.as_deref(), Some("scroll=10"));
        assert!(fx.disposed().is_empty());
    }

    #[test]
    fn test_overwrite_disposes_previous() {
        let fx = Fixture::new();
        let mut cache = InstanceCache::new(Duration::from_secs(2));
        cache.set("t1", fx.view("a"));
        cache.set("t1", fx.view("b"));
        assert_eq!(fx.disposed(), vec!["a"]);
        assert_eq!(cache.get("t1").unwrap().instance.name, "b");
    }

    #[test]
    fn test_skip_flag_disposes_incoming_and_cached() {
        let fx = Fixture::new();
        let mut cache = InstanceCache::new(Duration::from_secs(2));
        cache.set("t1", fx.view("old"));
        cache.mark_skip("t1");
        assert!(cache.is_skipping("t1"));

        assert!(!cache.set("t1", fx.view("new")));
        assert_eq!(fx.disposed(), vec!["new", "old"]);
        assert!(cache.get("t1").is_none());

        // Consumed
        assert!(!cache.is_skipping("t1"));
        assert!(cache.set("t1", fx.view("after")));
    }

    #[test]
    fn test_skip_flag_lapses() {
        let fx = Fixture::new();
        let mut cache = InstanceCache::new(Duration::ZERO);
        cache.mark_skip("t1");
        assert!(!cache.is_skipping("t1"));
        assert!(cache.set("t1", fx.view("a")));
        assert!(fx.disposed().is_empty());
    }

    #[test]
    fn test_lapsed_skip_flags_are_forgotten() {
        let fx = Fixture::new();
        let mut cache = InstanceCache::new(Duration::ZERO);
        for id in ["t1", "t2", "t3"] {
            cache.mark_skip(id);
        }
        assert_eq!(cache.skip_until.len(), 1);

        assert!(cache.set("t4", fx.view("a")));
        assert!(cache.skip_until.is_empty());
    }

    #[test]
    fn test_invalidate_provider() {
        let fx = Fixture::new();
        let mut cache = InstanceCache::new(Duration::from_secs(2));
        cache.set("t1", fx.view("a"));

        assert!(!cache.invalidate_provider("t1", ProviderKind::Claude));
        assert!(cache.invalidate_provider("t1", ProviderKind::Codex));
        assert_eq!(fx.disposed(), vec!["a"]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_hands_back_without_disposing() {
        let fx = Fixture::new();
        let mut cache = InstanceCache::new(Duration::from_secs(2));
        cache.set("t1", fx.view("a"));
        let entry = cache.remove("t1").unwrap();
        assert_eq!(entry.instance.name, "a");
        assert!(fx.disposed().is_empty());
        assert!(!cache.dispose("t1"));
    }

    #[test]
    fn test_drop_disposes_everything() {
        let fx = Fixture::new();
        {
            let mut cache = InstanceCache::new(Duration::from_secs(2));
            cache.set("t1", fx.view("a"));
            cache.set("t2", fx.view("b"));
        }
        let mut disposed = fx.disposed();
        disposed.sort_unstable();
        assert_eq!(disposed, vec!["a", "b"]);
    }
}
