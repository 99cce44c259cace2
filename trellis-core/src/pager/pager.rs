//! Pager
//!
//! A Pager is one logical page/screen instance. It owns the page's reactive
//! observer and task queue, lazily-created module and shadow instances, and
//! the callback references for in-flight asynchronous bridge calls.
//!
//! Everything routed into a pager from the native side can legitimately
//! race teardown, so every entry point here degrades to a logged no-op once
//! the pager is destroyed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::bridge::{CallId, Value};
use crate::host::{ModuleInstance, ModuleResolver, ShadowInstance, ShadowResolver};
use crate::pager::lifecycle::LifecycleTracker;
use crate::reactive::Observer;
use crate::task::TaskManager;

/// Unique identifier for a pager, assigned by the host on page-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PagerId(u64);

impl PagerId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PagerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a pager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    Created,
    Active,
    Paused,
    Destroyed,
}

/// One pending asynchronous bridge callback. Invoked at most once.
pub struct CallbackSlot {
    pub call: CallId,
    pub reply: Box<dyn FnOnce(Value) + Send>,
}

type EventHandler = Arc<dyn Fn(i32, &str, &Value) + Send + Sync>;

/// One logical UI page instance.
pub struct Pager {
    id: PagerId,
    page_name: String,
    observer: Observer,
    tasks: Arc<TaskManager>,
    state: Mutex<PagerState>,
    trace: LifecycleTracker,

    /// Module instances, created lazily on first use.
    modules: RwLock<HashMap<String, Arc<dyn ModuleInstance>>>,

    /// Shadow instances, routed by view ref.
    shadows: RwLock<HashMap<i32, Arc<dyn ShadowInstance>>>,

    /// Pending async callbacks, keyed by token.
    callbacks: Mutex<HashMap<String, CallbackSlot>>,

    /// The page's native event hook, installed by the page factory.
    event_handler: RwLock<Option<EventHandler>>,

    module_resolver: Arc<dyn ModuleResolver>,
    shadow_resolver: Arc<dyn ShadowResolver>,
}

impl Pager {
    pub(crate) fn new(
        id: PagerId,
        page_name: String,
        observer: Observer,
        tasks: Arc<TaskManager>,
        module_resolver: Arc<dyn ModuleResolver>,
        shadow_resolver: Arc<dyn ShadowResolver>,
    ) -> Self {
        Self {
            id,
            page_name,
            observer,
            tasks,
            state: Mutex::new(PagerState::Created),
            trace: LifecycleTracker::new(),
            modules: RwLock::new(HashMap::new()),
            shadows: RwLock::new(HashMap::new()),
            callbacks: Mutex::new(HashMap::new()),
            event_handler: RwLock::new(None),
            module_resolver,
            shadow_resolver,
        }
    }

    pub fn id(&self) -> PagerId {
        self.id
    }

    pub fn page_name(&self) -> &str {
        &self.page_name
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn tasks(&self) -> &Arc<TaskManager> {
        &self.tasks
    }

    pub fn trace(&self) -> &LifecycleTracker {
        &self.trace
    }

    pub fn state(&self) -> PagerState {
        *self.state.lock()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == PagerState::Destroyed
    }

    pub(crate) fn set_state(&self, state: PagerState) {
        let mut guard = self.state.lock();
        if *guard != PagerState::Destroyed {
            *guard = state;
        }
    }

    /// Install the page's view-event hook. Typically called by the page
    /// factory during creation.
    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: Fn(i32, &str, &Value) + Send + Sync + 'static,
    {
        *self.event_handler.write() = Some(Arc::new(handler));
    }

    /// Deliver a native view event to the page.
    ///
    /// Silent no-op after destroy: native events race teardown. The
    /// handler is cloned out of its slot before it runs, so a handler may
    /// replace itself via [`Pager::set_event_handler`].
    pub fn fire_view_event(&self, view_ref: i32, event: &str, params: &Value) {
        if self.is_destroyed() {
            debug!(pager = self.id.raw(), event, "dropping view event for destroyed pager");
            return;
        }

        let handler = self.event_handler.read().clone();
        if let Some(handler) = handler {
            handler(view_ref, event, params);
        }
    }

    /// Notify shadow instances that a layout pass completed.
    pub fn fire_layout_view(&self) {
        if self.is_destroyed() {
            debug!(pager = self.id.raw(), "dropping layout notification for destroyed pager");
            return;
        }

        let shadows: Vec<Arc<dyn ShadowInstance>> =
            self.shadows.read().values().cloned().collect();
        for shadow in shadows {
            shadow.on_layout();
        }
    }

    /// Get (lazily creating) the module instance for `name`.
    pub fn acquire_module(&self, name: &str) -> Option<Arc<dyn ModuleInstance>> {
        if self.is_destroyed() {
            return None;
        }

        if let Some(module) = self.modules.read().get(name) {
            return Some(Arc::clone(module));
        }

        let created = self.module_resolver.create_module(self.id, name)?;
        self.modules
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&created));
        Some(created)
    }

    /// Create the shadow instance for `view_ref` from the named shadow kind.
    pub fn create_shadow(&self, view_ref: i32, name: &str) -> bool {
        if self.is_destroyed() {
            return false;
        }

        match self.shadow_resolver.create_shadow(self.id, name) {
            Some(shadow) => {
                self.shadows.write().insert(view_ref, shadow);
                true
            }
            None => {
                debug!(pager = self.id.raw(), name, "unknown shadow kind");
                false
            }
        }
    }

    pub fn shadow_for(&self, view_ref: i32) -> Option<Arc<dyn ShadowInstance>> {
        if self.is_destroyed() {
            return None;
        }
        self.shadows.read().get(&view_ref).cloned()
    }

    pub fn remove_shadow(&self, view_ref: i32) {
        if let Some(shadow) = self.shadows.write().remove(&view_ref) {
            shadow.destroy();
        }
    }

    /// Register a pending async callback. Dropped silently if the pager is
    /// already destroyed; a reply can never outlive its page.
    pub(crate) fn register_callback(&self, token: String, slot: CallbackSlot) {
        if self.is_destroyed() {
            debug!(pager = self.id.raw(), token, "dropping callback registration for destroyed pager");
            return;
        }
        self.callbacks.lock().insert(token, slot);
    }

    /// Take a pending callback. Each token yields its slot at most once.
    pub(crate) fn take_callback(&self, token: &str) -> Option<CallbackSlot> {
        self.callbacks.lock().remove(token)
    }

    /// Number of callbacks still pending. Diagnostic only.
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Tear the pager down: observer, task queue, callbacks, and module and
    /// shadow instances. Idempotent.
    pub fn destroy(&self) {
        {
            let mut state = self.state.lock();
            if *state == PagerState::Destroyed {
                return;
            }
            *state = PagerState::Destroyed;
        }

        self.observer.destroy();
        self.tasks.destroy();
        self.callbacks.lock().clear();

        let modules: Vec<Arc<dyn ModuleInstance>> =
            self.modules.write().drain().map(|(_, m)| m).collect();
        for module in modules {
            module.destroy();
        }

        let shadows: Vec<Arc<dyn ShadowInstance>> =
            self.shadows.write().drain().map(|(_, s)| s).collect();
        for shadow in shadows {
            shadow.destroy();
        }
    }
}

impl std::fmt::Debug for Pager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("id", &self.id)
            .field("page_name", &self.page_name)
            .field("state", &self.state())
            .field("pending_callbacks", &self.pending_callbacks())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InlineTimer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoModules;

    impl ModuleResolver for NoModules {
        fn create_module(&self, _pager: PagerId, _name: &str) -> Option<Arc<dyn ModuleInstance>> {
            None
        }
    }

    struct CountingShadows {
        created: AtomicUsize,
    }

    struct CountingShadow {
        layouts: Arc<AtomicUsize>,
    }

    impl ShadowInstance for CountingShadow {
        fn call(&self, _method: &str, _args: &[Value]) -> Value {
            Value::Null
        }

        fn on_layout(&self) {
            self.layouts.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ShadowFactory {
        layouts: Arc<AtomicUsize>,
    }

    impl ShadowResolver for ShadowFactory {
        fn create_shadow(&self, _pager: PagerId, name: &str) -> Option<Arc<dyn ShadowInstance>> {
            if name == "text" {
                Some(Arc::new(CountingShadow {
                    layouts: Arc::clone(&self.layouts),
                }))
            } else {
                None
            }
        }
    }

    fn pager_with(layouts: Arc<AtomicUsize>) -> Pager {
        let tasks = Arc::new(TaskManager::new(Arc::new(InlineTimer)));
        let observer = Observer::new(Arc::clone(&tasks));
        Pager::new(
            PagerId::from(1),
            "home".to_string(),
            observer,
            tasks,
            Arc::new(NoModules),
            Arc::new(ShadowFactory { layouts }),
        )
    }

    #[test]
    fn view_events_reach_the_handler_until_destroy() {
        let pager = pager_with(Arc::new(AtomicUsize::new(0)));
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = Arc::clone(&seen);
        pager.set_event_handler(move |_, event, _| {
            assert_eq!(event, "tap");
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        pager.fire_view_event(7, "tap", &Value::Null);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        pager.destroy();
        pager.fire_view_event(7, "tap", &Value::Null);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_handler_may_replace_itself_mid_event() {
        let pager = Arc::new(pager_with(Arc::new(AtomicUsize::new(0))));
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        // The page swaps its handler on the first event it receives.
        let seen_outer = Arc::clone(&seen);
        let pager_ref = Arc::clone(&pager);
        pager.set_event_handler(move |_, _, _| {
            seen_outer.lock().push("first");
            let seen_inner = Arc::clone(&seen_outer);
            pager_ref.set_event_handler(move |_, _, _| {
                seen_inner.lock().push("second");
            });
        });

        pager.fire_view_event(1, "tap", &Value::Null);
        pager.fire_view_event(1, "tap", &Value::Null);

        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn shadows_route_by_view_ref_and_hear_layout() {
        let layouts = Arc::new(AtomicUsize::new(0));
        let pager = pager_with(Arc::clone(&layouts));

        assert!(pager.create_shadow(10, "text"));
        assert!(!pager.create_shadow(11, "unknown"));
        assert!(pager.shadow_for(10).is_some());
        assert!(pager.shadow_for(11).is_none());

        pager.fire_layout_view();
        assert_eq!(layouts.load(Ordering::SeqCst), 1);

        pager.remove_shadow(10);
        pager.fire_layout_view();
        assert_eq!(layouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_yield_at_most_once() {
        let pager = pager_with(Arc::new(AtomicUsize::new(0)));

        pager.register_callback(
            "cb-1".to_string(),
            CallbackSlot {
                call: CallId::from(1),
                reply: Box::new(|_| {}),
            },
        );

        assert!(pager.take_callback("cb-1").is_some());
        assert!(pager.take_callback("cb-1").is_none());
    }

    #[test]
    fn destroy_is_idempotent_and_clears_everything() {
        let pager = pager_with(Arc::new(AtomicUsize::new(0)));
        pager.register_callback(
            "cb-1".to_string(),
            CallbackSlot {
                call: CallId::from(1),
                reply: Box::new(|_| {}),
            },
        );
        pager.create_shadow(1, "text");

        pager.destroy();
        pager.destroy();

        assert_eq!(pager.state(), PagerState::Destroyed);
        assert_eq!(pager.pending_callbacks(), 0);
        assert!(pager.shadow_for(1).is_none());
        assert!(pager.observer().is_destroyed());
        assert!(pager.tasks().is_destroyed());
        assert!(pager.acquire_module("anything").is_none());
    }
}
