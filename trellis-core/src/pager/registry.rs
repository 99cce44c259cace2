//! Runtime Registry
//!
//! [`CoreRuntime`] is the single entry point the host holds: it owns the
//! page factory table, the live pager table, and the bridge channel, and
//! routes every host-side notification (view events, callbacks, layout,
//! lifecycle stages) to the owning pager.
//!
//! # Routing Rules
//!
//! Creation is strict: opening a page whose name has no registered factory
//! is a host wiring bug and fails with [`CoreError::PagerNotFound`].
//! Notifications are lenient: events, callbacks, and layout signals for an
//! unknown or destroyed pager race teardown by design and degrade to logged
//! no-ops.
//!
//! # Thread Safety
//!
//! The factory table sits behind a `RwLock` (registration is rare, lookup
//! is per-page-open). The pager table is a `DashMap` so notifications from
//! different pagers never contend.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::bridge::{BridgeChannel, BridgeMethod, CallbackRef, Value};
use crate::error::CoreError;
use crate::host::{HostBindings, LifecycleMonitor, NativeViewRef};
use crate::pager::lifecycle::LifecycleStage;
use crate::pager::pager::{Pager, PagerId, PagerState};
use crate::reactive::Observer;
use crate::task::TaskManager;

/// Builds one page's logic onto a freshly created pager: installs the
/// event handler, creates properties and watchers, issues initial bridge
/// calls. Receives the host-supplied init payload.
///
/// Factories are shared so they can be cloned out of the table and run
/// without holding it; a factory may register pages or open sub-pages.
pub type PageFactory = Arc<dyn Fn(&Arc<Pager>, &Value) + Send + Sync>;

/// The runtime registry: page factories, live pagers, and the bridge.
pub struct CoreRuntime {
    host: HostBindings,
    channel: BridgeChannel,
    factories: RwLock<HashMap<String, PageFactory>>,
    pagers: DashMap<PagerId, Arc<Pager>>,
    monitor: RwLock<Option<Arc<dyn LifecycleMonitor>>>,
}

impl CoreRuntime {
    pub fn new(host: HostBindings) -> Self {
        let channel = BridgeChannel::new(Arc::clone(&host.renderer));
        Self {
            host,
            channel,
            factories: RwLock::new(HashMap::new()),
            pagers: DashMap::new(),
            monitor: RwLock::new(None),
        }
    }

    pub fn set_lifecycle_monitor(&self, monitor: Arc<dyn LifecycleMonitor>) {
        *self.monitor.write() = Some(monitor);
    }

    /// Register a page factory under `name`. Names are case-insensitive;
    /// re-registering replaces the previous factory.
    pub fn register_page<F>(&self, name: &str, factory: F)
    where
        F: Fn(&Arc<Pager>, &Value) + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(name.to_ascii_lowercase(), Arc::new(factory));
    }

    pub fn unregister_page(&self, name: &str) {
        self.factories.write().remove(&name.to_ascii_lowercase());
    }

    pub fn has_page(&self, name: &str) -> bool {
        self.factories
            .read()
            .contains_key(&name.to_ascii_lowercase())
    }

    /// Create and wire a pager for the named page.
    ///
    /// The pager id is assigned by the host on page-open. If a pager with
    /// the same id is still alive it is torn down and replaced; the host's
    /// id space restarting is treated as the old page being gone.
    pub fn create_pager(
        &self,
        id: PagerId,
        name: &str,
        init: &Value,
    ) -> Result<Arc<Pager>, CoreError> {
        let tasks = Arc::new(TaskManager::new(Arc::clone(&self.host.timer)));
        let observer = Observer::new(Arc::clone(&tasks));

        // Clone the factory out before running it: factories may register
        // pages or open sub-pages, which re-enters the table.
        let factory = self
            .factories
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned();
        let Some(factory) = factory else {
            // Unwind the half-built page before reporting.
            observer.destroy();
            tasks.destroy();
            return Err(CoreError::PagerNotFound {
                name: name.to_string(),
            });
        };

        let pager = Arc::new(Pager::new(
            id,
            name.to_string(),
            observer,
            tasks,
            Arc::clone(&self.host.modules),
            Arc::clone(&self.host.shadows),
        ));
        factory(&pager, init);

        if let Some(displaced) = self.pagers.insert(id, Arc::clone(&pager)) {
            debug!(pager = id.raw(), "replacing live pager with reused id");
            self.channel.release_pager(id);
            displaced.destroy();
        }

        info!(pager = id.raw(), page = name, "pager created");
        Ok(pager)
    }

    /// Tear down a pager and release its in-flight bridge calls. Unknown
    /// ids are a silent no-op; destruction can race itself.
    pub fn destroy_pager(&self, id: PagerId) {
        match self.pagers.remove(&id) {
            Some((_, pager)) => {
                self.channel.release_pager(id);
                pager.destroy();
                info!(pager = id.raw(), page = pager.page_name(), "pager destroyed");
            }
            None => {
                debug!(pager = id.raw(), "destroy for unknown pager");
            }
        }
    }

    pub fn pager(&self, id: PagerId) -> Option<Arc<Pager>> {
        self.pagers.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Checked accessor for a pager's live reactive observer.
    ///
    /// A missing pager and a torn-down observer both mean no reactive
    /// graph exists behind the id; callers that require one get a hard
    /// error instead of a silently dead handle.
    pub fn observer_for(&self, id: PagerId) -> Result<Observer, CoreError> {
        match self.pager(id) {
            Some(pager) if !pager.observer().is_destroyed() => Ok(pager.observer().clone()),
            _ => Err(CoreError::ObserverNotFound { id }),
        }
    }

    pub fn pager_count(&self) -> usize {
        self.pagers.len()
    }

    pub fn channel(&self) -> &BridgeChannel {
        &self.channel
    }

    /// Report a lifecycle stage from the host. Marks the pager's trace,
    /// updates its coarse state, and forwards to the monitor, if any.
    /// `Destroy` routes through [`CoreRuntime::destroy_pager`].
    pub fn on_lifecycle_event(&self, id: PagerId, stage: LifecycleStage) {
        if stage == LifecycleStage::Destroy {
            if let Some(pager) = self.pager(id) {
                pager.trace().mark(stage);
            }
            self.destroy_pager(id);
            self.notify_monitor(id, stage);
            return;
        }

        let Some(pager) = self.pager(id) else {
            debug!(pager = id.raw(), stage = stage.as_str(), "lifecycle event for unknown pager");
            return;
        };

        pager.trace().mark(stage);
        match stage {
            LifecycleStage::Resume => pager.set_state(PagerState::Active),
            LifecycleStage::Pause => pager.set_state(PagerState::Paused),
            _ => {}
        }
        self.notify_monitor(id, stage);
    }

    /// Deliver a native view event to the owning pager.
    pub fn fire_view_event(&self, id: PagerId, view_ref: i32, event: &str, params: &Value) {
        match self.pager(id) {
            Some(pager) => pager.fire_view_event(view_ref, event, params),
            None => debug!(pager = id.raw(), event, "view event for unknown pager"),
        }
    }

    /// Deliver an async bridge reply to the owning pager.
    pub fn fire_callback(&self, id: PagerId, token: &str, value: Value) {
        match self.pager(id) {
            Some(pager) => self.channel.complete(&pager, token, value),
            None => debug!(pager = id.raw(), token, "callback for unknown pager"),
        }
    }

    /// Notify a pager's shadows that a layout pass completed.
    pub fn fire_layout_view(&self, id: PagerId) {
        match self.pager(id) {
            Some(pager) => pager.fire_layout_view(),
            None => debug!(pager = id.raw(), "layout notification for unknown pager"),
        }
    }

    /// Synchronous bridge call on behalf of a pager.
    pub fn call_sync(&self, id: PagerId, method: BridgeMethod, args: &[Value]) -> Value {
        match self.pager(id) {
            Some(pager) => self.channel.call_sync(&pager, method, args),
            None => {
                debug!(pager = id.raw(), ?method, "sync call for unknown pager");
                Value::Null
            }
        }
    }

    /// Asynchronous bridge call on behalf of a pager.
    pub fn call_async(
        &self,
        id: PagerId,
        method: BridgeMethod,
        args: &[Value],
        reply: Box<dyn FnOnce(Value) + Send>,
    ) -> Option<CallbackRef> {
        match self.pager(id) {
            Some(pager) => self.channel.call_async(&pager, method, args, reply),
            None => {
                debug!(pager = id.raw(), ?method, "async call for unknown pager");
                None
            }
        }
    }

    /// Resolve a view tag to the host's native view handle.
    pub fn view_for_tag(&self, id: PagerId, tag: i32) -> Option<NativeViewRef> {
        self.host.views.view_for_tag(id, tag)
    }

    /// Tear down every live pager and drop the factory table.
    pub fn shutdown(&self) {
        let ids: Vec<PagerId> = self.pagers.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.destroy_pager(id);
        }
        self.factories.write().clear();
    }

    fn notify_monitor(&self, id: PagerId, stage: LifecycleStage) {
        let monitor = self.monitor.read();
        if let Some(monitor) = monitor.as_ref() {
            monitor.on_stage(id, stage);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        InlineTimer, ModuleInstance, ModuleResolver, RenderDelegate, ShadowInstance,
        ShadowResolver, ViewRegistry,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoModules;

    impl ModuleResolver for NoModules {
        fn create_module(&self, _pager: PagerId, _name: &str) -> Option<Arc<dyn ModuleInstance>> {
            None
        }
    }

    struct NoShadows;

    impl ShadowResolver for NoShadows {
        fn create_shadow(&self, _pager: PagerId, _name: &str) -> Option<Arc<dyn ShadowInstance>> {
            None
        }
    }

    struct NoViews;

    impl ViewRegistry for NoViews {
        fn view_for_tag(&self, _pager: PagerId, _tag: i32) -> Option<NativeViewRef> {
            None
        }
    }

    #[derive(Default)]
    struct NullRenderer {
        applied: AtomicUsize,
    }

    impl RenderDelegate for NullRenderer {
        fn apply(&self, _pager: PagerId, _method: BridgeMethod, _args: &[Value]) -> Value {
            self.applied.fetch_add(1, Ordering::SeqCst);
            Value::Null
        }
    }

    fn runtime() -> (CoreRuntime, Arc<NullRenderer>) {
        let renderer = Arc::new(NullRenderer::default());
        let runtime = CoreRuntime::new(HostBindings {
            timer: Arc::new(InlineTimer),
            modules: Arc::new(NoModules),
            shadows: Arc::new(NoShadows),
            views: Arc::new(NoViews),
            renderer: renderer.clone(),
        });
        (runtime, renderer)
    }

    #[test]
    fn factory_lookup_is_case_insensitive() {
        let (runtime, _) = runtime();
        runtime.register_page("Home", |_, _| {});

        assert!(runtime.has_page("home"));
        assert!(runtime.has_page("HOME"));

        let pager = runtime
            .create_pager(PagerId::from(1), "hOmE", &Value::Null)
            .unwrap();
        assert_eq!(pager.page_name(), "hOmE");
    }

    #[test]
    fn missing_factory_fails_creation_and_leaves_nothing_behind() {
        let (runtime, _) = runtime();

        let err = runtime
            .create_pager(PagerId::from(1), "missing", &Value::Null)
            .unwrap_err();
        assert!(matches!(err, CoreError::PagerNotFound { name } if name == "missing"));
        assert_eq!(runtime.pager_count(), 0);
    }

    #[test]
    fn factory_receives_the_init_payload_and_wires_the_page() {
        let (runtime, _) = runtime();
        let seen_init = Arc::new(Mutex::new(Value::Null));

        let seen_clone = Arc::clone(&seen_init);
        runtime.register_page("home", move |pager, init| {
            *seen_clone.lock() = init.clone();
            pager.set_event_handler(|_, _, _| {});
        });

        runtime
            .create_pager(PagerId::from(1), "home", &Value::Str("deep-link".into()))
            .unwrap();

        assert_eq!(*seen_init.lock(), Value::Str("deep-link".into()));
        assert_eq!(runtime.pager_count(), 1);
    }

    #[test]
    fn factory_may_register_pages_during_creation() {
        let (runtime, _) = runtime();
        let runtime = Arc::new(runtime);

        // A landing page that registers its detail page while being built.
        let rt = Arc::clone(&runtime);
        runtime.register_page("home", move |_, _| {
            rt.register_page("detail", |_, _| {});
        });

        runtime
            .create_pager(PagerId::from(1), "home", &Value::Null)
            .unwrap();

        assert!(runtime.has_page("detail"));
        runtime
            .create_pager(PagerId::from(2), "detail", &Value::Null)
            .unwrap();
        assert_eq!(runtime.pager_count(), 2);
    }

    #[test]
    fn observer_accessor_requires_a_live_graph() {
        let (runtime, _) = runtime();
        runtime.register_page("home", |_, _| {});

        let id = PagerId::from(1);
        assert!(matches!(
            runtime.observer_for(id),
            Err(CoreError::ObserverNotFound { .. })
        ));

        runtime.create_pager(id, "home", &Value::Null).unwrap();
        assert!(runtime.observer_for(id).is_ok());

        runtime.destroy_pager(id);
        assert!(matches!(
            runtime.observer_for(id),
            Err(CoreError::ObserverNotFound { .. })
        ));
    }

    #[test]
    fn notifications_for_unknown_or_destroyed_pagers_are_silent() {
        let (runtime, renderer) = runtime();
        runtime.register_page("home", |_, _| {});
        runtime
            .create_pager(PagerId::from(1), "home", &Value::Null)
            .unwrap();

        runtime.destroy_pager(PagerId::from(1));
        runtime.destroy_pager(PagerId::from(1));

        runtime.fire_view_event(PagerId::from(1), 1, "tap", &Value::Null);
        runtime.fire_callback(PagerId::from(1), "cb-1-0", Value::Null);
        runtime.fire_layout_view(PagerId::from(1));
        assert!(runtime
            .call_sync(PagerId::from(1), BridgeMethod::CreateView, &[])
            .is_null());

        assert_eq!(renderer.applied.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.pager_count(), 0);
    }

    #[test]
    fn reused_id_replaces_and_destroys_the_old_pager() {
        let (runtime, _) = runtime();
        runtime.register_page("home", |_, _| {});

        let first = runtime
            .create_pager(PagerId::from(1), "home", &Value::Null)
            .unwrap();
        let second = runtime
            .create_pager(PagerId::from(1), "home", &Value::Null)
            .unwrap();

        assert!(first.is_destroyed());
        assert!(!second.is_destroyed());
        assert_eq!(runtime.pager_count(), 1);
    }

    #[test]
    fn lifecycle_stages_update_state_and_reach_the_monitor() {
        struct Recorder {
            stages: Mutex<Vec<(PagerId, LifecycleStage)>>,
        }

        impl LifecycleMonitor for Recorder {
            fn on_stage(&self, pager: PagerId, stage: LifecycleStage) {
                self.stages.lock().push((pager, stage));
            }
        }

        let (runtime, _) = runtime();
        let recorder = Arc::new(Recorder {
            stages: Mutex::new(Vec::new()),
        });
        runtime.set_lifecycle_monitor(recorder.clone());
        runtime.register_page("home", |_, _| {});

        let id = PagerId::from(9);
        let pager = runtime.create_pager(id, "home", &Value::Null).unwrap();
        assert_eq!(pager.state(), PagerState::Created);

        runtime.on_lifecycle_event(id, LifecycleStage::Resume);
        assert_eq!(pager.state(), PagerState::Active);

        runtime.on_lifecycle_event(id, LifecycleStage::Pause);
        assert_eq!(pager.state(), PagerState::Paused);

        runtime.on_lifecycle_event(id, LifecycleStage::Destroy);
        assert!(pager.is_destroyed());
        assert_eq!(runtime.pager_count(), 0);

        let stages: Vec<_> = recorder.stages.lock().iter().map(|(_, s)| *s).collect();
        assert_eq!(
            stages,
            vec![
                LifecycleStage::Resume,
                LifecycleStage::Pause,
                LifecycleStage::Destroy,
            ]
        );
    }

    #[test]
    fn shutdown_tears_down_every_pager() {
        let (runtime, _) = runtime();
        runtime.register_page("home", |_, _| {});

        let a = runtime
            .create_pager(PagerId::from(1), "home", &Value::Null)
            .unwrap();
        let b = runtime
            .create_pager(PagerId::from(2), "home", &Value::Null)
            .unwrap();

        runtime.shutdown();
        assert!(a.is_destroyed());
        assert!(b.is_destroyed());
        assert_eq!(runtime.pager_count(), 0);
    }
}
