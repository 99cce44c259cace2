//! Bridge Call Channel
//!
//! The channel marshals calls from the logic side to the native side. Every
//! call names a [`BridgeMethod`], carries up to six positional [`Value`]
//! arguments, and is either synchronous (the caller blocks until the native
//! side returns) or asynchronous (the caller registers a callback reference
//! and returns immediately).
//!
//! # Call States
//!
//! Each call walks a small state machine:
//!
//! ```text
//! Pending → Sent → Returned          (sync)
//!               → CallbackInvoked    (async)
//!        → Released
//! ```
//!
//! Async records stay in flight until the native side delivers the reply or
//! the owning pager is torn down, whichever comes first. A callback token
//! is scoped to its pager, yields its slot at most once, and can never fire
//! after teardown — the slot is gone before the stale delivery arrives.
//!
//! # Dispatch Resolution
//!
//! Module calls resolve by (pager, module name) through the pager's lazy
//! module table. Shadow and layout calls resolve by (pager, view ref).
//! Everything else is a view-tree operation and is forwarded to the host's
//! render delegate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use smallvec::SmallVec;
use tracing::debug;

use super::method::BridgeMethod;
use super::value::Value;
use crate::host::RenderDelegate;
use crate::pager::{CallbackSlot, Pager, PagerId};

/// Positional arguments for one bridge call. Six slots inline.
pub type CallArgs = SmallVec<[Value; 6]>;

/// Unique identifier for one bridge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u64);

impl CallId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CallId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// State of one bridge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Sent,
    Returned,
    CallbackInvoked,
    Released,
}

/// An opaque reference to a pending asynchronous reply.
#[derive(Debug, Clone)]
pub struct CallbackRef {
    pager: PagerId,
    call: CallId,
    token: Arc<str>,
}

impl CallbackRef {
    pub fn pager(&self) -> PagerId {
        self.pager
    }

    pub fn call(&self) -> CallId {
        self.call
    }

    /// The string token the native side echoes back on delivery.
    pub fn token(&self) -> &str {
        &self.token
    }
}

struct CallRecord {
    pager: PagerId,
    state: CallState,
}

/// Marshals calls and callbacks between the logic and native sides.
pub struct BridgeChannel {
    renderer: Arc<dyn RenderDelegate>,
    calls: DashMap<CallId, CallRecord>,
    next_call: AtomicU64,
    next_token: AtomicU64,
}

impl BridgeChannel {
    pub fn new(renderer: Arc<dyn RenderDelegate>) -> Self {
        Self {
            renderer,
            calls: DashMap::new(),
            next_call: AtomicU64::new(0),
            next_token: AtomicU64::new(0),
        }
    }

    /// Synchronous call: dispatches inline and returns the native result.
    ///
    /// A call addressed to a destroyed pager returns `Value::Null` without
    /// dispatching anything.
    pub fn call_sync(&self, pager: &Pager, method: BridgeMethod, args: &[Value]) -> Value {
        if pager.is_destroyed() {
            debug!(pager = pager.id().raw(), ?method, "dropping sync call for destroyed pager");
            return Value::Null;
        }

        let call = self.begin(pager.id());
        self.transition(call, CallState::Sent);
        let result = self.dispatch(pager, method, args, None);
        self.transition(call, CallState::Returned);
        self.release(call);
        result
    }

    /// Asynchronous call: registers a callback reference and returns
    /// immediately. The native side delivers the reply later through
    /// [`BridgeChannel::complete`], possibly from an arbitrary thread.
    ///
    /// Returns `None` (dropping the reply closure) if the pager is already
    /// destroyed.
    pub fn call_async(
        &self,
        pager: &Pager,
        method: BridgeMethod,
        args: &[Value],
        reply: Box<dyn FnOnce(Value) + Send>,
    ) -> Option<CallbackRef> {
        if pager.is_destroyed() {
            debug!(pager = pager.id().raw(), ?method, "dropping async call for destroyed pager");
            return None;
        }

        let call = self.begin(pager.id());
        let token: Arc<str> = format!(
            "cb-{}-{}",
            pager.id().raw(),
            self.next_token.fetch_add(1, Ordering::Relaxed)
        )
        .into();

        pager.register_callback(token.to_string(), CallbackSlot { call, reply });

        self.transition(call, CallState::Sent);
        self.dispatch(pager, method, args, Some(&token));

        Some(CallbackRef {
            pager: pager.id(),
            call,
            token,
        })
    }

    /// Deliver an asynchronous reply from the native side.
    ///
    /// Unknown or already-consumed tokens are stale deliveries racing
    /// teardown; they are logged and dropped.
    pub fn complete(&self, pager: &Pager, token: &str, value: Value) {
        match pager.take_callback(token) {
            Some(slot) => {
                self.transition(slot.call, CallState::CallbackInvoked);
                (slot.reply)(value);
                self.release(slot.call);
            }
            None => {
                debug!(pager = pager.id().raw(), token, "dropping stale callback delivery");
            }
        }
    }

    /// Release every in-flight record belonging to `pager`. Called on
    /// pager teardown; the pager's callback table is cleared separately.
    pub fn release_pager(&self, pager: PagerId) {
        self.calls.retain(|_, record| record.pager != pager);
    }

    /// Number of calls currently tracked. Diagnostic only.
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    pub fn state_of(&self, call: CallId) -> Option<CallState> {
        self.calls.get(&call).map(|record| record.state)
    }

    fn begin(&self, pager: PagerId) -> CallId {
        let call = CallId(self.next_call.fetch_add(1, Ordering::Relaxed));
        self.calls.insert(
            call,
            CallRecord {
                pager,
                state: CallState::Pending,
            },
        );
        call
    }

    fn transition(&self, call: CallId, state: CallState) {
        if let Some(mut record) = self.calls.get_mut(&call) {
            record.state = state;
        }
    }

    fn release(&self, call: CallId) {
        self.calls.remove(&call);
    }

    /// Resolve the call target and invoke it. The callback token, if any,
    /// is appended as a trailing string argument so the native side can
    /// echo it back.
    fn dispatch(
        &self,
        pager: &Pager,
        method: BridgeMethod,
        args: &[Value],
        token: Option<&str>,
    ) -> Value {
        let mut full: CallArgs = args.iter().cloned().collect();
        if let Some(token) = token {
            full.push(Value::Str(token.to_string()));
        }

        if method.targets_module() {
            let (module_name, method_name) = match (
                full.first().and_then(Value::as_str),
                full.get(1).and_then(Value::as_str),
            ) {
                (Some(module), Some(method)) => (module, method),
                _ => {
                    debug!(pager = pager.id().raw(), ?method, "malformed module call");
                    return Value::Null;
                }
            };

            match pager.acquire_module(module_name) {
                Some(module) => module.call(method_name, &full[2..]),
                None => {
                    debug!(pager = pager.id().raw(), module_name, "unknown module");
                    Value::Null
                }
            }
        } else if method.targets_shadow() {
            let view_ref = match full.first().and_then(Value::as_long) {
                Some(v) => v as i32,
                None => {
                    debug!(pager = pager.id().raw(), ?method, "shadow call without view ref");
                    return Value::Null;
                }
            };

            match method {
                BridgeMethod::CreateShadow => {
                    let created = full
                        .get(1)
                        .and_then(Value::as_str)
                        .map(|name| pager.create_shadow(view_ref, name))
                        .unwrap_or(false);
                    Value::Bool(created)
                }
                BridgeMethod::RemoveShadow => {
                    pager.remove_shadow(view_ref);
                    Value::Null
                }
                _ => {
                    let target = match full.get(1).and_then(Value::as_str) {
                        Some(name) => name,
                        None => {
                            debug!(pager = pager.id().raw(), ?method, "shadow call without target name");
                            return Value::Null;
                        }
                    };
                    match pager.shadow_for(view_ref) {
                        Some(shadow) => shadow.call(target, &full[2..]),
                        None => {
                            debug!(pager = pager.id().raw(), view_ref, "no shadow for view ref");
                            Value::Null
                        }
                    }
                }
            }
        } else {
            self.renderer.apply(pager.id(), method, &full)
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
