//! Logic/Native Bridge
//!
//! Everything that crosses the boundary between page logic and the native
//! host goes through this module: the tagged [`Value`] payload type, the
//! closed [`BridgeMethod`] set, and the [`BridgeChannel`] that marshals
//! sync calls, async calls, and callback deliveries.

mod channel;
mod method;
mod value;

pub use channel::{BridgeChannel, CallArgs, CallId, CallState, CallbackRef};
pub use method::BridgeMethod;
pub use value::Value;
