//! The application-object trait served by dispatch.

use romp_common::{RemoteError, Value};

/// Outcome of invoking a method on a served object.
pub type CallResult = std::result::Result<Value, RemoteError>;

/// Callback through which a method hands block arguments back to its
/// caller. Each invocation crosses the wire as one YIELD frame; the error
/// case means the call had no block (or the client went away), and should
/// be propagated.
pub type Yielder<'a> = &'a mut dyn FnMut(Value) -> std::result::Result<(), RemoteError>;

/// An object that can be registered with a server and invoked remotely.
///
/// Dispatch workers run concurrently, one per live connection, so
/// implementations must tolerate concurrent invocation. That is a
/// documented precondition of the system, not something it enforces.
///
/// Methods run on blocking threads; they may block freely but should not
/// assume an async context. Unknown method names should produce an error
/// value rather than a panic, though panics are caught and forwarded as
/// exception replies too.
pub trait RemoteObject: Send + Sync + 'static {
    fn call(&self, method: &str, args: Vec<Value>, yielder: Yielder<'_>) -> CallResult;
}

/// Convenience error for objects rejecting a method name.
pub fn no_method(method: &str) -> RemoteError {
    RemoteError::new("NoMethodError", format!("undefined method `{method}'"))
}
