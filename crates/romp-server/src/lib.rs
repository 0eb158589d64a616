//! ROMP Server
//!
//! This crate provides the server side of romp: the object registry, the
//! per-connection dispatch loop, and the front-end that ties them to a
//! listening endpoint.
//!
//! # Architecture
//!
//! One acceptor task owns the listener; every accepted connection gets its
//! own dispatch task that owns the session until the peer goes away. The
//! dispatch loop reads a frame, resolves the target object in the
//! registry, invokes it, and sends the reply frames, including YIELD
//! frames for block calls and EXCEPTION frames for raised errors.
//!
//! # Thread Safety
//!
//! Dispatch workers run application methods concurrently on blocking
//! threads. Every registered object must be safe for concurrent
//! invocation; the system documents this precondition but does not
//! enforce it. The registry itself is guarded by a single mutex.
//!
//! # Main Components
//!
//! - [`Server`] - construction, binding, the acceptor task
//! - [`Registry`] - id → object map and name bindings, resolver included
//! - [`RemoteObject`] - the trait application objects implement

mod dispatch;

pub mod object;
pub mod registry;
pub mod server;

pub use object::{no_method, CallResult, RemoteObject, Yielder};
pub use registry::{Registry, Resolver};
pub use server::{AcceptPredicate, Server, ServerHandle};
