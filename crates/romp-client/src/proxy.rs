//! The remote-object proxy.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use romp_common::protocol::codec;
use romp_common::{MsgType, RompError, Result, Session, Value, RESOLVER_ID};

/// Method names with intrinsic local semantics that must never cross the
/// wire; invoking one fails locally with a no-such-method error.
pub const FORBIDDEN_METHODS: &[&str] = &["clone", "dup", "display"];

/// Introspection methods whose returned name lists are scrubbed of the
/// forbidden names before the caller sees them.
pub const METHOD_LIST_METHODS: &[&str] = &[
    "methods",
    "public_methods",
    "private_methods",
    "singleton_methods",
];

/// Client-side stand-in for one object in the server process.
///
/// A proxy is `(session, lock, object id)` and nothing else; it is cheap
/// to clone and safe to share between concurrent callers. Every method
/// invocation is one conversation under the session lock: request out,
/// then replies in until the terminating RETVAL or EXCEPTION.
#[derive(Clone)]
pub struct Proxy {
    session: Arc<Session>,
    lock: Option<Arc<Mutex<()>>>,
    object_id: u16,
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("object_id", &self.object_id)
            .finish()
    }
}

/// What a call produced: a plain value, or a handle to a server object
/// that was returned by reference.
#[derive(Clone, Debug)]
pub enum CallReturn {
    Value(Value),
    Proxy(Proxy),
}

impl CallReturn {
    pub fn into_value(self) -> Result<Value> {
        match self {
            CallReturn::Value(value) => Ok(value),
            CallReturn::Proxy(proxy) => Err(RompError::Protocol(format!(
                "expected a value, got a reference to object {}",
                proxy.object_id
            ))),
        }
    }

    pub fn into_proxy(self) -> Result<Proxy> {
        match self {
            CallReturn::Proxy(proxy) => Ok(proxy),
            CallReturn::Value(value) => Err(RompError::Protocol(format!(
                "expected an object reference, got {value:?}"
            ))),
        }
    }
}

impl Proxy {
    pub(crate) fn new(session: Arc<Session>, lock: Option<Arc<Mutex<()>>>, object_id: u16) -> Self {
        Proxy {
            session,
            lock,
            object_id,
        }
    }

    pub fn object_id(&self) -> u16 {
        self.object_id
    }

    /// Invokes `method` remotely and waits for its terminating reply.
    ///
    /// Forbidden names fail here without touching the network. The results
    /// of the method-list introspection calls come back scrubbed of the
    /// forbidden names. Everything else forwards, `inspect`, `to_s`,
    /// `to_a` and `instance_variables` included: the proxy answers nothing
    /// locally on the real object's behalf.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<CallReturn> {
        self.reject_forbidden(method)?;
        let ret = self
            .request(method, args, None::<&mut (dyn FnMut(Value) + Send)>)
            .await?;
        Ok(scrub_method_list(method, ret))
    }

    /// Invokes `method` remotely with a block. Every value the method
    /// yields on the server is delivered to `block`, re-entrantly from the
    /// reply loop, before the call returns.
    pub async fn call_with(
        &self,
        method: &str,
        args: Vec<Value>,
        mut block: impl FnMut(Value) + Send,
    ) -> Result<CallReturn> {
        self.reject_forbidden(method)?;
        self.request(method, args, Some(&mut block)).await
    }

    /// Fires `method` without waiting for any reply. Application errors
    /// raised on the server are never surfaced here.
    pub async fn oneway(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.reject_forbidden(method)?;
        let _guard = self.acquire().await;
        let payload = encode_call(method, args)?;
        self.session
            .write_frame(MsgType::Oneway, self.object_id, &payload)
            .await
    }

    /// Like [`oneway`](Proxy::oneway), but waits for the server's single
    /// NULL_MSG acknowledgement, sent before the call starts executing.
    pub async fn oneway_sync(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.reject_forbidden(method)?;
        let _guard = self.acquire().await;
        let payload = encode_call(method, args)?;
        self.session
            .write_frame(MsgType::OnewaySync, self.object_id, &payload)
            .await?;
        let frame = self.session.read_frame().await?;
        if frame.msg_type != MsgType::NullMsg {
            return Err(RompError::Protocol(format!(
                "expected NULL_MSG acknowledgement, got {:?}",
                frame.msg_type
            )));
        }
        Ok(())
    }

    /// Round-trip no-op: drains everything the server had queued for this
    /// session and returns once the server has answered. Establishes a
    /// happens-before edge with previously fired one-way calls.
    pub async fn sync(&self) -> Result<()> {
        let _guard = self.acquire().await;
        self.session
            .write_frame(MsgType::Sync, 0, &codec::encode(&Value::Nil)?)
            .await?;
        loop {
            let frame = self.session.read_frame().await?;
            if frame.msg_type == MsgType::Sync && frame.obj_id == 1 {
                return Ok(());
            }
            // Anything else while waiting is stray; drop it.
        }
    }

    /// Capability query. Forbidden names answer `false` locally; anything
    /// else is asked of the server.
    pub async fn responds_to(&self, name: &str) -> Result<bool> {
        if FORBIDDEN_METHODS.contains(&name) {
            return Ok(false);
        }
        let value = self
            .call("responds_to", vec![Value::from(name)])
            .await?
            .into_value()?;
        value.as_bool().ok_or_else(|| {
            RompError::Protocol("responds_to reply was not a boolean".to_string())
        })
    }

    /// Releases the server-side registry entry backing this proxy. Meant
    /// for proxies obtained from a returned reference; afterwards any
    /// surviving handle to the same object fails with an unknown-object
    /// exception.
    pub async fn release(self) -> Result<()> {
        let resolver = Proxy::new(self.session.clone(), self.lock.clone(), RESOLVER_ID);
        resolver
            .call("release", vec![Value::Int(self.object_id as i64)])
            .await?
            .into_value()?;
        Ok(())
    }

    fn reject_forbidden(&self, method: &str) -> Result<()> {
        if FORBIDDEN_METHODS.contains(&method) {
            return Err(RompError::NoSuchMethod(method.to_string()));
        }
        Ok(())
    }

    async fn acquire(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    /// Sends the request and drives the reply state machine to its
    /// terminating frame.
    async fn request(
        &self,
        method: &str,
        args: Vec<Value>,
        mut block: Option<&mut (dyn FnMut(Value) + Send)>,
    ) -> Result<CallReturn> {
        let _guard = self.acquire().await;
        let payload = encode_call(method, args)?;
        let msg_type = if block.is_some() {
            MsgType::RequestBlock
        } else {
            MsgType::Request
        };
        self.session
            .write_frame(msg_type, self.object_id, &payload)
            .await?;

        loop {
            let frame = self.session.read_frame().await?;
            match frame.msg_type {
                MsgType::Retval => {
                    let value = codec::decode(&frame.payload)?;
                    return Ok(self.convert_return(value));
                }
                MsgType::Yield => {
                    let value = codec::decode(&frame.payload)?;
                    match block.as_mut() {
                        Some(block) => block(value),
                        None => {
                            return Err(RompError::Protocol(
                                "YIELD reply to a call without a block".to_string(),
                            ))
                        }
                    }
                }
                MsgType::Exception => {
                    let value = codec::decode(&frame.payload)?;
                    let Value::Error(mut err) = value else {
                        return Err(RompError::Protocol(
                            "EXCEPTION reply did not carry an error value".to_string(),
                        ));
                    };
                    // Stitch the local call site onto the server's trace.
                    err.push_frame(format!(
                        "romp call `{method}' on object {}",
                        self.object_id
                    ));
                    return Err(RompError::Remote(err));
                }
                MsgType::Sync if frame.obj_id == 0 => {
                    // The peer wants a sync answer mid-conversation.
                    self.session
                        .write_frame(MsgType::Sync, 1, &codec::encode(&Value::Nil)?)
                        .await?;
                }
                MsgType::Sync => {
                    // Stray response; ignore.
                }
                other => {
                    return Err(RompError::Protocol(format!(
                        "unexpected {other:?} reply to a request"
                    )))
                }
            }
        }
    }

    /// Rewrites a returned object reference into a live proxy on the same
    /// session; everything else passes through.
    fn convert_return(&self, value: Value) -> CallReturn {
        match value {
            Value::ObjectRef(id) => {
                CallReturn::Proxy(Proxy::new(self.session.clone(), self.lock.clone(), id))
            }
            other => CallReturn::Value(other),
        }
    }
}

fn encode_call(method: &str, args: Vec<Value>) -> Result<Vec<u8>> {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::from(method));
    items.extend(args);
    codec::encode(&Value::Array(items))
}

/// Strips forbidden names out of a method-list reply; other calls pass
/// through untouched.
fn scrub_method_list(method: &str, ret: CallReturn) -> CallReturn {
    if !METHOD_LIST_METHODS.contains(&method) {
        return ret;
    }
    match ret {
        CallReturn::Value(Value::Array(items)) => CallReturn::Value(Value::Array(
            items
                .into_iter()
                .filter(|item| match item.as_str() {
                    Some(name) => !FORBIDDEN_METHODS.contains(&name),
                    None => true,
                })
                .collect(),
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_names_are_never_filtered() {
        // These names must always reach the server; a local answer would
        // describe the proxy, not the object.
        for name in ["inspect", "to_s", "to_a", "instance_variables"] {
            assert!(!FORBIDDEN_METHODS.contains(&name));
            assert!(!METHOD_LIST_METHODS.contains(&name));
        }
    }

    #[test]
    fn test_scrub_method_list_strips_forbidden_names() {
        let ret = CallReturn::Value(Value::Array(vec![
            Value::from("foo"),
            Value::from("dup"),
            Value::from("clone"),
            Value::from("each"),
        ]));
        let scrubbed = scrub_method_list("methods", ret).into_value().unwrap();
        assert_eq!(
            scrubbed,
            Value::Array(vec![Value::from("foo"), Value::from("each")])
        );
    }

    #[test]
    fn test_scrub_leaves_other_calls_alone() {
        let ret = CallReturn::Value(Value::Array(vec![Value::from("dup")]));
        let untouched = scrub_method_list("listing", ret).into_value().unwrap();
        assert_eq!(untouched, Value::Array(vec![Value::from("dup")]));
    }
}
