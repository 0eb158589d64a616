//! Per-connection dispatch loop.
//!
//! Each accepted connection gets one dispatch task that owns its session
//! for the session's lifetime: read one frame, resolve the target object,
//! perform the requested interaction, reply, repeat. Application methods
//! run on blocking threads; their yields travel back through a rendezvous
//! channel and leave as YIELD frames while the method keeps executing.
//!
//! Application errors, panics included, become EXCEPTION replies and the
//! loop continues. Protocol violations and I/O failures end the session.

use std::sync::Arc;

use tokio::sync::mpsc;

use romp_common::protocol::codec;
use romp_common::{Frame, MsgType, RemoteError, RompError, Result, Session, Value};

use crate::object::RemoteObject;
use crate::registry::Registry;

pub(crate) async fn run_session(session: Session, registry: Arc<Registry>, debug: bool) {
    loop {
        let frame = match session.read_frame().await {
            Ok(frame) => frame,
            Err(err) if err.is_disconnect() => {
                tracing::debug!("peer disconnected");
                break;
            }
            Err(err) => {
                tracing::warn!(error = %err, "session read failed");
                break;
            }
        };

        if let Err(err) = handle_frame(&session, &registry, debug, frame).await {
            if err.is_disconnect() {
                tracing::debug!("peer disconnected mid-reply");
            } else {
                tracing::warn!(error = %err, "closing session");
            }
            break;
        }
    }
}

async fn handle_frame(
    session: &Session,
    registry: &Arc<Registry>,
    debug: bool,
    frame: Frame,
) -> Result<()> {
    match frame.msg_type {
        MsgType::Sync => {
            if frame.obj_id == 0 {
                session
                    .write_frame(MsgType::Sync, 1, &codec::encode(&Value::Nil)?)
                    .await?;
            }
            // A spurious SYNC response is ignored.
            Ok(())
        }
        MsgType::Request | MsgType::RequestBlock | MsgType::Oneway | MsgType::OnewaySync => {
            handle_call(session, registry, debug, frame).await
        }
        other => Err(RompError::Protocol(format!(
            "unexpected {other:?} frame on a server session"
        ))),
    }
}

async fn handle_call(
    session: &Session,
    registry: &Arc<Registry>,
    debug: bool,
    frame: Frame,
) -> Result<()> {
    let Some(obj) = registry.get(frame.obj_id) else {
        return reply_exception(
            session,
            RemoteError::new("RegistryError", format!("no such object: {}", frame.obj_id)),
        )
        .await;
    };

    let (method, args) = match decode_call(&frame.payload) {
        Ok(call) => call,
        Err(err) => {
            // A payload we cannot decode is the caller's problem, not a
            // session-fatal one.
            return reply_exception(session, RemoteError::new("CodecError", err.to_string()))
                .await;
        }
    };

    match frame.msg_type {
        MsgType::Request => {
            let result = invoke_without_block(obj, method, args).await;
            write_outcome(session, result).await
        }
        MsgType::RequestBlock => {
            let (tx, mut rx) = mpsc::channel::<Value>(1);
            let task = tokio::task::spawn_blocking(move || {
                obj.call(&method, args, &mut |value| {
                    tx.blocking_send(value)
                        .map_err(|_| RemoteError::new("IOError", "caller went away during yield"))
                })
            });
            // Yields drain here while the method keeps running; the channel
            // closes when the method returns, and only then does the
            // terminating reply go out.
            while let Some(value) = rx.recv().await {
                session
                    .write_frame(MsgType::Yield, 0, &codec::encode(&value)?)
                    .await?;
            }
            let result = flatten_invocation(task.await);
            write_outcome(session, result).await
        }
        MsgType::Oneway | MsgType::OnewaySync => {
            if frame.msg_type == MsgType::OnewaySync {
                session.write_frame(MsgType::NullMsg, 0, &[]).await?;
            }
            if let Err(err) = invoke_without_block(obj, method, args).await {
                if debug {
                    tracing::error!(error = %err, "one-way call raised");
                }
            }
            Ok(())
        }
        _ => unreachable!("handle_call only sees request types"),
    }
}

/// Runs a method with no block attached; a yield from the method surfaces
/// as the usual no-block error.
async fn invoke_without_block(
    obj: Arc<dyn RemoteObject>,
    method: String,
    args: Vec<Value>,
) -> std::result::Result<Value, RemoteError> {
    let task = tokio::task::spawn_blocking(move || {
        obj.call(&method, args, &mut |_| {
            Err(RemoteError::new("LocalJumpError", "no block given (yield)"))
        })
    });
    flatten_invocation(task.await)
}

/// Collapses a finished blocking invocation, turning a panicked method
/// into an exception value so the worker survives.
fn flatten_invocation(
    joined: std::result::Result<std::result::Result<Value, RemoteError>, tokio::task::JoinError>,
) -> std::result::Result<Value, RemoteError> {
    match joined {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            let panic = join_err.into_panic();
            let message = panic
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "method panicked".to_string());
            Err(RemoteError::new("Panic", message))
        }
        Err(join_err) => Err(RemoteError::new("Panic", join_err.to_string())),
    }
}

async fn write_outcome(
    session: &Session,
    result: std::result::Result<Value, RemoteError>,
) -> Result<()> {
    match result {
        Ok(value) => {
            session
                .write_frame(MsgType::Retval, 0, &codec::encode(&value)?)
                .await
        }
        Err(err) => reply_exception(session, err).await,
    }
}

/// Emits an EXCEPTION reply. The backtrace carries application frames
/// only; dispatch never adds its own.
async fn reply_exception(session: &Session, err: RemoteError) -> Result<()> {
    session
        .write_frame(MsgType::Exception, 0, &codec::encode(&Value::Error(err))?)
        .await
}

/// Splits a call payload `[method, args...]` into its parts.
fn decode_call(payload: &[u8]) -> Result<(String, Vec<Value>)> {
    let value = codec::decode(payload)?;
    let Value::Array(items) = value else {
        return Err(RompError::Protocol(
            "call payload must be an array".to_string(),
        ));
    };
    let mut items = items.into_iter();
    let method = match items.next() {
        Some(Value::Str(method)) => method,
        _ => {
            return Err(RompError::Protocol(
                "call payload must begin with a method name".to_string(),
            ))
        }
    };
    Ok((method, items.collect()))
}
