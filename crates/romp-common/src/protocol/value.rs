//! The value domain carried in frame payloads.
//!
//! Payloads are self-contained [`Value`] graphs: scalars, strings, byte
//! strings, arrays and maps, plus two distinguished variants. `ObjectRef`
//! carries the 16-bit id of a server-registered object and is rewritten
//! into a live proxy when a client receives it. `Error` carries an
//! exception value across the wire, message and backtrace included.

use serde::{Deserialize, Serialize};

/// A serializable value as it crosses the wire.
///
/// Method calls are encoded as `Array([Str(method), arg1, ...])`; replies
/// carry the bare return value. Maps are ordered pairs rather than a hash
/// table so that any value may key them and round-trips preserve identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Reference to an object registered in the remote server.
    ObjectRef(u16),
    /// An exception value; the payload of EXCEPTION frames.
    Error(RemoteError),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// An exception as a value.
///
/// Raised application errors travel inside EXCEPTION frames as a class
/// name, a message and a backtrace of application frames. The server sends
/// only server-side application frames; the receiving client appends its
/// own call site so the stitched trace crosses the wire naturally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    pub class: String,
    pub message: String,
    pub backtrace: Vec<String>,
}

impl RemoteError {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError {
            class: class.into(),
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    /// Appends one frame to the backtrace, innermost first.
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.backtrace.push(frame.into());
        self
    }

    pub fn push_frame(&mut self, frame: impl Into<String>) {
        self.backtrace.push(frame.into());
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn backtrace(&self) -> &[String] {
        &self.backtrace
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

impl std::error::Error for RemoteError {}
