// Integration tests for romp-server.
//
// These drive a real server over TCP with a raw frame-level client, so the
// assertions are about what actually crosses the wire: frame ordering,
// message-type codes, acknowledgement discipline.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use romp_common::protocol::codec;
use romp_common::{RemoteError, Value};
use romp_server::{no_method, CallResult, RemoteObject, Server, ServerHandle, Yielder};

// ============================================================================
// Test Helpers
// ============================================================================

const MAGIC: u16 = 0x4242;
const REQUEST: u16 = 0x1001;
const REQUEST_BLOCK: u16 = 0x1002;
const ONEWAY: u16 = 0x1003;
const ONEWAY_SYNC: u16 = 0x1004;
const RETVAL: u16 = 0x2001;
const EXCEPTION: u16 = 0x2002;
const YIELD: u16 = 0x2003;
const SYNC: u16 = 0x4001;
const NULL_MSG: u16 = 0x4002;

/// Frame-level test client speaking the wire format by hand.
struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    async fn connect(handle: &ServerHandle) -> Self {
        let addr = handle.local_addr().expect("server has no local addr");
        let stream = TcpStream::connect(addr).await.expect("failed to connect");
        TestClient { stream }
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write failed");
    }

    async fn send_frame(&mut self, msg_type: u16, obj_id: u16, payload: &[u8]) {
        let mut bytes = Vec::with_capacity(8 + payload.len());
        bytes.extend_from_slice(&MAGIC.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&msg_type.to_be_bytes());
        bytes.extend_from_slice(&obj_id.to_be_bytes());
        bytes.extend_from_slice(payload);
        self.send_raw(&bytes).await;
    }

    async fn send_call(&mut self, msg_type: u16, obj_id: u16, method: &str, args: Vec<Value>) {
        let mut items = vec![Value::from(method)];
        items.extend(args);
        let payload = codec::encode(&Value::Array(items)).unwrap();
        self.send_frame(msg_type, obj_id, &payload).await;
    }

    async fn read_frame(&mut self) -> (u16, u16, Vec<u8>) {
        let mut header = [0u8; 8];
        self.stream
            .read_exact(&mut header)
            .await
            .expect("read header failed");
        assert_eq!(
            u16::from_be_bytes([header[0], header[1]]),
            MAGIC,
            "frame did not start with the magic marker"
        );
        let len = u16::from_be_bytes([header[2], header[3]]) as usize;
        let msg_type = u16::from_be_bytes([header[4], header[5]]);
        let obj_id = u16::from_be_bytes([header[6], header[7]]);
        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .expect("read payload failed");
        (msg_type, obj_id, payload)
    }

    async fn read_value_frame(&mut self) -> (u16, u16, Value) {
        let (msg_type, obj_id, payload) = self.read_frame().await;
        (msg_type, obj_id, codec::decode(&payload).unwrap())
    }
}

/// `foo(i)` stores i, `i()` reads it back, `each` yields 1, 2, 3.
struct Foo {
    i: Mutex<i64>,
}

impl Foo {
    fn new() -> Arc<Self> {
        Arc::new(Foo { i: Mutex::new(0) })
    }
}

impl RemoteObject for Foo {
    fn call(&self, method: &str, args: Vec<Value>, yielder: Yielder<'_>) -> CallResult {
        match method {
            "foo" => {
                let value = args.first().and_then(Value::as_int).unwrap_or(0);
                *self.i.lock().unwrap() = value;
                Ok(Value::Int(value))
            }
            "i" => Ok(Value::Int(*self.i.lock().unwrap())),
            "each" => {
                for i in 1..=3 {
                    yielder(Value::Int(i))?;
                }
                Ok(Value::Nil)
            }
            "throw_exception" => self.throw_exception(),
            "panic" => panic!("deliberate test panic"),
            other => Err(no_method(other)),
        }
    }
}

impl Foo {
    fn throw_exception(&self) -> CallResult {
        self.throw_exception2()
            .map_err(|e| e.with_frame("throw_exception"))
    }

    fn throw_exception2(&self) -> CallResult {
        Err(RemoteError::new("RuntimeError", "boom").with_frame("throw_exception2"))
    }
}

async fn start_test_server() -> (ServerHandle, u16) {
    let server = Server::new("tcpromp://127.0.0.1:0").expect("failed to create server");
    let id = server.bind(Foo::new(), "foo").expect("failed to bind foo");
    let handle = server.start().await.expect("failed to start server");
    (handle, id)
}

// ============================================================================
// Dispatch Tests
// ============================================================================

#[tokio::test]
async fn test_request_gets_exactly_one_retval() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client
        .send_call(REQUEST, foo, "foo", vec![Value::Int(42)])
        .await;
    let (msg_type, obj_id, value) = client.read_value_frame().await;
    assert_eq!(msg_type, RETVAL);
    assert_eq!(obj_id, 0);
    assert_eq!(value, Value::Int(42));

    // A sync round-trip proves nothing else was queued behind the reply.
    client
        .send_frame(SYNC, 0, &codec::encode(&Value::Nil).unwrap())
        .await;
    let (msg_type, obj_id, _) = client.read_value_frame().await;
    assert_eq!((msg_type, obj_id), (SYNC, 1));
}

#[tokio::test]
async fn test_request_block_yields_then_returns() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send_call(REQUEST_BLOCK, foo, "each", vec![]).await;

    for expected in 1..=3 {
        let (msg_type, obj_id, value) = client.read_value_frame().await;
        assert_eq!(msg_type, YIELD);
        assert_eq!(obj_id, 0);
        assert_eq!(value, Value::Int(expected));
    }
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, RETVAL);
    assert_eq!(value, Value::Nil);
}

#[tokio::test]
async fn test_oneway_calls_run_in_order() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send_call(ONEWAY, foo, "foo", vec![Value::Int(1)]).await;
    client.send_call(ONEWAY, foo, "foo", vec![Value::Int(2)]).await;
    client
        .send_frame(SYNC, 0, &codec::encode(&Value::Nil).unwrap())
        .await;
    let (msg_type, obj_id, _) = client.read_value_frame().await;
    assert_eq!((msg_type, obj_id), (SYNC, 1));

    client.send_call(REQUEST, foo, "i", vec![]).await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, RETVAL);
    assert_eq!(value, Value::Int(2));
}

#[tokio::test]
async fn test_oneway_sync_acks_before_running() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client
        .send_call(ONEWAY_SYNC, foo, "foo", vec![Value::Int(7)])
        .await;
    let (msg_type, obj_id, payload) = client.read_frame().await;
    assert_eq!(msg_type, NULL_MSG);
    assert_eq!(obj_id, 0);
    assert!(payload.is_empty());

    client.send_call(REQUEST, foo, "i", vec![]).await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, RETVAL);
    assert_eq!(value, Value::Int(7));
}

#[tokio::test]
async fn test_unknown_object_raises_registry_error() {
    let (handle, _foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send_call(REQUEST, 999, "foo", vec![]).await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, EXCEPTION);
    let Value::Error(err) = value else {
        panic!("exception frame did not carry an error value");
    };
    assert_eq!(err.class, "RegistryError");
    assert!(err.message.contains("999"));
}

#[tokio::test]
async fn test_exception_carries_application_backtrace() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send_call(REQUEST, foo, "throw_exception", vec![]).await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, EXCEPTION);
    let Value::Error(err) = value else {
        panic!("exception frame did not carry an error value");
    };
    assert_eq!(err.class, "RuntimeError");
    assert_eq!(err.message, "boom");
    assert_eq!(err.backtrace, vec!["throw_exception2", "throw_exception"]);

    // The session survived the exception.
    client.send_call(REQUEST, foo, "i", vec![]).await;
    let (msg_type, _, _) = client.read_value_frame().await;
    assert_eq!(msg_type, RETVAL);
}

#[tokio::test]
async fn test_panicking_method_becomes_exception() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send_call(REQUEST, foo, "panic", vec![]).await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, EXCEPTION);
    let Value::Error(err) = value else {
        panic!("exception frame did not carry an error value");
    };
    assert_eq!(err.class, "Panic");
    assert!(err.message.contains("deliberate test panic"));

    client.send_call(REQUEST, foo, "i", vec![]).await;
    let (msg_type, _, _) = client.read_value_frame().await;
    assert_eq!(msg_type, RETVAL);
}

#[tokio::test]
async fn test_request_without_block_cannot_yield() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send_call(REQUEST, foo, "each", vec![]).await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, EXCEPTION);
    let Value::Error(err) = value else {
        panic!("exception frame did not carry an error value");
    };
    assert_eq!(err.class, "LocalJumpError");
}

#[tokio::test]
async fn test_server_resyncs_after_garbage() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send_raw(&[0x00, 0x42, 0x13, 0x37]).await;
    client.send_call(REQUEST, foo, "foo", vec![Value::Int(5)]).await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, RETVAL);
    assert_eq!(value, Value::Int(5));
}

#[tokio::test]
async fn test_reply_type_from_client_is_fatal() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    let _ = foo;
    let payload = codec::encode(&Value::Nil).unwrap();
    client.send_frame(RETVAL, 0, &payload).await;

    // The server closes the session; the next read sees EOF.
    let mut buf = [0u8; 1];
    let n = client.stream.read(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0, "session should have been closed");
}

#[tokio::test]
async fn test_accept_predicate_rejects_peer() {
    let server = Server::new("tcpromp://127.0.0.1:0").unwrap();
    server.bind(Foo::new(), "foo").unwrap();
    let handle = server.with_acceptor(|_| false).start().await.unwrap();

    let mut client = TestClient::connect(&handle).await;
    let mut buf = [0u8; 1];
    let n = client.stream.read(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0, "rejected peer should see an immediate close");
}

#[tokio::test]
async fn test_resolver_over_the_wire() {
    let (handle, foo) = start_test_server().await;
    let mut client = TestClient::connect(&handle).await;

    client
        .send_call(REQUEST, 0, "resolve", vec![Value::from("foo")])
        .await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, RETVAL);
    assert_eq!(value, Value::ObjectRef(foo));

    client
        .send_call(REQUEST, 0, "resolve", vec![Value::from("missing")])
        .await;
    let (msg_type, _, value) = client.read_value_frame().await;
    assert_eq!(msg_type, EXCEPTION);
    let Value::Error(err) = value else {
        panic!("exception frame did not carry an error value");
    };
    assert_eq!(err.class, "NameError");
}
