use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::endpoint::Endpoint;
use crate::protocol::codec;
use crate::protocol::frame::{FrameHeader, MsgType};
use crate::protocol::value::Value;
use crate::transport::session::Session;
use crate::transport::stream::{connect, listen};

fn loopback() -> Endpoint {
    Endpoint::Tcp {
        host: Some("127.0.0.1".to_string()),
        port: 0,
    }
}

#[tokio::test]
async fn test_tcp_frame_roundtrip() {
    let acceptor = listen(&loopback()).await.unwrap();
    let port = acceptor.local_addr().unwrap().port();
    let endpoint = Endpoint::Tcp {
        host: Some("127.0.0.1".to_string()),
        port,
    };

    let server = tokio::spawn(async move {
        let (stream, _peer) = acceptor.accept().await.unwrap();
        let session = Session::new(stream);
        let frame = session.read_frame().await.unwrap();
        assert_eq!(frame.msg_type, MsgType::Request);
        assert_eq!(frame.obj_id, 3);
        session
            .write_frame(MsgType::Retval, 0, &frame.payload)
            .await
            .unwrap();
    });

    let session = Session::new(connect(&endpoint).await.unwrap());
    let payload = codec::encode(&Value::Int(42)).unwrap();
    session
        .write_frame(MsgType::Request, 3, &payload)
        .await
        .unwrap();
    let reply = session.read_frame().await.unwrap();
    assert_eq!(reply.msg_type, MsgType::Retval);
    assert_eq!(codec::decode(&reply.payload).unwrap(), Value::Int(42));

    server.await.unwrap();
}

#[tokio::test]
async fn test_unix_frame_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = Endpoint::Unix {
        path: dir.path().join("romp.sock"),
    };

    let acceptor = listen(&endpoint).await.unwrap();
    let server = tokio::spawn(async move {
        let (stream, _peer) = acceptor.accept().await.unwrap();
        let session = Session::new(stream);
        let frame = session.read_frame().await.unwrap();
        session
            .write_frame(MsgType::Retval, 0, &frame.payload)
            .await
            .unwrap();
    });

    let session = Session::new(connect(&endpoint).await.unwrap());
    let payload = codec::encode(&Value::Str("over unix".to_string())).unwrap();
    session
        .write_frame(MsgType::Request, 1, &payload)
        .await
        .unwrap();
    let reply = session.read_frame().await.unwrap();
    assert_eq!(
        codec::decode(&reply.payload).unwrap(),
        Value::Str("over unix".to_string())
    );

    server.await.unwrap();
}

#[tokio::test]
async fn test_reader_resyncs_on_garbage() {
    let acceptor = listen(&loopback()).await.unwrap();
    let port = acceptor.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _peer) = acceptor.accept().await.unwrap();
        let session = Session::new(stream);
        session.read_frame().await.unwrap()
    });

    let mut raw = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let payload = codec::encode(&Value::Bool(true)).unwrap();
    let header = FrameHeader {
        payload_len: payload.len() as u16,
        msg_type: MsgType::Oneway,
        obj_id: 9,
    };
    // Garbage before the frame; the reader has to hunt for the magic.
    let mut bytes = vec![0x00, 0xff, 0x42, 0x00, 0x13];
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(&payload);
    raw.write_all(&bytes).await.unwrap();

    let frame = server.await.unwrap();
    assert_eq!(frame.msg_type, MsgType::Oneway);
    assert_eq!(frame.obj_id, 9);
    assert_eq!(codec::decode(&frame.payload).unwrap(), Value::Bool(true));
}

#[tokio::test]
async fn test_read_signals_disconnect() {
    let acceptor = listen(&loopback()).await.unwrap();
    let port = acceptor.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _peer) = acceptor.accept().await.unwrap();
        let session = Session::new(stream);
        session.read_frame().await
    });

    let raw = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    drop(raw);

    let err = server.await.unwrap().unwrap_err();
    assert!(err.is_disconnect(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_write_rejects_oversized_payload() {
    let acceptor = listen(&loopback()).await.unwrap();
    let port = acceptor.local_addr().unwrap().port();
    let endpoint = Endpoint::Tcp {
        host: Some("127.0.0.1".to_string()),
        port,
    };

    let _server = tokio::spawn(async move {
        let _ = acceptor.accept().await;
        std::future::pending::<()>().await;
    });

    let session = Session::new(connect(&endpoint).await.unwrap());
    let oversized = vec![0u8; u16::MAX as usize + 1];
    let err = session
        .write_frame(MsgType::Request, 1, &oversized)
        .await
        .unwrap_err();
    assert!(matches!(err, crate::RompError::Protocol(_)));
}

#[tokio::test]
async fn test_datagram_frame_roundtrip() {
    let endpoint = Endpoint::Udp {
        host: Some("127.0.0.1".to_string()),
        port: 0,
    };
    let acceptor = listen(&endpoint).await.unwrap();
    let port = acceptor.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _peer) = acceptor.accept().await.unwrap();
        let session = Session::new(stream);
        let frame = session.read_frame().await.unwrap();
        session
            .write_frame(MsgType::Retval, 0, &frame.payload)
            .await
            .unwrap();
    });

    let client_endpoint = Endpoint::Udp {
        host: Some("127.0.0.1".to_string()),
        port,
    };
    let session = Session::new(connect(&client_endpoint).await.unwrap());
    let payload = codec::encode(&Value::Int(7)).unwrap();
    session
        .write_frame(MsgType::Request, 2, &payload)
        .await
        .unwrap();
    let reply = session.read_frame().await.unwrap();
    assert_eq!(codec::decode(&reply.payload).unwrap(), Value::Int(7));

    server.await.unwrap();
}
