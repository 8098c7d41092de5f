//! S2-S6: end-to-end client/transport scenarios, driven against a fake wsh
//! server speaking the real single-socket wire format over a loopback
//! WebSocket (see `fixtures::fake_server`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wsh_client::{ChannelKind, Client, ConnectConfig, Credentials, NullEventSink};
use wsh_crypto::transcript::build_transcript;
use wsh_crypto::{KeyStore, Signature, VerifyingKey};
use wsh_protocol::messages::{
    AuthMethod, AuthOkPayload, AuthPayload, ChannelKind as WireChannelKind, ClosePayload,
    ExitPayload, HelloPayload, OpenOkPayload, OpenPayload, ServerHelloPayload,
};
use wsh_protocol::{Envelope, MsgType, Payload, PROTOCOL_VERSION};
use wsh_transport::{EventSink, StreamHalves, TransportError};

use wsh_integration_tests::fixtures::fake_server::{FakeFrame, FakeServer};

async fn keystore_with_key(name: &str) -> Arc<KeyStore> {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = KeyStore::open(dir.path().join("keys.json")).await.expect("open key store");
    store.generate_key(name, false).await.expect("generate key");
    Arc::new(store)
}

#[tokio::test]
async fn s2_handshake_pubkey() {
    let (server, url) = FakeServer::bind().await;
    let keystore = keystore_with_key("laptop").await;

    let config = ConnectConfig {
        url,
        username: "alice".to_string(),
        credentials: Credentials::Pubkey { keystore: keystore.clone(), key_name: "laptop".to_string() },
        timeout: Duration::from_secs(5),
        keepalive_interval: None,
    };

    let client_task = tokio::spawn(Client::connect(config, Arc::new(NullEventSink)));

    let mut conn = server.accept().await;

    let hello = conn.recv_control().await;
    let Payload::Hello(HelloPayload { version, username, auth_method, .. }) = hello.payload else {
        panic!("expected Hello, got {:?}", hello.msg_type);
    };
    assert_eq!(version, PROTOCOL_VERSION);
    assert_eq!(username, "alice");
    assert_eq!(auth_method, Some(AuthMethod::Pubkey));

    conn.send_control(&Envelope {
        msg_type: MsgType::ServerHello,
        payload: Payload::ServerHello(ServerHelloPayload {
            session_id: "S1".to_string(),
            features: Vec::new(),
            fingerprints: Vec::new(),
        }),
    })
    .await;

    let nonce = b"test-nonce".to_vec();
    conn.send_control(&Envelope {
        msg_type: MsgType::Challenge,
        payload: Payload::Challenge(wsh_protocol::messages::ChallengePayload { nonce: nonce.clone() }),
    })
    .await;

    let auth = conn.recv_control().await;
    let Payload::Auth(AuthPayload { method, signature, public_key, .. }) = auth.payload else {
        panic!("expected Auth, got {:?}", auth.msg_type);
    };
    assert_eq!(method, AuthMethod::Pubkey);
    let signature = Signature::from_slice(&signature.expect("signature present")).expect("valid signature bytes");
    let public_key = public_key.expect("public key present");
    let transcript = build_transcript(PROTOCOL_VERSION, "S1", &nonce, None);
    let verifying_key = VerifyingKey::from_bytes(&public_key).expect("valid public key bytes");
    verifying_key.verify(&transcript, &signature).expect("signature verifies against the transcript");

    conn.send_control(&Envelope {
        msg_type: MsgType::AuthOk,
        payload: Payload::AuthOk(AuthOkPayload {
            session_id: "S1".to_string(),
            token: vec![1, 2, 3],
            ttl: 3600,
        }),
    })
    .await;

    let client = client_task.await.expect("client task join").expect("client connects");
    assert_eq!(client.session_id().await, "S1");
    assert_eq!(client.resume_token().await, vec![1, 2, 3]);
}

/// Drive a fake connection through `Hello`/`ServerHello`/`Auth`/`AuthOk` with password auth,
/// the simplest credential path, returning once the client is authenticated.
///
/// Password auth sends `AUTH` right after `SERVER_HELLO` without waiting for a `CHALLENGE`
/// (the nonce has no cryptographic role when the credential is a shared password), so this
/// fake server must not send one either — a conformant server never would.
async fn complete_password_handshake(conn: &mut wsh_integration_tests::fixtures::fake_server::FakeConn) {
    let hello = conn.recv_control().await;
    assert_eq!(hello.msg_type, MsgType::Hello);

    conn.send_control(&Envelope {
        msg_type: MsgType::ServerHello,
        payload: Payload::ServerHello(ServerHelloPayload {
            session_id: "S1".to_string(),
            features: Vec::new(),
            fingerprints: Vec::new(),
        }),
    })
    .await;

    let auth = conn.recv_control().await;
    assert_eq!(auth.msg_type, MsgType::Auth);

    conn.send_control(&Envelope {
        msg_type: MsgType::AuthOk,
        payload: Payload::AuthOk(AuthOkPayload { session_id: "S1".to_string(), token: vec![], ttl: 3600 }),
    })
    .await;
}

/// S2b: against a conformant server, password auth must send `AUTH` immediately after
/// `SERVER_HELLO`, never waiting for a `CHALLENGE` that a password-only server has no reason
/// to send.
#[tokio::test]
async fn s2b_password_handshake_skips_challenge() {
    let (server, url) = FakeServer::bind().await;
    let config = password_config(url, Duration::from_secs(5));

    let client_task = tokio::spawn(Client::connect(config, Arc::new(NullEventSink)));
    let mut conn = server.accept().await;
    complete_password_handshake(&mut conn).await;

    let client = client_task.await.expect("client task join").expect("client connects");
    assert_eq!(client.session_id().await, "S1");
}

fn password_config(url: String, timeout: Duration) -> ConnectConfig {
    ConnectConfig {
        url,
        username: "alice".to_string(),
        credentials: Credentials::Password("hunter2".to_string()),
        timeout,
        keepalive_interval: None,
    }
}

#[tokio::test]
async fn s3_exec_round_trip() {
    let (server, url) = FakeServer::bind().await;
    let config = password_config(url, Duration::from_secs(5));

    let exec_task =
        tokio::spawn(Client::exec(config, "echo hi".to_string(), Duration::from_secs(5)));

    let mut conn = server.accept().await;
    complete_password_handshake(&mut conn).await;

    let open = conn.recv_control().await;
    let Payload::Open(OpenPayload { kind, command, .. }) = open.payload else {
        panic!("expected Open, got {:?}", open.msg_type);
    };
    assert_eq!(kind, WireChannelKind::Exec);
    assert_eq!(command.as_deref(), Some("echo hi"));

    conn.send_control(&Envelope {
        msg_type: MsgType::OpenOk,
        payload: Payload::OpenOk(OpenOkPayload { channel_id: 7, stream_ids: vec![1] }),
    })
    .await;

    let FakeFrame::OpenStream { stream_id } = conn.recv_frame().await else {
        panic!("expected client to open the exec channel's data stream");
    };
    assert_eq!(stream_id, 1);

    conn.send_data(stream_id, b"hi\n").await;
    conn.close_stream(stream_id).await;

    conn.send_control(&Envelope {
        msg_type: MsgType::Exit,
        payload: Payload::Exit(ExitPayload { channel_id: 7, code: 0 }),
    })
    .await;
    conn.send_control(&Envelope {
        msg_type: MsgType::Close,
        payload: Payload::Close(ClosePayload { channel_id: 7 }),
    })
    .await;

    let (stdout, code) = exec_task.await.expect("exec task join").expect("exec succeeds");
    assert_eq!(stdout, b"hi\n");
    assert_eq!(code, Some(0));
}

#[tokio::test(start_paused = true)]
async fn s4_open_session_times_out_and_ignores_late_reply() {
    let (server, url) = FakeServer::bind().await;
    let config = password_config(url, Duration::from_secs(5));

    let open_task = tokio::spawn(async move {
        let client = Client::connect(config, Arc::new(NullEventSink)).await.expect("client connects");
        let result = client
            .open_session(ChannelKind::Exec, Some("sleep 1".to_string()), None, None, Vec::new())
            .await;
        (client, result)
    });

    let mut conn = server.accept().await;
    complete_password_handshake(&mut conn).await;

    let open = conn.recv_control().await;
    assert_eq!(open.msg_type, MsgType::Open);

    // Never send OpenOk/OpenFail: the waiter must time out on its own.
    let (client, result) = open_task.await.expect("open task join");
    assert!(matches!(result, Err(wsh_client::ClientError::Timeout)));

    // A late OpenOk arriving after the waiter gave up must not spawn a session; it is
    // merely an unclaimed control record the dispatch loop logs and drops.
    conn.send_control(&Envelope {
        msg_type: MsgType::OpenOk,
        payload: Payload::OpenOk(OpenOkPayload { channel_id: 99, stream_ids: vec![1] }),
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    client.disconnect().await.expect("disconnect cleanly");
}

#[tokio::test]
async fn s5_ping_idle_round_trip() {
    let (server, url) = FakeServer::bind().await;
    let config = ConnectConfig {
        url,
        username: "alice".to_string(),
        credentials: Credentials::Password("hunter2".to_string()),
        timeout: Duration::from_secs(5),
        // Disable the client's own keepalive ticker so only server-initiated pings are tested.
        keepalive_interval: Some(Duration::from_secs(3600)),
    };

    let client_task = tokio::spawn(Client::connect(config, Arc::new(NullEventSink)));
    let mut conn = server.accept().await;
    complete_password_handshake(&mut conn).await;
    let client = client_task.await.expect("client task join").expect("client connects");

    conn.send_control(&Envelope {
        msg_type: MsgType::Ping,
        payload: Payload::PingPong(wsh_protocol::messages::PingPongPayload { id: 42 }),
    })
    .await;

    let pong = conn.recv_control().await;
    assert_eq!(pong.msg_type, MsgType::Pong);
    let Payload::PingPong(pp) = pong.payload else { panic!("expected PingPong payload") };
    assert_eq!(pp.id, 42);

    conn.send_control(&Envelope {
        msg_type: MsgType::IdleWarning,
        payload: Payload::IdleWarning(wsh_protocol::messages::IdleWarningPayload { expires_in: 5 }),
    })
    .await;

    let ping = conn.recv_control().await;
    assert_eq!(ping.msg_type, MsgType::Ping);

    client.disconnect().await.expect("disconnect cleanly");
}

struct StreamOpenSink {
    tx: mpsc::UnboundedSender<StreamHalves>,
}

#[async_trait]
impl EventSink for StreamOpenSink {
    async fn on_control(&self, _record: wsh_protocol::Value) {}

    async fn on_stream_open(&self, stream: StreamHalves) {
        let _ = self.tx.send(stream);
    }

    async fn on_close(&self) {}

    async fn on_error(&self, _err: TransportError) {}
}

#[tokio::test]
async fn s6_virtual_stream_multiplexing() {
    let (server, url) = FakeServer::bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = Arc::new(StreamOpenSink { tx });

    let connect_task = tokio::spawn(wsh_transport::connect(url, sink));
    let mut conn = server.accept().await;

    let transport = connect_task.await.expect("connect task join").expect("transport connects");

    let s1 = transport.open_stream().await.expect("open stream 1");
    let s3 = transport.open_stream().await.expect("open stream 3");
    let s5 = transport.open_stream().await.expect("open stream 5");
    assert_eq!(s1.stream_id, 1);
    assert_eq!(s3.stream_id, 3);
    assert_eq!(s5.stream_id, 5);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let FakeFrame::OpenStream { stream_id } = conn.recv_frame().await else {
            panic!("expected OPEN_STREAM frame");
        };
        seen.push(stream_id);
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 3, 5]);

    // Server-initiated stream with an even id surfaces through on_stream_open.
    conn.open_stream(2).await;
    let peer_stream = rx.recv().await.expect("server-initiated stream arrives");
    assert_eq!(peer_stream.stream_id, 2);

    // Writes on two different client streams interleave at the frame level but each
    // stream's own bytes stay in order.
    conn.send_data(1, b"aaa").await;
    conn.send_data(3, b"bbb").await;
    conn.send_data(1, b"ccc").await;

    use tokio::io::AsyncReadExt;
    let mut reader1 = s1.inbound;
    let mut buf = [0u8; 3];
    reader1.read_exact(&mut buf).await.expect("read first chunk on stream 1");
    assert_eq!(&buf, b"aaa");
    reader1.read_exact(&mut buf).await.expect("read second chunk on stream 1");
    assert_eq!(&buf, b"ccc");

    let mut reader3 = s3.inbound;
    reader3.read_exact(&mut buf).await.expect("read chunk on stream 3");
    assert_eq!(&buf, b"bbb");

    drop(s5);
}
