//! The client orchestrator (§4.6): connect/handshake/authenticate, session
//! management, keepalive, reverse mode, file transfer, and remote tools.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::time;

use wsh_crypto::KeyStore;
use wsh_protocol::messages::{
    AuthFailPayload, AuthMethod, AuthOkPayload, AuthPayload, ChannelKind as WireChannelKind,
    ClosePayload, ExitPayload, HelloPayload, McpCallPayload, McpToolSpec, OpenPayload,
    PingPongPayload, ResizePayload, ReverseConnectPayload, ReverseRegisterPayload, SignalPayload,
};
use wsh_protocol::{Envelope, MsgType, Payload, Value, PROTOCOL_VERSION};
use wsh_transport::{EventSink, StreamHalves, Transport, TransportError};

use crate::error::ClientError;
use crate::session::{ChannelKind, ControlAction, Session, SessionNotifier};
use crate::waiter::WaiterTable;

const GATEWAY_RANGE_START: u8 = 0x70;
const GATEWAY_RANGE_END: u8 = 0x7F;
const RELAY_FORWARDABLE: &[MsgType] =
    &[MsgType::Open, MsgType::McpDiscover, MsgType::McpCall, MsgType::Close, MsgType::Resize, MsgType::Signal];

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const FILE_CHUNK_LEN: usize = 64 * 1024;

/// Run a `ClientEventSink` callback, catching a panic so a misbehaving callback can't take
/// down `dispatch_loop` (§7: handler exceptions are caught, logged, and swallowed).
async fn guard_event<F: std::future::Future<Output = ()>>(fut: F) {
    use futures::FutureExt;
    if let Err(payload) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        tracing::error!(panic = %panic_message(&payload), "event sink callback panicked");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// How the client authenticates during the handshake.
#[derive(Clone)]
pub enum Credentials {
    /// Ed25519 pubkey auth: sign the server's challenge with a named key store entry.
    Pubkey {
        /// Key store the named entry lives in.
        keystore: Arc<KeyStore>,
        /// Entry name within the store.
        key_name: String,
    },
    /// Plaintext password auth.
    Password(String),
}

/// Inputs to [`Client::connect`].
#[derive(Clone)]
pub struct ConnectConfig {
    /// Server URL; scheme selects the transport (§4.4).
    pub url: String,
    /// Username presented in `Hello`.
    pub username: String,
    /// Authentication credentials.
    pub credentials: Credentials,
    /// Overall handshake deadline.
    pub timeout: Duration,
    /// Keepalive ping interval. `None` disables keepalive.
    pub keepalive_interval: Option<Duration>,
}

/// Session/channel management and protocol-level callbacks a [`Client`] reports to (§6).
///
/// Re-expresses the spec's `onClose`/`onError`/`onReverseConnect`/`onClipboard`/
/// `onRelayMessage`/`onGatewayMessage` stored callbacks as trait methods on an
/// object supplied at construction, the same shape [`wsh_transport::EventSink`]
/// uses for transport-level events. Default implementations log and otherwise
/// do nothing, matching the spec's "handler exceptions are caught, logged, and
/// swallowed" propagation rule for the no-op default case.
#[async_trait]
pub trait ClientEventSink: Send + Sync {
    /// The client has fully disconnected.
    async fn on_close(&self) {}

    /// A server-originated `Error` record arrived. Does not terminate the client.
    async fn on_error(&self, code: u32, message: &str) {
        tracing::warn!(code, message, "server error");
    }

    /// A `ReverseConnect` record arrived, requesting this client (registered via
    /// [`Client::connect_reverse`]) open a channel back to the server on a peer's behalf.
    async fn on_reverse_connect(&self, envelope: &Envelope) {
        let _ = envelope;
    }

    /// An inbound clipboard record arrived (§6, 0x80-0x86 range; not yet assigned an opcode).
    async fn on_clipboard(&self, data: &[u8]) {
        let _ = data;
    }

    /// A relay-forwardable opcode arrived while the client is registered as a relay endpoint.
    async fn on_relay_message(&self, envelope: &Envelope) {
        let _ = envelope;
    }

    /// An opcode in the gateway range (0x70-0x7F) arrived with no waiter claiming it.
    async fn on_gateway_message(&self, envelope: &Envelope) {
        let _ = envelope;
    }
}

/// A [`ClientEventSink`] that does nothing, for callers with no use for the callbacks.
pub struct NullEventSink;

#[async_trait]
impl ClientEventSink for NullEventSink {}

enum InboundEvent {
    Control(Value),
    StreamOpen(StreamHalves),
    Closed,
    Error(TransportError),
}

struct DispatchSink {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

#[async_trait]
impl EventSink for DispatchSink {
    async fn on_control(&self, record: Value) {
        let _ = self.tx.send(InboundEvent::Control(record));
    }

    async fn on_stream_open(&self, stream: StreamHalves) {
        let _ = self.tx.send(InboundEvent::StreamOpen(stream));
    }

    async fn on_close(&self) {
        let _ = self.tx.send(InboundEvent::Closed);
    }

    async fn on_error(&self, err: TransportError) {
        let _ = self.tx.send(InboundEvent::Error(err));
    }
}

struct ChannelEntry {
    notifier: Arc<SessionNotifier>,
}

/// The client orchestrator: a connected, authenticated session with one wsh server.
pub struct Client {
    transport: Arc<dyn Transport>,
    waiters: Arc<Mutex<WaiterTable>>,
    channels: Arc<Mutex<HashMap<u32, ChannelEntry>>>,
    events: Arc<dyn ClientEventSink>,
    session_id: Mutex<String>,
    resume_token: Mutex<Vec<u8>>,
    ping_id: AtomicU64,
    control_action_tx: mpsc::UnboundedSender<ControlAction>,
    dispatch_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    keepalive_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    reverse_relay: std::sync::atomic::AtomicBool,
}

impl Client {
    /// Connect to `config.url`, perform the handshake, and start keepalive (§4.6 Connect).
    pub async fn connect(config: ConnectConfig, events: Arc<dyn ClientEventSink>) -> Result<Arc<Self>, ClientError> {
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<InboundEvent>();
        let sink = Arc::new(DispatchSink { tx: inbound_tx });
        let transport = wsh_transport::connect(&config.url, sink).await?;

        let (control_action_tx, control_action_rx) = mpsc::unbounded_channel::<ControlAction>();

        let handshake_result = time::timeout(
            config.timeout,
            handshake(&transport, &mut inbound_rx, &config),
        )
        .await;

        let (session_id, resume_token) = match handshake_result {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                let _ = transport.close().await;
                return Err(e);
            }
            Err(_) => {
                let _ = transport.close().await;
                return Err(ClientError::Timeout);
            }
        };

        let client = Arc::new(Self {
            transport: transport.clone(),
            waiters: Arc::new(Mutex::new(WaiterTable::new())),
            channels: Arc::new(Mutex::new(HashMap::new())),
            events,
            session_id: Mutex::new(session_id),
            resume_token: Mutex::new(resume_token),
            ping_id: AtomicU64::new(0),
            control_action_tx,
            dispatch_handle: Mutex::new(None),
            keepalive_handle: Mutex::new(None),
            reverse_relay: std::sync::atomic::AtomicBool::new(false),
        });

        let dispatch_handle = tokio::spawn(client.clone().dispatch_loop(inbound_rx, control_action_rx));
        *client.dispatch_handle.lock().await = Some(dispatch_handle);

        if let Some(interval) = config.keepalive_interval.or(Some(DEFAULT_KEEPALIVE_INTERVAL)) {
            let keepalive_handle = tokio::spawn(client.clone().keepalive_loop(interval));
            *client.keepalive_handle.lock().await = Some(keepalive_handle);
        }

        Ok(client)
    }

    /// The server-assigned session id, available once connected.
    pub async fn session_id(&self) -> String {
        self.session_id.lock().await.clone()
    }

    /// The resume token issued at authentication, for a later `Resume`.
    pub async fn resume_token(&self) -> Vec<u8> {
        self.resume_token.lock().await.clone()
    }

    async fn send_control(&self, envelope: &Envelope) -> Result<(), ClientError> {
        self.transport.send_control(&envelope.to_value()).await?;
        Ok(())
    }

    /// Send `envelope` and wait for the first of `expected` to arrive, honoring `timeout`.
    async fn send_and_wait(
        &self,
        envelope: Envelope,
        expected: Vec<MsgType>,
        timeout: Duration,
    ) -> Result<Envelope, ClientError> {
        let (id, rx) = {
            let mut waiters = self.waiters.lock().await;
            waiters.register_multi(expected.clone())
        };

        self.send_control(&envelope).await?;

        match time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::Channel("waiter channel dropped".into())),
            Err(_) => {
                self.waiters.lock().await.cancel(id, None);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Open a new channel (§4.6 Session open).
    pub async fn open_session(
        &self,
        kind: ChannelKind,
        command: Option<String>,
        cols: Option<u16>,
        rows: Option<u16>,
        env: Vec<(String, String)>,
    ) -> Result<Session, ClientError> {
        let wire_kind = to_wire_kind(kind);
        let envelope = Envelope {
            msg_type: MsgType::Open,
            payload: Payload::Open(OpenPayload { kind: wire_kind, command, cols, rows, env }),
        };

        let response = self
            .send_and_wait(envelope, vec![MsgType::OpenOk, MsgType::OpenFail], DEFAULT_REQUEST_TIMEOUT)
            .await?;

        match response.payload {
            Payload::OpenOk(ok) => {
                let stream = self.transport.open_stream().await?;
                let (session, notifier) = Session::new(
                    ok.channel_id,
                    kind,
                    stream.inbound,
                    stream.outbound,
                    self.control_action_tx.clone(),
                );
                self.channels.lock().await.insert(ok.channel_id, ChannelEntry { notifier });
                tracing::info!(channel_id = ok.channel_id, stream_ids = ?ok.stream_ids, "opened channel");
                Ok(session)
            }
            Payload::OpenFail(fail) => Err(ClientError::Channel(fail.reason)),
            _ => Err(ClientError::Protocol("unexpected response to Open".into())),
        }
    }

    /// Register this client as a reverse-mode listener (§4.6 Reverse mode).
    pub async fn connect_reverse(&self, username: String, public_key: [u8; 32], capabilities: Vec<String>) -> Result<(), ClientError> {
        self.reverse_relay.store(true, Ordering::Release);
        let envelope = Envelope {
            msg_type: MsgType::ReverseRegister,
            payload: Payload::ReverseRegister(ReverseRegisterPayload {
                username,
                capabilities,
                public_key: public_key.to_vec(),
            }),
        };
        self.send_control(&envelope).await
    }

    /// Fetch the directory of registered reverse peers (§4.6 Peer directory).
    pub async fn list_peers(&self, timeout: Duration) -> Result<Vec<wsh_protocol::messages::PeerInfo>, ClientError> {
        let envelope = Envelope { msg_type: MsgType::ReverseList, payload: Payload::Empty };
        let response = self.send_and_wait(envelope, vec![MsgType::ReversePeers], timeout).await?;
        match response.payload {
            Payload::ReversePeers(peers) => Ok(peers.peers),
            _ => Err(ClientError::Protocol("unexpected response to ReverseList".into())),
        }
    }

    /// Request a reverse connection to a registered peer by fingerprint (or prefix).
    pub async fn reverse_connect_to(&self, target_fingerprint: String, username: String) -> Result<(), ClientError> {
        let envelope = Envelope {
            msg_type: MsgType::ReverseConnect,
            payload: Payload::ReverseConnect(ReverseConnectPayload { target_fingerprint, username }),
        };
        self.send_control(&envelope).await
    }

    /// Upload `bytes` to `remote_path`, reporting progress per 64 KiB chunk (§4.6 File transfer).
    pub async fn upload(
        &self,
        bytes: &[u8],
        remote_path: &str,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<(), ClientError> {
        let mut session = self
            .open_session(ChannelKind::File, Some(format!("upload:{remote_path}")), None, None, Vec::new())
            .await?;

        let total = bytes.len();
        let mut sent = 0;
        for chunk in bytes.chunks(FILE_CHUNK_LEN) {
            session.write(chunk).await.map_err(ClientError::Session)?;
            sent += chunk.len();
            on_progress(sent, total);
        }
        session.close().await.map_err(ClientError::Session)?;
        session.wait_exit().await;
        Ok(())
    }

    /// Download `remote_path`, returning its full contents (§4.6 File transfer).
    pub async fn download(&self, remote_path: &str) -> Result<Vec<u8>, ClientError> {
        let mut session = self
            .open_session(ChannelKind::File, Some(format!("download:{remote_path}")), None, None, Vec::new())
            .await?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; FILE_CHUNK_LEN];
        loop {
            let n = session.read(&mut chunk).await.map_err(ClientError::Session)?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        Ok(buf)
    }

    /// Discover the remote's advertised MCP tool list (§4.6 Remote tools).
    pub async fn discover_tools(&self, timeout: Duration) -> Result<Vec<McpToolSpec>, ClientError> {
        let envelope = Envelope { msg_type: MsgType::McpDiscover, payload: Payload::Empty };
        let response = self.send_and_wait(envelope, vec![MsgType::McpTools], timeout).await?;
        match response.payload {
            Payload::McpTools(tools) => Ok(tools.tools),
            _ => Err(ClientError::Protocol("unexpected response to McpDiscover".into())),
        }
    }

    /// Invoke a remote MCP tool by name (§4.6 Remote tools).
    pub async fn call_tool(&self, tool: String, arguments: Value, timeout: Duration) -> Result<Value, ClientError> {
        let envelope = Envelope {
            msg_type: MsgType::McpCall,
            payload: Payload::McpCall(McpCallPayload { tool, arguments }),
        };
        let response = self.send_and_wait(envelope, vec![MsgType::McpResult], timeout).await?;
        match response.payload {
            Payload::McpResult(result) => Ok(result.result),
            _ => Err(ClientError::Protocol("unexpected response to McpCall".into())),
        }
    }

    /// One-shot command execution: connect, run, collect output, disconnect (§4.6 One-shot exec).
    pub async fn exec(
        config: ConnectConfig,
        command: String,
        timeout: Duration,
    ) -> Result<(Vec<u8>, Option<i32>), ClientError> {
        let deadline = time::Instant::now() + timeout;
        let client = Self::connect(config, Arc::new(NullEventSink)).await?;

        let result = time::timeout_at(deadline, async {
            let mut session = client
                .open_session(ChannelKind::Exec, Some(command), None, None, Vec::new())
                .await?;

            let mut out = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                let n = session.read(&mut chunk).await.map_err(ClientError::Session)?;
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&chunk[..n]);
            }
            let code = session.wait_exit().await;
            Ok::<_, ClientError>((out, code))
        })
        .await;

        client.disconnect().await?;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(ClientError::Timeout),
        }
    }

    /// Disconnect: stop keepalive, close every channel, close the transport, reject every
    /// pending waiter (§4.6 Disconnect, §5 Cancellation).
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        if let Some(h) = self.dispatch_handle.lock().await.take() {
            h.abort();
        }
        if let Some(h) = self.keepalive_handle.lock().await.take() {
            h.abort();
        }

        {
            let channels = self.channels.lock().await;
            for entry in channels.values() {
                entry.notifier.notify_closed(None).await;
            }
        }

        self.waiters.lock().await.clear();
        self.transport.close().await?;
        guard_event(self.events.on_close()).await;
        Ok(())
    }

    async fn keepalive_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let id = self.ping_id.fetch_add(1, Ordering::Relaxed);
            let envelope =
                Envelope { msg_type: MsgType::Ping, payload: Payload::PingPong(PingPongPayload { id }) };
            if self.send_control(&envelope).await.is_err() {
                break;
            }
        }
        tracing::debug!("keepalive loop ended");
    }

    async fn dispatch_loop(
        self: Arc<Self>,
        mut inbound_rx: mpsc::UnboundedReceiver<InboundEvent>,
        mut action_rx: mpsc::UnboundedReceiver<ControlAction>,
    ) {
        loop {
            tokio::select! {
                Some(action) = action_rx.recv() => {
                    let envelope = action_envelope(action);
                    if let Err(e) = self.send_control(&envelope).await {
                        tracing::error!(error = %e, "failed to send control action");
                    }
                }
                Some(event) = inbound_rx.recv() => {
                    match event {
                        InboundEvent::Control(value) => {
                            match Envelope::from_value(&value) {
                                Ok(envelope) => self.handle_incoming(envelope).await,
                                Err(e) => tracing::warn!(error = %e, "failed to decode control record"),
                            }
                        }
                        InboundEvent::StreamOpen(stream) => {
                            tracing::debug!(stream_id = stream.stream_id, "peer opened a stream outside an Open/OpenOk exchange");
                        }
                        InboundEvent::Closed => {
                            self.mark_all_channels_closed(None).await;
                            guard_event(self.events.on_close()).await;
                            break;
                        }
                        InboundEvent::Error(err) => {
                            tracing::error!(error = %err, "transport error");
                            self.mark_all_channels_closed(None).await;
                            guard_event(self.events.on_close()).await;
                            break;
                        }
                    }
                }
                else => break,
            }
        }
        tracing::debug!("dispatch loop ended");
    }

    async fn mark_all_channels_closed(&self, exit_code: Option<i32>) {
        let channels = self.channels.lock().await;
        for entry in channels.values() {
            entry.notifier.notify_closed(exit_code).await;
        }
        self.waiters.lock().await.clear();
    }

    async fn handle_incoming(&self, envelope: Envelope) {
        let opcode = u8::from(envelope.msg_type);

        let claimed = self.waiters.lock().await.resolve(envelope.clone());
        if claimed {
            return;
        }

        if (GATEWAY_RANGE_START..=GATEWAY_RANGE_END).contains(&opcode) {
            guard_event(self.events.on_gateway_message(&envelope)).await;
            return;
        }

        if self.reverse_relay.load(Ordering::Acquire) && RELAY_FORWARDABLE.contains(&envelope.msg_type) {
            guard_event(self.events.on_relay_message(&envelope)).await;
            return;
        }

        if let Some(channel_id) = channel_id_of(&envelope) {
            if !matches!(envelope.msg_type, MsgType::Exit | MsgType::Close) {
                // Resize/Signal acks and similar channel-scoped records are informational
                // (§4.5) and must not affect session state.
                tracing::debug!(channel_id, msg_type = ?envelope.msg_type, "informational channel record");
                return;
            }
            let remove = envelope.msg_type == MsgType::Close;
            let mut channels = self.channels.lock().await;
            if let Some(entry) = channels.get(&channel_id) {
                let exit_code = match &envelope.payload {
                    Payload::Exit(ExitPayload { code, .. }) => Some(*code),
                    _ => None,
                };
                entry.notifier.notify_closed(exit_code).await;
            }
            if remove {
                channels.remove(&channel_id);
            }
            return;
        }

        match envelope.msg_type {
            MsgType::Ping => {
                if let Payload::PingPong(pp) = &envelope.payload {
                    let pong =
                        Envelope { msg_type: MsgType::Pong, payload: Payload::PingPong(PingPongPayload { id: pp.id }) };
                    let _ = self.send_control(&pong).await;
                }
            }
            MsgType::Pong => {
                tracing::trace!("received pong");
            }
            MsgType::Error => {
                if let Payload::Error(err) = &envelope.payload {
                    guard_event(self.events.on_error(err.code, &err.message)).await;
                }
            }
            MsgType::Shutdown => {
                if let Payload::Shutdown(sd) = &envelope.payload {
                    tracing::warn!(reason = %sd.reason, "server shutdown notice");
                }
                let _ = self.disconnect().await;
            }
            MsgType::IdleWarning => {
                let id = self.ping_id.fetch_add(1, Ordering::Relaxed);
                let ping =
                    Envelope { msg_type: MsgType::Ping, payload: Payload::PingPong(PingPongPayload { id }) };
                let _ = self.send_control(&ping).await;
            }
            MsgType::ReverseConnect => {
                guard_event(self.events.on_reverse_connect(&envelope)).await;
            }
            MsgType::Presence | MsgType::ControlChanged | MsgType::Metrics => {
                tracing::debug!(msg_type = ?envelope.msg_type, "informational record");
            }
            other => {
                tracing::debug!(msg_type = ?other, "unhandled control record");
            }
        }
    }
}

fn channel_id_of(envelope: &Envelope) -> Option<u32> {
    match &envelope.payload {
        Payload::OpenOk(p) => Some(p.channel_id),
        Payload::Resize(ResizePayload { channel_id, .. }) => Some(*channel_id),
        Payload::Signal(SignalPayload { channel_id, .. }) => Some(*channel_id),
        Payload::Exit(ExitPayload { channel_id, .. }) => Some(*channel_id),
        Payload::Close(ClosePayload { channel_id }) => Some(*channel_id),
        _ => None,
    }
}

fn action_envelope(action: ControlAction) -> Envelope {
    match action {
        ControlAction::Resize { channel_id, cols, rows } => {
            Envelope { msg_type: MsgType::Resize, payload: Payload::Resize(ResizePayload { channel_id, cols, rows }) }
        }
        ControlAction::Signal { channel_id, signal } => {
            Envelope { msg_type: MsgType::Signal, payload: Payload::Signal(SignalPayload { channel_id, signal }) }
        }
        ControlAction::Close { channel_id } => {
            Envelope { msg_type: MsgType::Close, payload: Payload::Close(ClosePayload { channel_id }) }
        }
    }
}

fn to_wire_kind(kind: ChannelKind) -> WireChannelKind {
    match kind {
        ChannelKind::Pty => WireChannelKind::Pty,
        ChannelKind::Exec => WireChannelKind::Exec,
        ChannelKind::File => WireChannelKind::File,
        ChannelKind::Gateway => WireChannelKind::Tcp,
    }
}

/// Pull directly from `inbound_rx` until the handshake (§4.6 Connect, steps 2-6) completes,
/// returning the server-assigned session id and resume token.
async fn handshake(
    transport: &Arc<dyn Transport>,
    inbound_rx: &mut mpsc::UnboundedReceiver<InboundEvent>,
    config: &ConnectConfig,
) -> Result<(String, Vec<u8>), ClientError> {
    let auth_method = match &config.credentials {
        Credentials::Pubkey { .. } => AuthMethod::Pubkey,
        Credentials::Password(_) => AuthMethod::Password,
    };

    let hello = Envelope {
        msg_type: MsgType::Hello,
        payload: Payload::Hello(HelloPayload {
            version: PROTOCOL_VERSION.to_string(),
            username: config.username.clone(),
            features: vec!["mcp".to_string(), "file-transfer".to_string()],
            auth_method: Some(auth_method),
        }),
    };
    transport.send_control(&hello.to_value()).await?;

    let mut tentative_session_id = String::new();
    let mut server_nonce: Option<Vec<u8>> = None;

    loop {
        let envelope = next_control(inbound_rx).await?;
        match envelope.payload {
            Payload::ServerHello(sh) => {
                tentative_session_id = sh.session_id;
                if matches!(&config.credentials, Credentials::Password(_)) {
                    break;
                }
            }
            Payload::Challenge(c) => {
                server_nonce = Some(c.nonce);
                break;
            }
            Payload::AuthFail(AuthFailPayload { reason }) => {
                return Err(ClientError::AuthFailed(reason));
            }
            Payload::AuthOk(AuthOkPayload { session_id, token, .. }) => {
                return Ok((session_id, token));
            }
            _ => continue,
        }
    }

    let auth_envelope = match &config.credentials {
        Credentials::Pubkey { keystore, key_name } => {
            let nonce = server_nonce.ok_or_else(|| ClientError::Protocol("missing challenge nonce".into()))?;
            let transcript =
                wsh_crypto::transcript::build_transcript(PROTOCOL_VERSION, &tentative_session_id, &nonce, None);
            let signature = keystore.sign(key_name, &transcript).await?;
            let public_key = keystore.public_key_bytes(key_name).await?;
            Envelope {
                msg_type: MsgType::Auth,
                payload: Payload::Auth(AuthPayload {
                    method: AuthMethod::Pubkey,
                    signature: Some(signature.to_bytes().to_vec()),
                    public_key: Some(public_key.to_vec()),
                    password: None,
                }),
            }
        }
        Credentials::Password(password) => Envelope {
            msg_type: MsgType::Auth,
            payload: Payload::Auth(AuthPayload {
                method: AuthMethod::Password,
                signature: None,
                public_key: None,
                password: Some(password.clone()),
            }),
        },
    };
    transport.send_control(&auth_envelope.to_value()).await?;

    loop {
        let envelope = next_control(inbound_rx).await?;
        match envelope.payload {
            Payload::AuthOk(AuthOkPayload { session_id, token, .. }) => return Ok((session_id, token)),
            Payload::AuthFail(AuthFailPayload { reason }) => return Err(ClientError::AuthFailed(reason)),
            _ => continue,
        }
    }
}

async fn next_control(inbound_rx: &mut mpsc::UnboundedReceiver<InboundEvent>) -> Result<Envelope, ClientError> {
    loop {
        match inbound_rx.recv().await {
            Some(InboundEvent::Control(value)) => return Ok(Envelope::from_value(&value)?),
            Some(InboundEvent::Error(err)) => return Err(ClientError::Transport(err)),
            Some(InboundEvent::Closed) => return Err(ClientError::NotConnected),
            Some(InboundEvent::StreamOpen(_)) => continue,
            None => return Err(ClientError::NotConnected),
        }
    }
}
