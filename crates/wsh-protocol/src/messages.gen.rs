//! wsh protocol control message types.
//! AUTO-GENERATED from schema/wsh-v1.yaml — do not edit.
//! Run: cargo xtask codegen

use crate::codec::Value;
use crate::error::SchemaError;

/// Protocol version string exchanged in `Hello`/`ServerHello`.
pub const PROTOCOL_VERSION: &str = "wsh-v1";

/// Numeric message type tags, one per control record kind (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    /// Client greeting: protocol version, username, requested features.
    Hello = 0x01,
    /// Server greeting in response to `Hello`.
    ServerHello = 0x02,
    /// Server-issued authentication challenge nonce.
    Challenge = 0x03,
    /// Server-advertised authentication methods.
    AuthMethods = 0x04,
    /// Client authentication attempt.
    Auth = 0x05,
    /// Authentication succeeded.
    AuthOk = 0x06,
    /// Authentication failed.
    AuthFail = 0x07,

    /// Open a new channel (pty, exec, file, tcp, udp).
    Open = 0x10,
    /// Channel opened successfully.
    OpenOk = 0x11,
    /// Channel open request failed.
    OpenFail = 0x12,
    /// Pty resize notification.
    Resize = 0x13,
    /// Forward a signal to a channel's process.
    Signal = 0x14,
    /// Channel process exited.
    Exit = 0x15,
    /// Close a channel.
    Close = 0x16,

    /// Protocol-level error report.
    Error = 0x20,
    /// Keepalive ping.
    Ping = 0x21,
    /// Keepalive pong.
    Pong = 0x22,

    /// Attach a control connection to an existing session.
    Attach = 0x30,
    /// Resume a session after a disconnect, replaying from `last_seq`.
    Resume = 0x31,
    /// Rename a session.
    Rename = 0x32,
    /// Warn an attached controller the session will idle-expire soon.
    IdleWarning = 0x33,
    /// Server-initiated session shutdown notice.
    Shutdown = 0x34,
    /// Request a named output snapshot/checkpoint.
    Snapshot = 0x35,
    /// Report the set of clients currently attached to a session.
    Presence = 0x36,
    /// Notify that session control passed to a different attachment.
    ControlChanged = 0x37,
    /// Periodic session resource/latency metrics.
    Metrics = 0x38,

    /// Discover available MCP tools.
    McpDiscover = 0x40,
    /// Advertised MCP tool list.
    McpTools = 0x41,
    /// Invoke an MCP tool.
    McpCall = 0x42,
    /// Result of an MCP tool invocation.
    McpResult = 0x43,

    /// Register this client as a reverse-mode listener.
    ReverseRegister = 0x50,
    /// Request the list of registered reverse peers.
    ReverseList = 0x51,
    /// Advertised reverse peer directory.
    ReversePeers = 0x52,
    /// Request a reverse connection to a registered peer.
    ReverseConnect = 0x53,

    /// Open an outbound TCP connection through the gateway.
    OpenTcp = 0x70,
    /// Open an outbound UDP association through the gateway.
    OpenUdp = 0x71,
    /// Resolve a DNS name through the gateway.
    ResolveDns = 0x72,
    /// Gateway connection established.
    GatewayOk = 0x73,
    /// Gateway connection attempt failed.
    GatewayFail = 0x74,
    /// Gateway connection closed.
    GatewayClose = 0x75,
    /// Inbound connection arrived on a remote listener.
    InboundOpen = 0x76,
    /// Accept an inbound connection.
    InboundAccept = 0x77,
    /// Reject an inbound connection.
    InboundReject = 0x78,
    /// DNS resolution result.
    DnsResult = 0x79,
    /// Request a remote listener be opened.
    ListenRequest = 0x7A,
    /// Remote listener opened.
    ListenOk = 0x7B,
    /// Remote listener request failed.
    ListenFail = 0x7C,
    /// Remote listener closed.
    ListenClose = 0x7D,
    /// Data forwarded over an established gateway connection.
    GatewayData = 0x7E,
}

impl From<MsgType> for u8 {
    fn from(m: MsgType) -> u8 {
        m as u8
    }
}

impl TryFrom<u8> for MsgType {
    type Error = SchemaError;

    fn try_from(v: u8) -> Result<Self, SchemaError> {
        match v {
            0x01 => Ok(Self::Hello),
            0x02 => Ok(Self::ServerHello),
            0x03 => Ok(Self::Challenge),
            0x04 => Ok(Self::AuthMethods),
            0x05 => Ok(Self::Auth),
            0x06 => Ok(Self::AuthOk),
            0x07 => Ok(Self::AuthFail),
            0x10 => Ok(Self::Open),
            0x11 => Ok(Self::OpenOk),
            0x12 => Ok(Self::OpenFail),
            0x13 => Ok(Self::Resize),
            0x14 => Ok(Self::Signal),
            0x15 => Ok(Self::Exit),
            0x16 => Ok(Self::Close),
            0x20 => Ok(Self::Error),
            0x21 => Ok(Self::Ping),
            0x22 => Ok(Self::Pong),
            0x30 => Ok(Self::Attach),
            0x31 => Ok(Self::Resume),
            0x32 => Ok(Self::Rename),
            0x33 => Ok(Self::IdleWarning),
            0x34 => Ok(Self::Shutdown),
            0x35 => Ok(Self::Snapshot),
            0x36 => Ok(Self::Presence),
            0x37 => Ok(Self::ControlChanged),
            0x38 => Ok(Self::Metrics),
            0x40 => Ok(Self::McpDiscover),
            0x41 => Ok(Self::McpTools),
            0x42 => Ok(Self::McpCall),
            0x43 => Ok(Self::McpResult),
            0x50 => Ok(Self::ReverseRegister),
            0x51 => Ok(Self::ReverseList),
            0x52 => Ok(Self::ReversePeers),
            0x53 => Ok(Self::ReverseConnect),
            0x70 => Ok(Self::OpenTcp),
            0x71 => Ok(Self::OpenUdp),
            0x72 => Ok(Self::ResolveDns),
            0x73 => Ok(Self::GatewayOk),
            0x74 => Ok(Self::GatewayFail),
            0x75 => Ok(Self::GatewayClose),
            0x76 => Ok(Self::InboundOpen),
            0x77 => Ok(Self::InboundAccept),
            0x78 => Ok(Self::InboundReject),
            0x79 => Ok(Self::DnsResult),
            0x7A => Ok(Self::ListenRequest),
            0x7B => Ok(Self::ListenOk),
            0x7C => Ok(Self::ListenFail),
            0x7D => Ok(Self::ListenClose),
            0x7E => Ok(Self::GatewayData),
            other => Err(SchemaError::UnknownOpcode(other)),
        }
    }
}

/// Kind of channel requested by an `Open` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Interactive pty.
    Pty,
    /// Non-interactive one-shot command.
    Exec,
    /// Control-only metadata channel.
    Meta,
    /// File transfer channel.
    File,
    /// Gateway-forwarded TCP stream.
    Tcp,
    /// Gateway-forwarded UDP association.
    Udp,
}

impl ChannelKind {
    const FIELD: &'static str = "kind";

    fn as_str(self) -> &'static str {
        match self {
            Self::Pty => "pty",
            Self::Exec => "exec",
            Self::Meta => "meta",
            Self::File => "file",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }

    fn parse(s: &str) -> Result<Self, SchemaError> {
        match s {
            "pty" => Ok(Self::Pty),
            "exec" => Ok(Self::Exec),
            "meta" => Ok(Self::Meta),
            "file" => Ok(Self::File),
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(SchemaError::InvalidEnumValue {
                field: Self::FIELD,
                value: other.to_string(),
            }),
        }
    }
}

/// Authentication method offered or chosen during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Ed25519 public-key authentication.
    Pubkey,
    /// Password authentication.
    Password,
}

impl AuthMethod {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pubkey => "pubkey",
            Self::Password => "password",
        }
    }

    fn parse(s: &str) -> Result<Self, SchemaError> {
        match s {
            "pubkey" => Ok(Self::Pubkey),
            "password" => Ok(Self::Password),
            other => Err(SchemaError::InvalidEnumValue {
                field: "method",
                value: other.to_string(),
            }),
        }
    }
}

/// Field-extraction helpers shared by every payload's `from_value`.
mod fields {
    use super::{SchemaError, Value};

    pub fn text(m: &Value, key: &'static str) -> Result<String, SchemaError> {
        m.get(key)
            .and_then(Value::as_text)
            .map(str::to_string)
            .ok_or(SchemaError::MissingField(key))
    }

    pub fn opt_text(m: &Value, key: &'static str) -> Option<String> {
        m.get(key).and_then(Value::as_text).map(str::to_string)
    }

    pub fn u64_(m: &Value, key: &'static str) -> Result<u64, SchemaError> {
        m.get(key).and_then(Value::as_uint).ok_or(SchemaError::MissingField(key))
    }

    pub fn opt_u64(m: &Value, key: &'static str) -> Option<u64> {
        m.get(key).and_then(Value::as_uint)
    }

    pub fn u32_(m: &Value, key: &'static str) -> Result<u32, SchemaError> {
        u64_(m, key).map(|v| v as u32)
    }

    pub fn u16_(m: &Value, key: &'static str) -> Result<u16, SchemaError> {
        u64_(m, key).map(|v| v as u16)
    }

    pub fn opt_u32(m: &Value, key: &'static str) -> Option<u32> {
        opt_u64(m, key).map(|v| v as u32)
    }

    pub fn i32_(m: &Value, key: &'static str) -> Result<i32, SchemaError> {
        m.get(key)
            .and_then(Value::as_int)
            .map(|v| v as i32)
            .ok_or(SchemaError::MissingField(key))
    }

    pub fn opt_f64(m: &Value, key: &'static str) -> Option<f64> {
        m.get(key).and_then(Value::as_float)
    }

    pub fn bytes(m: &Value, key: &'static str) -> Result<Vec<u8>, SchemaError> {
        m.get(key)
            .and_then(Value::as_bytes)
            .map(<[u8]>::to_vec)
            .ok_or(SchemaError::MissingField(key))
    }

    pub fn opt_bytes(m: &Value, key: &'static str) -> Option<Vec<u8>> {
        m.get(key).and_then(Value::as_bytes).map(<[u8]>::to_vec)
    }

    pub fn vec_text(m: &Value, key: &'static str) -> Vec<String> {
        m.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_text)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn array(m: &Value, key: &'static str) -> &[Value] {
        m.get(key).and_then(Value::as_array).unwrap_or(&[])
    }
}

/// Every control message is a tagged opcode plus a payload record (§4.2, §6).
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Which record this envelope carries.
    pub msg_type: MsgType,
    /// The record's fields.
    pub payload: Payload,
}

impl Envelope {
    /// Encode this envelope into the canonical wire `Value` for one control record.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut fields = self.payload.to_value_fields();
        fields.insert(0, ("type".to_string(), Value::UInt(u8::from(self.msg_type) as u64)));
        Value::Map(fields)
    }

    /// Decode an envelope from a previously-decoded canonical `Value`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the opcode is unrecognized or the payload
    /// does not match the shape its record type requires.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let opcode = fields::u64_(value, "type")? as u8;
        let msg_type = MsgType::try_from(opcode)?;
        let payload = Payload::from_value(msg_type, value)?;
        Ok(Self { msg_type, payload })
    }
}

/// All possible message payloads, one variant per [`MsgType`].
#[derive(Debug, Clone)]
pub enum Payload {
    /// See [`HelloPayload`].
    Hello(HelloPayload),
    /// See [`ServerHelloPayload`].
    ServerHello(ServerHelloPayload),
    /// See [`ChallengePayload`].
    Challenge(ChallengePayload),
    /// See [`AuthMethodsPayload`].
    AuthMethods(AuthMethodsPayload),
    /// See [`AuthPayload`].
    Auth(AuthPayload),
    /// See [`AuthOkPayload`].
    AuthOk(AuthOkPayload),
    /// See [`AuthFailPayload`].
    AuthFail(AuthFailPayload),
    /// See [`OpenPayload`].
    Open(OpenPayload),
    /// See [`OpenOkPayload`].
    OpenOk(OpenOkPayload),
    /// See [`OpenFailPayload`].
    OpenFail(OpenFailPayload),
    /// See [`ResizePayload`].
    Resize(ResizePayload),
    /// See [`SignalPayload`].
    Signal(SignalPayload),
    /// See [`ExitPayload`].
    Exit(ExitPayload),
    /// See [`ClosePayload`].
    Close(ClosePayload),
    /// See [`ErrorPayload`].
    Error(ErrorPayload),
    /// Shared by `Ping` and `Pong`. See [`PingPongPayload`].
    PingPong(PingPongPayload),
    /// See [`AttachPayload`].
    Attach(AttachPayload),
    /// See [`ResumePayload`].
    Resume(ResumePayload),
    /// See [`RenamePayload`].
    Rename(RenamePayload),
    /// See [`IdleWarningPayload`].
    IdleWarning(IdleWarningPayload),
    /// See [`ShutdownPayload`].
    Shutdown(ShutdownPayload),
    /// See [`SnapshotPayload`].
    Snapshot(SnapshotPayload),
    /// See [`PresencePayload`].
    Presence(PresencePayload),
    /// See [`ControlChangedPayload`].
    ControlChanged(ControlChangedPayload),
    /// See [`MetricsPayload`].
    Metrics(MetricsPayload),
    /// See [`McpToolsPayload`].
    McpTools(McpToolsPayload),
    /// See [`McpCallPayload`].
    McpCall(McpCallPayload),
    /// See [`McpResultPayload`].
    McpResult(McpResultPayload),
    /// See [`ReverseRegisterPayload`].
    ReverseRegister(ReverseRegisterPayload),
    /// See [`ReversePeersPayload`].
    ReversePeers(ReversePeersPayload),
    /// See [`ReverseConnectPayload`].
    ReverseConnect(ReverseConnectPayload),
    /// See [`OpenTcpPayload`].
    OpenTcp(OpenTcpPayload),
    /// See [`OpenUdpPayload`].
    OpenUdp(OpenUdpPayload),
    /// See [`ResolveDnsPayload`].
    ResolveDns(ResolveDnsPayload),
    /// See [`GatewayOkPayload`].
    GatewayOk(GatewayOkPayload),
    /// See [`GatewayFailPayload`].
    GatewayFail(GatewayFailPayload),
    /// See [`GatewayClosePayload`].
    GatewayClose(GatewayClosePayload),
    /// See [`InboundOpenPayload`].
    InboundOpen(InboundOpenPayload),
    /// See [`InboundAcceptPayload`].
    InboundAccept(InboundAcceptPayload),
    /// See [`InboundRejectPayload`].
    InboundReject(InboundRejectPayload),
    /// See [`DnsResultPayload`].
    DnsResult(DnsResultPayload),
    /// See [`ListenRequestPayload`].
    ListenRequest(ListenRequestPayload),
    /// See [`ListenOkPayload`].
    ListenOk(ListenOkPayload),
    /// See [`ListenFailPayload`].
    ListenFail(ListenFailPayload),
    /// See [`ListenClosePayload`].
    ListenClose(ListenClosePayload),
    /// See [`GatewayDataPayload`].
    GatewayData(GatewayDataPayload),
    /// A record with no fields beyond its opcode (`McpDiscover`, `ReverseList`).
    Empty,
}

impl Payload {
    fn to_value_fields(&self) -> Vec<(String, Value)> {
        match self {
            Self::Hello(p) => p.to_fields(),
            Self::ServerHello(p) => p.to_fields(),
            Self::Challenge(p) => p.to_fields(),
            Self::AuthMethods(p) => p.to_fields(),
            Self::Auth(p) => p.to_fields(),
            Self::AuthOk(p) => p.to_fields(),
            Self::AuthFail(p) => p.to_fields(),
            Self::Open(p) => p.to_fields(),
            Self::OpenOk(p) => p.to_fields(),
            Self::OpenFail(p) => p.to_fields(),
            Self::Resize(p) => p.to_fields(),
            Self::Signal(p) => p.to_fields(),
            Self::Exit(p) => p.to_fields(),
            Self::Close(p) => p.to_fields(),
            Self::Error(p) => p.to_fields(),
            Self::PingPong(p) => p.to_fields(),
            Self::Attach(p) => p.to_fields(),
            Self::Resume(p) => p.to_fields(),
            Self::Rename(p) => p.to_fields(),
            Self::IdleWarning(p) => p.to_fields(),
            Self::Shutdown(p) => p.to_fields(),
            Self::Snapshot(p) => p.to_fields(),
            Self::Presence(p) => p.to_fields(),
            Self::ControlChanged(p) => p.to_fields(),
            Self::Metrics(p) => p.to_fields(),
            Self::McpTools(p) => p.to_fields(),
            Self::McpCall(p) => p.to_fields(),
            Self::McpResult(p) => p.to_fields(),
            Self::ReverseRegister(p) => p.to_fields(),
            Self::ReversePeers(p) => p.to_fields(),
            Self::ReverseConnect(p) => p.to_fields(),
            Self::OpenTcp(p) => p.to_fields(),
            Self::OpenUdp(p) => p.to_fields(),
            Self::ResolveDns(p) => p.to_fields(),
            Self::GatewayOk(p) => p.to_fields(),
            Self::GatewayFail(p) => p.to_fields(),
            Self::GatewayClose(p) => p.to_fields(),
            Self::InboundOpen(p) => p.to_fields(),
            Self::InboundAccept(p) => p.to_fields(),
            Self::InboundReject(p) => p.to_fields(),
            Self::DnsResult(p) => p.to_fields(),
            Self::ListenRequest(p) => p.to_fields(),
            Self::ListenOk(p) => p.to_fields(),
            Self::ListenFail(p) => p.to_fields(),
            Self::ListenClose(p) => p.to_fields(),
            Self::GatewayData(p) => p.to_fields(),
            Self::Empty => Vec::new(),
        }
    }

    fn from_value(msg_type: MsgType, v: &Value) -> Result<Self, SchemaError> {
        Ok(match msg_type {
            MsgType::Hello => Self::Hello(HelloPayload::from_value(v)?),
            MsgType::ServerHello => Self::ServerHello(ServerHelloPayload::from_value(v)?),
            MsgType::Challenge => Self::Challenge(ChallengePayload::from_value(v)?),
            MsgType::AuthMethods => Self::AuthMethods(AuthMethodsPayload::from_value(v)?),
            MsgType::Auth => Self::Auth(AuthPayload::from_value(v)?),
            MsgType::AuthOk => Self::AuthOk(AuthOkPayload::from_value(v)?),
            MsgType::AuthFail => Self::AuthFail(AuthFailPayload::from_value(v)?),
            MsgType::Open => Self::Open(OpenPayload::from_value(v)?),
            MsgType::OpenOk => Self::OpenOk(OpenOkPayload::from_value(v)?),
            MsgType::OpenFail => Self::OpenFail(OpenFailPayload::from_value(v)?),
            MsgType::Resize => Self::Resize(ResizePayload::from_value(v)?),
            MsgType::Signal => Self::Signal(SignalPayload::from_value(v)?),
            MsgType::Exit => Self::Exit(ExitPayload::from_value(v)?),
            MsgType::Close => Self::Close(ClosePayload::from_value(v)?),
            MsgType::Error => Self::Error(ErrorPayload::from_value(v)?),
            MsgType::Ping | MsgType::Pong => Self::PingPong(PingPongPayload::from_value(v)?),
            MsgType::Attach => Self::Attach(AttachPayload::from_value(v)?),
            MsgType::Resume => Self::Resume(ResumePayload::from_value(v)?),
            MsgType::Rename => Self::Rename(RenamePayload::from_value(v)?),
            MsgType::IdleWarning => Self::IdleWarning(IdleWarningPayload::from_value(v)?),
            MsgType::Shutdown => Self::Shutdown(ShutdownPayload::from_value(v)?),
            MsgType::Snapshot => Self::Snapshot(SnapshotPayload::from_value(v)?),
            MsgType::Presence => Self::Presence(PresencePayload::from_value(v)?),
            MsgType::ControlChanged => Self::ControlChanged(ControlChangedPayload::from_value(v)?),
            MsgType::Metrics => Self::Metrics(MetricsPayload::from_value(v)?),
            MsgType::McpDiscover | MsgType::ReverseList => Self::Empty,
            MsgType::McpTools => Self::McpTools(McpToolsPayload::from_value(v)?),
            MsgType::McpCall => Self::McpCall(McpCallPayload::from_value(v)?),
            MsgType::McpResult => Self::McpResult(McpResultPayload::from_value(v)?),
            MsgType::ReverseRegister => Self::ReverseRegister(ReverseRegisterPayload::from_value(v)?),
            MsgType::ReversePeers => Self::ReversePeers(ReversePeersPayload::from_value(v)?),
            MsgType::ReverseConnect => Self::ReverseConnect(ReverseConnectPayload::from_value(v)?),
            MsgType::OpenTcp => Self::OpenTcp(OpenTcpPayload::from_value(v)?),
            MsgType::OpenUdp => Self::OpenUdp(OpenUdpPayload::from_value(v)?),
            MsgType::ResolveDns => Self::ResolveDns(ResolveDnsPayload::from_value(v)?),
            MsgType::GatewayOk => Self::GatewayOk(GatewayOkPayload::from_value(v)?),
            MsgType::GatewayFail => Self::GatewayFail(GatewayFailPayload::from_value(v)?),
            MsgType::GatewayClose => Self::GatewayClose(GatewayClosePayload::from_value(v)?),
            MsgType::InboundOpen => Self::InboundOpen(InboundOpenPayload::from_value(v)?),
            MsgType::InboundAccept => Self::InboundAccept(InboundAcceptPayload::from_value(v)?),
            MsgType::InboundReject => Self::InboundReject(InboundRejectPayload::from_value(v)?),
            MsgType::DnsResult => Self::DnsResult(DnsResultPayload::from_value(v)?),
            MsgType::ListenRequest => Self::ListenRequest(ListenRequestPayload::from_value(v)?),
            MsgType::ListenOk => Self::ListenOk(ListenOkPayload::from_value(v)?),
            MsgType::ListenFail => Self::ListenFail(ListenFailPayload::from_value(v)?),
            MsgType::ListenClose => Self::ListenClose(ListenClosePayload::from_value(v)?),
            MsgType::GatewayData => Self::GatewayData(GatewayDataPayload::from_value(v)?),
        })
    }
}

// ── Handshake & auth ────────────────────────────────────────────────────

/// `Hello` (0x01): client greeting.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloPayload {
    /// Protocol version string, e.g. `"wsh-v1"`.
    pub version: String,
    /// Requested login username.
    pub username: String,
    /// Optional feature flags the client supports.
    pub features: Vec<String>,
    /// Authentication method the client intends to use, if already decided.
    pub auth_method: Option<AuthMethod>,
}

impl HelloPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![
            ("version".to_string(), Value::Text(self.version.clone())),
            ("username".to_string(), Value::Text(self.username.clone())),
            (
                "features".to_string(),
                Value::Array(self.features.iter().cloned().map(Value::Text).collect()),
            ),
        ];
        if let Some(m) = self.auth_method {
            f.push(("auth_method".to_string(), Value::Text(m.as_str().to_string())));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            version: fields::text(v, "version")?,
            username: fields::text(v, "username")?,
            features: fields::vec_text(v, "features"),
            auth_method: fields::opt_text(v, "auth_method")
                .map(|s| AuthMethod::parse(&s))
                .transpose()?,
        })
    }
}

/// `ServerHello` (0x02): server greeting.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerHelloPayload {
    /// Newly-assigned session identifier.
    pub session_id: String,
    /// Server-supported feature flags.
    pub features: Vec<String>,
    /// SHA-256 fingerprints of the server's host keys.
    pub fingerprints: Vec<String>,
}

impl ServerHelloPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("session_id".to_string(), Value::Text(self.session_id.clone())),
            (
                "features".to_string(),
                Value::Array(self.features.iter().cloned().map(Value::Text).collect()),
            ),
            (
                "fingerprints".to_string(),
                Value::Array(self.fingerprints.iter().cloned().map(Value::Text).collect()),
            ),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            session_id: fields::text(v, "session_id")?,
            features: fields::vec_text(v, "features"),
            fingerprints: fields::vec_text(v, "fingerprints"),
        })
    }
}

/// `Challenge` (0x03): server-issued authentication nonce.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengePayload {
    /// Random nonce the client must sign (pubkey auth) to authenticate.
    pub nonce: Vec<u8>,
}

impl ChallengePayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("nonce".to_string(), Value::Bytes(self.nonce.clone()))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { nonce: fields::bytes(v, "nonce")? })
    }
}

/// `AuthMethods` (0x04): server-advertised authentication methods.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthMethodsPayload {
    /// Methods the server is willing to accept, in preference order.
    pub methods: Vec<AuthMethod>,
}

impl AuthMethodsPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![(
            "methods".to_string(),
            Value::Array(
                self.methods
                    .iter()
                    .map(|m| Value::Text(m.as_str().to_string()))
                    .collect(),
            ),
        )]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        let methods = fields::array(v, "methods")
            .iter()
            .filter_map(Value::as_text)
            .map(AuthMethod::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { methods })
    }
}

/// `Auth` (0x05): client authentication attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthPayload {
    /// Which method this attempt uses.
    pub method: AuthMethod,
    /// Ed25519 signature over the authentication transcript (pubkey auth).
    pub signature: Option<Vec<u8>>,
    /// SSH-wire-format public key (pubkey auth).
    pub public_key: Option<Vec<u8>>,
    /// Cleartext password (password auth). Sent only over an already-authenticated transport.
    pub password: Option<String>,
}

impl AuthPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![("method".to_string(), Value::Text(self.method.as_str().to_string()))];
        if let Some(sig) = &self.signature {
            f.push(("signature".to_string(), Value::Bytes(sig.clone())));
        }
        if let Some(key) = &self.public_key {
            f.push(("public_key".to_string(), Value::Bytes(key.clone())));
        }
        if let Some(pw) = &self.password {
            f.push(("password".to_string(), Value::Text(pw.clone())));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            method: AuthMethod::parse(&fields::text(v, "method")?)?,
            signature: fields::opt_bytes(v, "signature"),
            public_key: fields::opt_bytes(v, "public_key"),
            password: fields::opt_text(v, "password"),
        })
    }
}

/// `AuthOk` (0x06): authentication succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOkPayload {
    /// Session identifier now bound to this authenticated connection.
    pub session_id: String,
    /// Opaque session token, used by `Attach`/`Resume` later.
    pub token: Vec<u8>,
    /// Token time-to-live, in seconds.
    pub ttl: u64,
}

impl AuthOkPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("session_id".to_string(), Value::Text(self.session_id.clone())),
            ("token".to_string(), Value::Bytes(self.token.clone())),
            ("ttl".to_string(), Value::UInt(self.ttl)),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            session_id: fields::text(v, "session_id")?,
            token: fields::bytes(v, "token")?,
            ttl: fields::u64_(v, "ttl")?,
        })
    }
}

/// `AuthFail` (0x07): authentication failed.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthFailPayload {
    /// Human-readable failure reason. Never leaks which part of a multi-factor check failed.
    pub reason: String,
}

impl AuthFailPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("reason".to_string(), Value::Text(self.reason.clone()))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { reason: fields::text(v, "reason")? })
    }
}

// ── Channel lifecycle ───────────────────────────────────────────────────

/// `Open` (0x10): open a new channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPayload {
    /// Kind of channel to open.
    pub kind: ChannelKind,
    /// Command line to run (`exec`/`pty` channels).
    pub command: Option<String>,
    /// Initial terminal column count (`pty` channels).
    pub cols: Option<u16>,
    /// Initial terminal row count (`pty` channels).
    pub rows: Option<u16>,
    /// Environment variables to set in the spawned process.
    pub env: Vec<(String, String)>,
}

impl OpenPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![("kind".to_string(), Value::Text(self.kind.as_str().to_string()))];
        if let Some(cmd) = &self.command {
            f.push(("command".to_string(), Value::Text(cmd.clone())));
        }
        if let Some(cols) = self.cols {
            f.push(("cols".to_string(), Value::UInt(u64::from(cols))));
        }
        if let Some(rows) = self.rows {
            f.push(("rows".to_string(), Value::UInt(u64::from(rows))));
        }
        if !self.env.is_empty() {
            f.push((
                "env".to_string(),
                Value::Map(self.env.iter().map(|(k, v)| (k.clone(), Value::Text(v.clone()))).collect()),
            ));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        let env = match v.get("env") {
            Some(Value::Map(pairs)) => pairs
                .iter()
                .map(|(k, val)| Ok((k.clone(), val.as_text().unwrap_or_default().to_string())))
                .collect::<Result<Vec<_>, SchemaError>>()?,
            _ => Vec::new(),
        };
        Ok(Self {
            kind: ChannelKind::parse(&fields::text(v, "kind")?)?,
            command: fields::opt_text(v, "command"),
            cols: fields::opt_u32(v, "cols").map(|n| n as u16),
            rows: fields::opt_u32(v, "rows").map(|n| n as u16),
            env,
        })
    }
}

/// `OpenOk` (0x11): channel opened successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOkPayload {
    /// Server-assigned channel identifier.
    pub channel_id: u32,
    /// Multiplexed stream identifiers backing this channel (stdin/stdout/stderr, etc).
    pub stream_ids: Vec<u32>,
}

impl OpenOkPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("channel_id".to_string(), Value::UInt(u64::from(self.channel_id))),
            (
                "stream_ids".to_string(),
                Value::Array(self.stream_ids.iter().map(|id| Value::UInt(u64::from(*id))).collect()),
            ),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        let stream_ids = fields::array(v, "stream_ids")
            .iter()
            .filter_map(Value::as_uint)
            .map(|n| n as u32)
            .collect();
        Ok(Self { channel_id: fields::u32_(v, "channel_id")?, stream_ids })
    }
}

/// `OpenFail` (0x12): channel open request failed.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenFailPayload {
    /// Human-readable failure reason.
    pub reason: String,
}

impl OpenFailPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("reason".to_string(), Value::Text(self.reason.clone()))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { reason: fields::text(v, "reason")? })
    }
}

/// `Resize` (0x13): pty resize notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizePayload {
    /// Channel to resize.
    pub channel_id: u32,
    /// New column count.
    pub cols: u16,
    /// New row count.
    pub rows: u16,
}

impl ResizePayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("channel_id".to_string(), Value::UInt(u64::from(self.channel_id))),
            ("cols".to_string(), Value::UInt(u64::from(self.cols))),
            ("rows".to_string(), Value::UInt(u64::from(self.rows))),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            channel_id: fields::u32_(v, "channel_id")?,
            cols: fields::u16_(v, "cols")?,
            rows: fields::u16_(v, "rows")?,
        })
    }
}

/// `Signal` (0x14): forward a signal to a channel's process.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPayload {
    /// Target channel.
    pub channel_id: u32,
    /// Signal name, e.g. `"SIGINT"`.
    pub signal: String,
}

impl SignalPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("channel_id".to_string(), Value::UInt(u64::from(self.channel_id))),
            ("signal".to_string(), Value::Text(self.signal.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { channel_id: fields::u32_(v, "channel_id")?, signal: fields::text(v, "signal")? })
    }
}

/// `Exit` (0x15): channel process exited.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitPayload {
    /// Channel whose process exited.
    pub channel_id: u32,
    /// Process exit code.
    pub code: i32,
}

impl ExitPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("channel_id".to_string(), Value::UInt(u64::from(self.channel_id))),
            ("code".to_string(), Value::Int(i64::from(self.code))),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { channel_id: fields::u32_(v, "channel_id")?, code: fields::i32_(v, "code")? })
    }
}

/// `Close` (0x16): close a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosePayload {
    /// Channel to close.
    pub channel_id: u32,
}

impl ClosePayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("channel_id".to_string(), Value::UInt(u64::from(self.channel_id)))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { channel_id: fields::u32_(v, "channel_id")? })
    }
}

// ── Protocol-level ───────────────────────────────────────────────────────

/// `Error` (0x20): protocol-level error report.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPayload {
    /// Numeric error code (§7).
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl ErrorPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("code".to_string(), Value::UInt(u64::from(self.code))),
            ("message".to_string(), Value::Text(self.message.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { code: fields::u32_(v, "code")?, message: fields::text(v, "message")? })
    }
}

/// `Ping`/`Pong` (0x21/0x22): keepalive round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPongPayload {
    /// Correlates a `Pong` with its `Ping`.
    pub id: u64,
}

impl PingPongPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("id".to_string(), Value::UInt(self.id))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { id: fields::u64_(v, "id")? })
    }
}

// ── Session management ──────────────────────────────────────────────────

/// `Attach` (0x30): attach a control connection to an existing session.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachPayload {
    /// Session to attach to.
    pub session_id: String,
    /// Session token proving the attacher was the original authenticated client.
    pub token: Vec<u8>,
    /// `"control"` (can write) or `"observer"` (read-only).
    pub mode: String,
}

impl AttachPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("session_id".to_string(), Value::Text(self.session_id.clone())),
            ("token".to_string(), Value::Bytes(self.token.clone())),
            ("mode".to_string(), Value::Text(self.mode.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            session_id: fields::text(v, "session_id")?,
            token: fields::bytes(v, "token")?,
            mode: fields::opt_text(v, "mode").unwrap_or_else(|| "control".to_string()),
        })
    }
}

/// `Resume` (0x31): resume a session after a disconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePayload {
    /// Session to resume.
    pub session_id: String,
    /// Session token.
    pub token: Vec<u8>,
    /// Last sequence number the client observed, so the server can replay the gap.
    pub last_seq: u64,
}

impl ResumePayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("session_id".to_string(), Value::Text(self.session_id.clone())),
            ("token".to_string(), Value::Bytes(self.token.clone())),
            ("last_seq".to_string(), Value::UInt(self.last_seq)),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            session_id: fields::text(v, "session_id")?,
            token: fields::bytes(v, "token")?,
            last_seq: fields::u64_(v, "last_seq")?,
        })
    }
}

/// `Rename` (0x32): rename a session.
#[derive(Debug, Clone, PartialEq)]
pub struct RenamePayload {
    /// Session to rename.
    pub session_id: String,
    /// New display name.
    pub name: String,
}

impl RenamePayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("session_id".to_string(), Value::Text(self.session_id.clone())),
            ("name".to_string(), Value::Text(self.name.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { session_id: fields::text(v, "session_id")?, name: fields::text(v, "name")? })
    }
}

/// `IdleWarning` (0x33): warn that the session will idle-expire soon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleWarningPayload {
    /// Seconds remaining before the session is torn down.
    pub expires_in: u64,
}

impl IdleWarningPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("expires_in".to_string(), Value::UInt(self.expires_in))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { expires_in: fields::u64_(v, "expires_in")? })
    }
}

/// `Shutdown` (0x34): server-initiated session shutdown notice.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownPayload {
    /// Human-readable shutdown reason.
    pub reason: String,
    /// Suggested reconnect delay, in seconds.
    pub retry_after: Option<u64>,
}

impl ShutdownPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![("reason".to_string(), Value::Text(self.reason.clone()))];
        if let Some(r) = self.retry_after {
            f.push(("retry_after".to_string(), Value::UInt(r)));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { reason: fields::text(v, "reason")?, retry_after: fields::opt_u64(v, "retry_after") })
    }
}

/// `Snapshot` (0x35): request a named output checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPayload {
    /// Label for the requested snapshot.
    pub label: String,
}

impl SnapshotPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("label".to_string(), Value::Text(self.label.clone()))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { label: fields::text(v, "label")? })
    }
}

/// One entry in a [`PresencePayload`]'s attachment list.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentInfo {
    /// Session this attachment belongs to.
    pub session_id: String,
    /// `"control"` or `"observer"`.
    pub mode: String,
    /// Username of the attached client, if known.
    pub username: Option<String>,
}

impl AttachmentInfo {
    fn to_value(&self) -> Value {
        let mut f = vec![
            ("session_id".to_string(), Value::Text(self.session_id.clone())),
            ("mode".to_string(), Value::Text(self.mode.clone())),
        ];
        if let Some(u) = &self.username {
            f.push(("username".to_string(), Value::Text(u.clone())));
        }
        Value::Map(f)
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            session_id: fields::text(v, "session_id")?,
            mode: fields::text(v, "mode")?,
            username: fields::opt_text(v, "username"),
        })
    }
}

/// `Presence` (0x36): the set of clients currently attached to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct PresencePayload {
    /// Current attachments.
    pub attachments: Vec<AttachmentInfo>,
}

impl PresencePayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![(
            "attachments".to_string(),
            Value::Array(self.attachments.iter().map(AttachmentInfo::to_value).collect()),
        )]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        let attachments = fields::array(v, "attachments")
            .iter()
            .map(AttachmentInfo::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { attachments })
    }
}

/// `ControlChanged` (0x37): session control passed to a different attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlChangedPayload {
    /// Identifier of the attachment that now holds control.
    pub new_controller: String,
}

impl ControlChangedPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("new_controller".to_string(), Value::Text(self.new_controller.clone()))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { new_controller: fields::text(v, "new_controller")? })
    }
}

/// `Metrics` (0x38): periodic session resource/latency metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsPayload {
    /// CPU usage percentage of the session's process tree, if available.
    pub cpu: Option<f64>,
    /// Resident memory, in bytes, if available.
    pub memory: Option<u64>,
    /// Active sub-session count, if this is a server-wide metrics record.
    pub sessions: Option<u32>,
    /// Observed round-trip time, in milliseconds.
    pub rtt: Option<u64>,
}

impl MetricsPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = Vec::new();
        if let Some(cpu) = self.cpu {
            f.push(("cpu".to_string(), Value::Float(cpu)));
        }
        if let Some(mem) = self.memory {
            f.push(("memory".to_string(), Value::UInt(mem)));
        }
        if let Some(s) = self.sessions {
            f.push(("sessions".to_string(), Value::UInt(u64::from(s))));
        }
        if let Some(rtt) = self.rtt {
            f.push(("rtt".to_string(), Value::UInt(rtt)));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            cpu: fields::opt_f64(v, "cpu"),
            memory: fields::opt_u64(v, "memory"),
            sessions: fields::opt_u32(v, "sessions"),
            rtt: fields::opt_u64(v, "rtt"),
        })
    }
}

// ── MCP tool bridge ──────────────────────────────────────────────────────

/// One tool entry in a [`McpToolsPayload`].
#[derive(Debug, Clone, PartialEq)]
pub struct McpToolSpec {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Parameter schema, as a canonical `Value` (opaque to this layer).
    pub parameters: Value,
}

impl McpToolSpec {
    fn to_value(&self) -> Value {
        Value::Map(vec![
            ("name".to_string(), Value::Text(self.name.clone())),
            ("description".to_string(), Value::Text(self.description.clone())),
            ("parameters".to_string(), self.parameters.clone()),
        ])
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            name: fields::text(v, "name")?,
            description: fields::text(v, "description")?,
            parameters: v.get("parameters").cloned().unwrap_or(Value::Null),
        })
    }
}

/// `McpTools` (0x41): advertised MCP tool list.
#[derive(Debug, Clone, PartialEq)]
pub struct McpToolsPayload {
    /// Tools the remote side exposes.
    pub tools: Vec<McpToolSpec>,
}

impl McpToolsPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("tools".to_string(), Value::Array(self.tools.iter().map(McpToolSpec::to_value).collect()))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        let tools = fields::array(v, "tools")
            .iter()
            .map(McpToolSpec::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tools })
    }
}

/// `McpCall` (0x42): invoke an MCP tool.
#[derive(Debug, Clone, PartialEq)]
pub struct McpCallPayload {
    /// Tool to invoke.
    pub tool: String,
    /// Call arguments, as a canonical `Value` tree.
    pub arguments: Value,
}

impl McpCallPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("tool".to_string(), Value::Text(self.tool.clone())),
            ("arguments".to_string(), self.arguments.clone()),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            tool: fields::text(v, "tool")?,
            arguments: v.get("arguments").cloned().unwrap_or(Value::Null),
        })
    }
}

/// `McpResult` (0x43): result of an MCP tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct McpResultPayload {
    /// Tool result, as a canonical `Value` tree.
    pub result: Value,
}

impl McpResultPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("result".to_string(), self.result.clone())]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { result: v.get("result").cloned().unwrap_or(Value::Null) })
    }
}

// ── Reverse mode ─────────────────────────────────────────────────────────

/// `ReverseRegister` (0x50): register this client as a reverse-mode listener.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseRegisterPayload {
    /// Username to register under.
    pub username: String,
    /// Advertised capability tags (e.g. `"exec"`, `"file"`).
    pub capabilities: Vec<String>,
    /// SSH-wire-format public key identifying this peer.
    pub public_key: Vec<u8>,
}

impl ReverseRegisterPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("username".to_string(), Value::Text(self.username.clone())),
            (
                "capabilities".to_string(),
                Value::Array(self.capabilities.iter().cloned().map(Value::Text).collect()),
            ),
            ("public_key".to_string(), Value::Bytes(self.public_key.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            username: fields::text(v, "username")?,
            capabilities: fields::vec_text(v, "capabilities"),
            public_key: fields::bytes(v, "public_key")?,
        })
    }
}

/// One entry in a [`ReversePeersPayload`]'s peer directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerInfo {
    /// Short SHA-256 fingerprint of the peer's public key.
    pub fingerprint_short: String,
    /// Peer's registered username.
    pub username: String,
    /// Peer's advertised capabilities.
    pub capabilities: Vec<String>,
    /// Unix timestamp of the peer's last heartbeat, if known.
    pub last_seen: Option<u64>,
}

impl PeerInfo {
    fn to_value(&self) -> Value {
        let mut f = vec![
            ("fingerprint_short".to_string(), Value::Text(self.fingerprint_short.clone())),
            ("username".to_string(), Value::Text(self.username.clone())),
            (
                "capabilities".to_string(),
                Value::Array(self.capabilities.iter().cloned().map(Value::Text).collect()),
            ),
        ];
        if let Some(t) = self.last_seen {
            f.push(("last_seen".to_string(), Value::UInt(t)));
        }
        Value::Map(f)
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            fingerprint_short: fields::text(v, "fingerprint_short")?,
            username: fields::text(v, "username")?,
            capabilities: fields::vec_text(v, "capabilities"),
            last_seen: fields::opt_u64(v, "last_seen"),
        })
    }
}

/// `ReversePeers` (0x52): advertised reverse peer directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ReversePeersPayload {
    /// Currently registered peers.
    pub peers: Vec<PeerInfo>,
}

impl ReversePeersPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("peers".to_string(), Value::Array(self.peers.iter().map(PeerInfo::to_value).collect()))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        let peers = fields::array(v, "peers").iter().map(PeerInfo::from_value).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { peers })
    }
}

/// `ReverseConnect` (0x53): request a reverse connection to a registered peer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseConnectPayload {
    /// Short fingerprint identifying the target peer.
    pub target_fingerprint: String,
    /// Username to present to the target peer.
    pub username: String,
}

impl ReverseConnectPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("target_fingerprint".to_string(), Value::Text(self.target_fingerprint.clone())),
            ("username".to_string(), Value::Text(self.username.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            target_fingerprint: fields::text(v, "target_fingerprint")?,
            username: fields::text(v, "username")?,
        })
    }
}

// ── Gateway / port forwarding ────────────────────────────────────────────

/// `OpenTcp` (0x70): open an outbound TCP connection through the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTcpPayload {
    /// Gateway connection identifier, chosen by the requester.
    pub gateway_id: u32,
    /// Target host.
    pub host: String,
    /// Target port.
    pub port: u16,
}

impl OpenTcpPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("gateway_id".to_string(), Value::UInt(u64::from(self.gateway_id))),
            ("host".to_string(), Value::Text(self.host.clone())),
            ("port".to_string(), Value::UInt(u64::from(self.port))),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            gateway_id: fields::u32_(v, "gateway_id")?,
            host: fields::text(v, "host")?,
            port: fields::u16_(v, "port")?,
        })
    }
}

/// `OpenUdp` (0x71): open an outbound UDP association through the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenUdpPayload {
    /// Gateway connection identifier.
    pub gateway_id: u32,
    /// Target host.
    pub host: String,
    /// Target port.
    pub port: u16,
}

impl OpenUdpPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("gateway_id".to_string(), Value::UInt(u64::from(self.gateway_id))),
            ("host".to_string(), Value::Text(self.host.clone())),
            ("port".to_string(), Value::UInt(u64::from(self.port))),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            gateway_id: fields::u32_(v, "gateway_id")?,
            host: fields::text(v, "host")?,
            port: fields::u16_(v, "port")?,
        })
    }
}

/// `ResolveDns` (0x72): resolve a DNS name through the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveDnsPayload {
    /// Gateway connection identifier.
    pub gateway_id: u32,
    /// Name to resolve.
    pub name: String,
    /// Record type (`"A"`, `"AAAA"`); empty means "either".
    pub record_type: String,
}

impl ResolveDnsPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("gateway_id".to_string(), Value::UInt(u64::from(self.gateway_id))),
            ("name".to_string(), Value::Text(self.name.clone())),
            ("record_type".to_string(), Value::Text(self.record_type.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            gateway_id: fields::u32_(v, "gateway_id")?,
            name: fields::text(v, "name")?,
            record_type: fields::opt_text(v, "record_type").unwrap_or_default(),
        })
    }
}

/// `GatewayOk` (0x73): gateway connection established.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOkPayload {
    /// Gateway connection identifier.
    pub gateway_id: u32,
    /// Resolved peer address, if applicable.
    pub resolved_addr: Option<String>,
}

impl GatewayOkPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![("gateway_id".to_string(), Value::UInt(u64::from(self.gateway_id)))];
        if let Some(addr) = &self.resolved_addr {
            f.push(("resolved_addr".to_string(), Value::Text(addr.clone())));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            gateway_id: fields::u32_(v, "gateway_id")?,
            resolved_addr: fields::opt_text(v, "resolved_addr"),
        })
    }
}

/// `GatewayFail` (0x74): gateway connection attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayFailPayload {
    /// Gateway connection identifier.
    pub gateway_id: u32,
    /// Numeric error code.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl GatewayFailPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("gateway_id".to_string(), Value::UInt(u64::from(self.gateway_id))),
            ("code".to_string(), Value::UInt(u64::from(self.code))),
            ("message".to_string(), Value::Text(self.message.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            gateway_id: fields::u32_(v, "gateway_id")?,
            code: fields::u32_(v, "code")?,
            message: fields::text(v, "message")?,
        })
    }
}

/// `GatewayClose` (0x75): gateway connection closed.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayClosePayload {
    /// Gateway connection identifier.
    pub gateway_id: u32,
    /// Reason for the close, if known.
    pub reason: Option<String>,
}

impl GatewayClosePayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![("gateway_id".to_string(), Value::UInt(u64::from(self.gateway_id)))];
        if let Some(r) = &self.reason {
            f.push(("reason".to_string(), Value::Text(r.clone())));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { gateway_id: fields::u32_(v, "gateway_id")?, reason: fields::opt_text(v, "reason") })
    }
}

/// `InboundOpen` (0x76): inbound connection arrived on a remote listener.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundOpenPayload {
    /// Listener the connection arrived on.
    pub listener_id: u32,
    /// Channel identifier assigned to this inbound connection.
    pub channel_id: u32,
    /// Originating peer address.
    pub peer_addr: String,
    /// Originating peer port.
    pub peer_port: u16,
}

impl InboundOpenPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("listener_id".to_string(), Value::UInt(u64::from(self.listener_id))),
            ("channel_id".to_string(), Value::UInt(u64::from(self.channel_id))),
            ("peer_addr".to_string(), Value::Text(self.peer_addr.clone())),
            ("peer_port".to_string(), Value::UInt(u64::from(self.peer_port))),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            listener_id: fields::u32_(v, "listener_id")?,
            channel_id: fields::u32_(v, "channel_id")?,
            peer_addr: fields::text(v, "peer_addr")?,
            peer_port: fields::u16_(v, "peer_port")?,
        })
    }
}

/// `InboundAccept` (0x77): accept an inbound connection.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundAcceptPayload {
    /// Channel to accept.
    pub channel_id: u32,
    /// Gateway identifier to bind the accepted stream to, if forwarding onward.
    pub gateway_id: Option<u32>,
}

impl InboundAcceptPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![("channel_id".to_string(), Value::UInt(u64::from(self.channel_id)))];
        if let Some(g) = self.gateway_id {
            f.push(("gateway_id".to_string(), Value::UInt(u64::from(g))));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            channel_id: fields::u32_(v, "channel_id")?,
            gateway_id: fields::opt_u32(v, "gateway_id"),
        })
    }
}

/// `InboundReject` (0x78): reject an inbound connection.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRejectPayload {
    /// Channel to reject.
    pub channel_id: u32,
    /// Rejection reason, if any.
    pub reason: Option<String>,
}

impl InboundRejectPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![("channel_id".to_string(), Value::UInt(u64::from(self.channel_id)))];
        if let Some(r) = &self.reason {
            f.push(("reason".to_string(), Value::Text(r.clone())));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { channel_id: fields::u32_(v, "channel_id")?, reason: fields::opt_text(v, "reason") })
    }
}

/// `DnsResult` (0x79): DNS resolution result.
#[derive(Debug, Clone, PartialEq)]
pub struct DnsResultPayload {
    /// Gateway connection identifier this resolution was for.
    pub gateway_id: u32,
    /// Resolved addresses.
    pub addresses: Vec<String>,
    /// Record TTL, in seconds, if supplied by the resolver.
    pub ttl: Option<u32>,
}

impl DnsResultPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        let mut f = vec![
            ("gateway_id".to_string(), Value::UInt(u64::from(self.gateway_id))),
            (
                "addresses".to_string(),
                Value::Array(self.addresses.iter().cloned().map(Value::Text).collect()),
            ),
        ];
        if let Some(ttl) = self.ttl {
            f.push(("ttl".to_string(), Value::UInt(u64::from(ttl))));
        }
        f
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            gateway_id: fields::u32_(v, "gateway_id")?,
            addresses: fields::vec_text(v, "addresses"),
            ttl: fields::opt_u32(v, "ttl"),
        })
    }
}

/// `ListenRequest` (0x7A): request a remote listener be opened.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenRequestPayload {
    /// Listener identifier, chosen by the requester.
    pub listener_id: u32,
    /// Requested port (0 lets the remote side choose).
    pub port: u16,
    /// Bind address on the remote side; empty means all interfaces.
    pub bind_addr: String,
}

impl ListenRequestPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("listener_id".to_string(), Value::UInt(u64::from(self.listener_id))),
            ("port".to_string(), Value::UInt(u64::from(self.port))),
            ("bind_addr".to_string(), Value::Text(self.bind_addr.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            listener_id: fields::u32_(v, "listener_id")?,
            port: fields::u16_(v, "port")?,
            bind_addr: fields::opt_text(v, "bind_addr").unwrap_or_default(),
        })
    }
}

/// `ListenOk` (0x7B): remote listener opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenOkPayload {
    /// Listener identifier.
    pub listener_id: u32,
    /// Port the listener actually bound to.
    pub actual_port: u16,
}

impl ListenOkPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("listener_id".to_string(), Value::UInt(u64::from(self.listener_id))),
            ("actual_port".to_string(), Value::UInt(u64::from(self.actual_port))),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            listener_id: fields::u32_(v, "listener_id")?,
            actual_port: fields::u16_(v, "actual_port")?,
        })
    }
}

/// `ListenFail` (0x7C): remote listener request failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenFailPayload {
    /// Listener identifier.
    pub listener_id: u32,
    /// Failure reason.
    pub reason: String,
}

impl ListenFailPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("listener_id".to_string(), Value::UInt(u64::from(self.listener_id))),
            ("reason".to_string(), Value::Text(self.reason.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { listener_id: fields::u32_(v, "listener_id")?, reason: fields::text(v, "reason")? })
    }
}

/// `ListenClose` (0x7D): remote listener closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenClosePayload {
    /// Listener identifier.
    pub listener_id: u32,
}

impl ListenClosePayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![("listener_id".to_string(), Value::UInt(u64::from(self.listener_id)))]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { listener_id: fields::u32_(v, "listener_id")? })
    }
}

/// `GatewayData` (0x7E): data forwarded over an established gateway connection.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayDataPayload {
    /// Gateway connection identifier.
    pub gateway_id: u32,
    /// Raw payload bytes.
    pub data: Vec<u8>,
}

impl GatewayDataPayload {
    fn to_fields(&self) -> Vec<(String, Value)> {
        vec![
            ("gateway_id".to_string(), Value::UInt(u64::from(self.gateway_id))),
            ("data".to_string(), Value::Bytes(self.data.clone())),
        ]
    }

    fn from_value(v: &Value) -> Result<Self, SchemaError> {
        Ok(Self { gateway_id: fields::u32_(v, "gateway_id")?, data: fields::bytes(v, "data")? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn hello_roundtrips_through_the_wire() {
        let envelope = Envelope {
            msg_type: MsgType::Hello,
            payload: Payload::Hello(HelloPayload {
                version: PROTOCOL_VERSION.to_string(),
                username: "alice".to_string(),
                features: vec!["resume".to_string()],
                auth_method: Some(AuthMethod::Pubkey),
            }),
        };
        let bytes = codec::encode(&envelope.to_value());
        let (decoded, rest) = codec::decode(&bytes).unwrap().unwrap();
        assert!(rest.is_empty());
        let back = Envelope::from_value(&decoded).unwrap();
        assert_eq!(back.msg_type, MsgType::Hello);
        match back.payload {
            Payload::Hello(p) => {
                assert_eq!(p.username, "alice");
                assert_eq!(p.auth_method, Some(AuthMethod::Pubkey));
            }
            _ => panic!("expected Hello payload"),
        }
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let bad = Value::Map(vec![("type".to_string(), Value::UInt(0xEF))]);
        let err = Envelope::from_value(&bad).unwrap_err();
        assert_eq!(err, SchemaError::UnknownOpcode(0xEF));
    }

    #[test]
    fn open_payload_preserves_optional_fields() {
        let p = OpenPayload {
            kind: ChannelKind::Pty,
            command: None,
            cols: Some(80),
            rows: Some(24),
            env: vec![("TERM".to_string(), "xterm-256color".to_string())],
        };
        let value = Value::Map(p.to_fields());
        let back = OpenPayload::from_value(&value).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn mcp_call_carries_opaque_value_arguments() {
        let args = Value::map(vec![("path", Value::Text("/tmp".to_string()))]);
        let p = McpCallPayload { tool: "list_dir".to_string(), arguments: args.clone() };
        let value = Value::Map(p.to_fields());
        let back = McpCallPayload::from_value(&value).unwrap();
        assert_eq!(back.arguments, args);
    }

    #[test]
    fn ping_pong_share_one_payload_shape() {
        let value = Value::Map(vec![
            ("type".to_string(), Value::UInt(u8::from(MsgType::Ping) as u64)),
            ("id".to_string(), Value::UInt(7)),
        ]);
        let envelope = Envelope::from_value(&value).unwrap();
        match envelope.payload {
            Payload::PingPong(p) => assert_eq!(p.id, 7),
            _ => panic!("expected PingPong payload"),
        }
    }
}
