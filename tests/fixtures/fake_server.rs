//! A minimal stand-in for a wsh server: accepts one loopback WebSocket
//! connection and speaks the exact single-socket frame format
//! (`wsh_transport::single_socket`), so integration tests drive the real
//! client/transport code path instead of a mock above it.

use std::collections::VecDeque;
use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use wsh_protocol::codec::{encode_record, FrameDecoder};
use wsh_protocol::{Envelope, Value};

const FRAME_CONTROL: u8 = 0x01;
const FRAME_DATA: u8 = 0x02;
const FRAME_OPEN_STREAM: u8 = 0x03;
const FRAME_CLOSE_STREAM: u8 = 0x04;
const FRAME_HEADER_LEN: usize = 5;
const CONTROL_STREAM_ID: u32 = 0;

fn encode_frame(frame_type: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.push(frame_type);
    buf.extend_from_slice(&stream_id.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// One frame read off a [`FakeConn`], stripped of its header.
#[derive(Debug)]
pub enum FakeFrame {
    /// A decoded control record.
    Control(Envelope),
    /// A `DATA` frame on a virtual stream.
    Data {
        /// Stream the data belongs to.
        stream_id: u32,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
    /// Peer requested a new virtual stream.
    OpenStream {
        /// Stream id the peer allocated.
        stream_id: u32,
    },
    /// Peer half-closed a virtual stream.
    CloseStream {
        /// Stream being closed.
        stream_id: u32,
    },
}

/// Accepts inbound WebSocket connections on a loopback port.
pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    /// Bind a loopback listener and return it plus the `ws://` URL a client should connect to.
    pub async fn bind() -> (Self, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake server");
        let addr: SocketAddr = listener.local_addr().expect("fake server local addr");
        (Self { listener }, format!("ws://{addr}"))
    }

    /// Accept the next inbound connection and complete the WebSocket handshake.
    pub async fn accept(&self) -> FakeConn {
        let (stream, _) = self.listener.accept().await.expect("accept tcp connection");
        let ws = tokio_tungstenite::accept_async(stream).await.expect("accept websocket handshake");
        FakeConn { ws, control_decoder: FrameDecoder::new(), pending: VecDeque::new() }
    }
}

/// One accepted connection, decoding/encoding the single-socket frame format directly.
pub struct FakeConn {
    ws: WebSocketStream<TcpStream>,
    control_decoder: FrameDecoder,
    pending: VecDeque<Value>,
}

impl FakeConn {
    /// Send a control envelope on stream 0.
    pub async fn send_control(&mut self, envelope: &Envelope) {
        let framed = encode_record(&envelope.to_value());
        let frame = encode_frame(FRAME_CONTROL, CONTROL_STREAM_ID, &framed);
        self.ws.send(Message::Binary(frame.into())).await.expect("send control frame");
    }

    /// Send a `DATA` frame on `stream_id`.
    pub async fn send_data(&mut self, stream_id: u32, payload: &[u8]) {
        let frame = encode_frame(FRAME_DATA, stream_id, payload);
        self.ws.send(Message::Binary(frame.into())).await.expect("send data frame");
    }

    /// Send an `OPEN_STREAM` frame for a server-initiated stream.
    pub async fn open_stream(&mut self, stream_id: u32) {
        let frame = encode_frame(FRAME_OPEN_STREAM, stream_id, &[]);
        self.ws.send(Message::Binary(frame.into())).await.expect("send open-stream frame");
    }

    /// Send a `CLOSE_STREAM` frame on `stream_id`.
    pub async fn close_stream(&mut self, stream_id: u32) {
        let frame = encode_frame(FRAME_CLOSE_STREAM, stream_id, &[]);
        self.ws.send(Message::Binary(frame.into())).await.expect("send close-stream frame");
    }

    /// Read the next frame off the wire, decoding control records and classifying the rest.
    pub async fn recv_frame(&mut self) -> FakeFrame {
        if let Some(record) = self.pending.pop_front() {
            return FakeFrame::Control(Envelope::from_value(&record).expect("decode queued envelope"));
        }
        loop {
            let message = self
                .ws
                .next()
                .await
                .expect("fake connection ended unexpectedly")
                .expect("websocket error");
            let Message::Binary(bytes) = message else { continue };
            let frame_type = bytes[0];
            let stream_id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
            let payload = &bytes[FRAME_HEADER_LEN..];
            match frame_type {
                FRAME_CONTROL => {
                    let mut records = self.control_decoder.feed(payload).expect("decode control frame").into_iter();
                    let Some(first) = records.next() else { continue };
                    self.pending.extend(records);
                    return FakeFrame::Control(Envelope::from_value(&first).expect("decode envelope"));
                }
                FRAME_DATA => return FakeFrame::Data { stream_id, payload: payload.to_vec() },
                FRAME_OPEN_STREAM => return FakeFrame::OpenStream { stream_id },
                FRAME_CLOSE_STREAM => return FakeFrame::CloseStream { stream_id },
                other => panic!("unexpected frame type {other}"),
            }
        }
    }

    /// Read frames until the next control envelope arrives, discarding data-plane frames.
    pub async fn recv_control(&mut self) -> Envelope {
        loop {
            if let FakeFrame::Control(envelope) = self.recv_frame().await {
                return envelope;
            }
        }
    }
}
