//! Single-socket transport: multiplexes virtual streams over one
//! message-oriented WebSocket (§4.4).
//!
//! Every outbound message is `[1 byte frame type][4 bytes stream id,
//! big-endian][payload]`. `CONTROL=0x01` (stream 0 only, payload is a
//! length-prefix-framed wire record), `DATA=0x02`, `OPEN_STREAM=0x03`
//! (empty payload), `CLOSE_STREAM=0x04` (empty payload, half-close). The
//! local side allocates odd stream ids starting at 1; even ids are
//! peer-initiated.
//!
//! Structured as a `streams`-table-owning session plus a background
//! `recv_loop`/`send_loop` pair communicating over channels, the way a
//! smux-style multiplexer splits a framed transport into a sink/stream pair
//! fed by two tasks — re-expressed against this module's own four-frame
//! scheme and `tokio::sync::mpsc` rather than `flume`.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use wsh_protocol::codec::{self, FrameDecoder};
use wsh_protocol::Value;

use crate::error::TransportError;
use crate::transport::{EventSink, StateCell, StreamHalves, Transport, TransportState};

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

struct StreamEntry {
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
}

/// Readable half of a virtual stream: buffers inbound `DATA` chunks.
struct VirtualReader {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl AsyncRead for VirtualReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            if self.offset < self.pending.len() {
                let remaining = &self.pending[self.offset..];
                let n = remaining.len().min(buf.remaining());
                buf.put_slice(&remaining[..n]);
                self.offset += n;
                return Poll::Ready(Ok(()));
            }
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Writable half of a virtual stream: emits `DATA`/`CLOSE_STREAM` frames.
struct VirtualWriter {
    stream_id: u32,
    tx: mpsc::UnboundedSender<Message>,
    closed: bool,
}

impl AsyncWrite for VirtualWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.closed {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed")));
        }
        let frame = encode_frame(FRAME_DATA, self.stream_id, buf);
        self.tx
            .send(Message::Binary(frame.into()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transport closed"))?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if !self.closed {
            let frame = encode_frame(FRAME_CLOSE_STREAM, self.stream_id, &[]);
            let _ = self.tx.send(Message::Binary(frame.into()));
            self.closed = true;
        }
        Poll::Ready(Ok(()))
    }
}

/// The single-socket (WebSocket) transport implementation.
pub struct SingleSocketTransport {
    state: Arc<StateCell>,
    write_tx: mpsc::UnboundedSender<Message>,
    streams: Arc<DashMap<u32, StreamEntry>>,
    next_local_stream_id: AtomicU32,
}

impl SingleSocketTransport {
    /// Connect to `url` over a WebSocket and wire `sink` for inbound events.
    ///
    /// # Errors
    /// [`TransportError::ConnectionFailed`] if the WebSocket handshake fails.
    pub async fn connect(url: &str, sink: Arc<dyn EventSink>) -> Result<Self, TransportError> {
        let state = Arc::new(StateCell::new(TransportState::Connecting));
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (ws_sink, ws_stream) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::unbounded_channel::<Message>();
        let streams: Arc<DashMap<u32, StreamEntry>> = Arc::new(DashMap::new());

        state.set(TransportState::Connected);

        tokio::spawn(send_loop(ws_sink, write_rx));
        tokio::spawn(recv_loop(
            ws_stream,
            Arc::clone(&state),
            Arc::clone(&streams),
            write_tx.clone(),
            sink,
        ));

        Ok(SingleSocketTransport {
            state,
            write_tx,
            streams,
            next_local_stream_id: AtomicU32::new(1),
        })
    }

    fn require_connected(&self) -> Result<(), TransportError> {
        match self.state.get() {
            TransportState::Connected => Ok(()),
            _ => Err(TransportError::NotConnected),
        }
    }
}

#[async_trait]
impl Transport for SingleSocketTransport {
    fn state(&self) -> TransportState {
        self.state.get()
    }

    async fn send_control(&self, record: &Value) -> Result<(), TransportError> {
        self.require_connected()?;
        let framed = codec::encode_record(record);
        let frame = encode_frame(FRAME_CONTROL, CONTROL_STREAM_ID, &framed);
        self.write_tx
            .send(Message::Binary(frame.into()))
            .map_err(|_| TransportError::Closed)
    }

    async fn open_stream(&self) -> Result<StreamHalves, TransportError> {
        self.require_connected()?;
        // Odd ids, starting at 1: fetch_add by 2 from the last allocated id.
        let stream_id = self.next_local_stream_id.fetch_add(2, Ordering::SeqCst);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.streams.insert(stream_id, StreamEntry { inbound_tx });

        self.write_tx
            .send(Message::Binary(
                encode_frame(FRAME_OPEN_STREAM, stream_id, &[]).into(),
            ))
            .map_err(|_| TransportError::Closed)?;

        Ok(StreamHalves {
            inbound: Box::pin(VirtualReader {
                rx: inbound_rx,
                pending: Vec::new(),
                offset: 0,
            }),
            outbound: Box::pin(VirtualWriter {
                stream_id,
                tx: self.write_tx.clone(),
                closed: false,
            }),
            stream_id,
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.state.get() == TransportState::Closed {
            return Ok(());
        }
        self.state.set(TransportState::Closed);
        self.streams.clear();
        let _ = self.write_tx.send(Message::Close(None));
        Ok(())
    }
}

async fn send_loop(
    mut ws_sink: futures::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
        Message,
    >,
    mut write_rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = write_rx.recv().await {
        if ws_sink.send(message).await.is_err() {
            break;
        }
    }
    let _ = ws_sink.close().await;
}

async fn recv_loop(
    mut ws_stream: futures::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    >,
    state: Arc<StateCell>,
    streams: Arc<DashMap<u32, StreamEntry>>,
    write_tx: mpsc::UnboundedSender<Message>,
    sink: Arc<dyn EventSink>,
) {
    let mut control_decoder = FrameDecoder::new();
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Binary(bytes))) => {
                if let Err(err) = handle_frame(&bytes, &streams, &write_tx, &sink, &mut control_decoder).await {
                    tracing::warn!(error = %err, "single-socket transport: frame handling failed");
                    state.set(TransportState::Closed);
                    streams.clear();
                    sink.on_error(err).await;
                    sink.on_close().await;
                    return;
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                state.set(TransportState::Closed);
                streams.clear();
                sink.on_error(TransportError::WebSocket(e.to_string())).await;
                sink.on_close().await;
                return;
            }
        }
    }
    state.set(TransportState::Closed);
    streams.clear();
    sink.on_close().await;
}

async fn handle_frame(
    bytes: &[u8],
    streams: &Arc<DashMap<u32, StreamEntry>>,
    write_tx: &mpsc::UnboundedSender<Message>,
    sink: &Arc<dyn EventSink>,
    control_decoder: &mut FrameDecoder,
) -> Result<(), TransportError> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(TransportError::UnknownFrameType(0));
    }
    let frame_type = bytes[0];
    let stream_id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let payload = &bytes[FRAME_HEADER_LEN..];

    match frame_type {
        FRAME_CONTROL => {
            for record in control_decoder.feed(payload)? {
                sink.on_control(record).await;
            }
            Ok(())
        }
        FRAME_DATA => {
            if let Some(entry) = streams.get(&stream_id) {
                let _ = entry.inbound_tx.send(payload.to_vec());
            }
            Ok(())
        }
        FRAME_OPEN_STREAM => {
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            streams.insert(stream_id, StreamEntry { inbound_tx });
            sink.on_stream_open(StreamHalves {
                inbound: Box::pin(VirtualReader {
                    rx: inbound_rx,
                    pending: Vec::new(),
                    offset: 0,
                }),
                outbound: Box::pin(VirtualWriter {
                    stream_id,
                    tx: write_tx.clone(),
                    closed: false,
                }),
                stream_id,
            })
            .await;
            Ok(())
        }
        FRAME_CLOSE_STREAM => {
            streams.remove(&stream_id);
            Ok(())
        }
        other => Err(TransportError::UnknownFrameType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_header_round_trips() {
        let frame = encode_frame(FRAME_DATA, 7, b"hello");
        assert_eq!(frame[0], FRAME_DATA);
        assert_eq!(u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]), 7);
        assert_eq!(&frame[FRAME_HEADER_LEN..], b"hello");
    }

    #[tokio::test]
    async fn virtual_reader_yields_eof_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(tx);
        let mut reader = VirtualReader { rx, pending: Vec::new(), offset: 0 };
        let mut buf = [0u8; 16];
        let mut read_buf = ReadBuf::new(&mut buf);
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        match Pin::new(&mut reader).poll_read(&mut cx, &mut read_buf) {
            Poll::Ready(Ok(())) => assert_eq!(read_buf.filled().len(), 0),
            other => panic!("expected immediate EOF, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn virtual_reader_delivers_buffered_chunk() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(b"hi".to_vec()).unwrap();
        let mut reader = VirtualReader { rx, pending: Vec::new(), offset: 0 };
        let mut buf = [0u8; 16];
        let mut read_buf = ReadBuf::new(&mut buf);
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        match Pin::new(&mut reader).poll_read(&mut cx, &mut read_buf) {
            Poll::Ready(Ok(())) => assert_eq!(read_buf.filled(), b"hi"),
            other => panic!("expected data, got {other:?}"),
        }
    }
}
