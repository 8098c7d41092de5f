//! Client-side handle to one open channel (§4.5): a byte stream plus the
//! control-record actions (resize, signal, close) that apply to it.
//!
//! State lives behind a shared mutex so both the handle returned to the
//! caller and the client's dispatch loop (which delivers `Exit`/`Close`
//! records that arrive asynchronously) can observe and update it. The
//! transition rules themselves follow the `can_transition`/`transition_to`
//! shape used for the wire-level session state machine, generalized from
//! that machine's six states down to a channel handle's three.

use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::error::SessionError;

/// A channel handle's lifecycle (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `OpenOk` received; reads/writes/resize/signal are valid.
    Open,
    /// `close()` called; `Close` sent, awaiting the stream's teardown.
    Closing,
    /// `Close`/`Exit` observed, or the stream fully torn down.
    Closed,
}

impl SessionState {
    fn can_transition(self, to: SessionState) -> bool {
        matches!(
            (self, to),
            (SessionState::Open, SessionState::Closing | SessionState::Closed)
                | (SessionState::Closing, SessionState::Closed)
                | (SessionState::Closed, SessionState::Closed)
        )
    }
}

/// Channel kind, as negotiated by `Open`/`OpenOk` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Interactive pty: supports `resize`.
    Pty,
    /// Non-interactive one-shot command.
    Exec,
    /// File transfer channel.
    File,
    /// Gateway-forwarded TCP or UDP stream.
    Gateway,
}

/// Control-plane actions a [`Session`] sends back to the owning
/// [`crate::client::Client`] for messages that don't flow over the byte stream.
#[derive(Debug, Clone)]
pub enum ControlAction {
    /// Resize request for a `pty` channel.
    Resize {
        /// Target channel.
        channel_id: u32,
        /// New column count.
        cols: u16,
        /// New row count.
        rows: u16,
    },
    /// Forward a signal to the channel's remote process.
    Signal {
        /// Target channel.
        channel_id: u32,
        /// POSIX signal name, e.g. `"SIGINT"`.
        signal: String,
    },
    /// Close the channel.
    Close {
        /// Target channel.
        channel_id: u32,
    },
}

/// Shared handle the client's dispatch loop uses to notify a [`Session`] of
/// inbound `Exit`/`Close` records, without owning the session's byte stream.
pub(crate) struct SessionNotifier {
    state: Arc<Mutex<SessionState>>,
    exit_tx: Mutex<Option<oneshot::Sender<i32>>>,
}

impl SessionNotifier {
    /// Mark the channel closed and, if an exit code accompanied the record, deliver it
    /// to a pending [`Session::wait_exit`] call.
    pub(crate) async fn notify_closed(&self, exit_code: Option<i32>) {
        let mut state = self.state.lock().await;
        *state = SessionState::Closed;
        drop(state);
        if let Some(code) = exit_code {
            if let Some(tx) = self.exit_tx.lock().await.take() {
                let _ = tx.send(code);
            }
        }
    }
}

/// A client-held handle to one open channel.
///
/// Reads and writes go directly over the transport-level byte stream;
/// resize/signal/close are routed through `control_tx` to the client's
/// dispatch loop, which serializes them onto the control channel.
pub struct Session {
    channel_id: u32,
    kind: ChannelKind,
    state: Arc<Mutex<SessionState>>,
    inbound: Pin<Box<dyn AsyncRead + Send>>,
    outbound: Pin<Box<dyn AsyncWrite + Send>>,
    control_tx: mpsc::UnboundedSender<ControlAction>,
    exit_rx: Option<oneshot::Receiver<i32>>,
}

impl Session {
    /// Wrap an opened channel's byte stream with its control-action sender.
    ///
    /// Returns the session handle plus the [`SessionNotifier`] the owning
    /// client registers in its channel table to deliver asynchronous
    /// `Exit`/`Close` records.
    #[must_use]
    pub(crate) fn new(
        channel_id: u32,
        kind: ChannelKind,
        inbound: Pin<Box<dyn AsyncRead + Send>>,
        outbound: Pin<Box<dyn AsyncWrite + Send>>,
        control_tx: mpsc::UnboundedSender<ControlAction>,
    ) -> (Self, Arc<SessionNotifier>) {
        let state = Arc::new(Mutex::new(SessionState::Open));
        let (exit_tx, exit_rx) = oneshot::channel();
        let notifier = Arc::new(SessionNotifier {
            state: state.clone(),
            exit_tx: Mutex::new(Some(exit_tx)),
        });
        let session = Self {
            channel_id,
            kind,
            state,
            inbound,
            outbound,
            control_tx,
            exit_rx: Some(exit_rx),
        };
        (session, notifier)
    }

    /// Channel id assigned by `OpenOk`.
    #[must_use]
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// Channel kind.
    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    async fn transition_to(&self, new_state: SessionState) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if !state.can_transition(new_state) {
            return Err(SessionError::InvalidTransition);
        }
        let old_state = *state;
        *state = new_state;
        tracing::debug!(
            channel_id = self.channel_id,
            "session state transition: {:?} -> {:?}",
            old_state,
            new_state
        );
        Ok(())
    }

    async fn ensure_open(&self) -> Result<(), SessionError> {
        if *self.state.lock().await != SessionState::Open {
            return Err(SessionError::NotOpen(self.channel_id));
        }
        Ok(())
    }

    /// Write `data` to the channel's outbound stream (e.g. stdin for a `pty`/`exec` channel).
    pub async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.ensure_open().await?;
        self.outbound.write_all(data).await?;
        Ok(())
    }

    /// Read the next chunk from the channel's inbound stream. Returns `0` on EOF.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SessionError> {
        self.ensure_open().await?;
        Ok(self.inbound.read(buf).await?)
    }

    /// Resize a `pty` channel's terminal dimensions.
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<(), SessionError> {
        self.ensure_open().await?;
        if self.kind != ChannelKind::Pty {
            return Err(SessionError::NotAPty);
        }
        self.control_tx
            .send(ControlAction::Resize { channel_id: self.channel_id, cols, rows })
            .map_err(|_| SessionError::ClientGone)
    }

    /// Forward a POSIX signal (e.g. `"SIGINT"`) to the channel's remote process.
    pub async fn signal(&self, signal: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_open().await?;
        self.control_tx
            .send(ControlAction::Signal { channel_id: self.channel_id, signal: signal.into() })
            .map_err(|_| SessionError::ClientGone)
    }

    /// Request the channel be closed: send `Close`, shut down the outbound half, and wait
    /// for the shared state to settle (the client marks it `Closed` once the server confirms).
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if *self.state.lock().await == SessionState::Closed {
            return Ok(());
        }
        self.transition_to(SessionState::Closing).await?;
        self.control_tx
            .send(ControlAction::Close { channel_id: self.channel_id })
            .map_err(|_| SessionError::ClientGone)?;
        self.outbound.shutdown().await?;
        Ok(())
    }

    /// Wait for the channel's `Exit` record, returning the remote process's exit code.
    ///
    /// Returns `None` if the channel closed without ever reporting one (e.g. a `file`
    /// channel, or a `Close` with no accompanying exit code).
    pub async fn wait_exit(&mut self) -> Option<i32> {
        match self.exit_rx.take() {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn test_session() -> (Session, Arc<SessionNotifier>, mpsc::UnboundedReceiver<ControlAction>) {
        let (client_io, _peer_io) = duplex(64);
        let (read_half, write_half) = tokio::io::split(client_io);
        let (tx, rx) = mpsc::unbounded_channel();
        let (session, notifier) =
            Session::new(7, ChannelKind::Pty, Box::pin(read_half), Box::pin(write_half), tx);
        (session, notifier, rx)
    }

    #[test]
    fn open_can_transition_to_closing_or_closed() {
        assert!(SessionState::Open.can_transition(SessionState::Closing));
        assert!(SessionState::Open.can_transition(SessionState::Closed));
        assert!(!SessionState::Closing.can_transition(SessionState::Open));
    }

    #[test]
    fn closed_cannot_transition_to_open() {
        assert!(!SessionState::Closed.can_transition(SessionState::Open));
    }

    #[tokio::test]
    async fn resize_on_non_pty_channel_is_rejected() {
        let (client_io, _peer_io) = duplex(64);
        let (read_half, write_half) = tokio::io::split(client_io);
        let (tx, _rx) = mpsc::unbounded_channel();
        let (session, _notifier) =
            Session::new(1, ChannelKind::Exec, Box::pin(read_half), Box::pin(write_half), tx);
        assert!(matches!(session.resize(80, 24).await, Err(SessionError::NotAPty)));
    }

    #[tokio::test]
    async fn resize_sends_a_control_action() {
        let (session, _notifier, mut rx) = test_session();
        session.resize(100, 40).await.unwrap();
        match rx.try_recv().unwrap() {
            ControlAction::Resize { channel_id, cols, rows } => {
                assert_eq!(channel_id, 7);
                assert_eq!(cols, 100);
                assert_eq!(rows, 40);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_sends_a_close_action_and_rejects_further_writes() {
        let (mut session, _notifier, mut rx) = test_session();
        session.close().await.unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(matches!(session.write(b"x").await, Err(SessionError::NotOpen(7))));
    }

    #[tokio::test]
    async fn notifier_delivers_exit_code() {
        let (mut session, notifier, _rx) = test_session();
        notifier.notify_closed(Some(17)).await;
        assert_eq!(session.state().await, SessionState::Closed);
        assert_eq!(session.wait_exit().await, Some(17));
    }

    #[tokio::test]
    async fn notifier_without_exit_code_still_closes() {
        let (mut session, notifier, _rx) = test_session();
        notifier.notify_closed(None).await;
        assert_eq!(session.state().await, SessionState::Closed);
        assert_eq!(session.wait_exit().await, None);
    }
}
