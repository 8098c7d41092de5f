//! The waiter table: registers request/response expectations against inbound
//! control records (§4.6).
//!
//! Keyed either by a single opcode or a multi-opcode set. Dispatch order:
//! exact-opcode waiters drain FIFO before multi-opcode waiters; multi-opcode
//! waiters drain FIFO among themselves with a first-match rule. Mirrors the
//! teacher's `response_tx: HashMap<u8, Vec<oneshot::Sender<Envelope>>>`
//! pattern in `client.rs`, generalized from "one opcode → a stack of
//! waiters" to "one opcode-set → a FIFO queue of waiters" per the spec's
//! multi-opcode wait requirement.

use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;
use wsh_protocol::{Envelope, MsgType};

/// A unique handle identifying one registered waiter, used to cancel it on timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterId(u64);

/// FIFO table of pending request/response waits over inbound control records.
#[derive(Default)]
pub struct WaiterTable {
    next_id: u64,
    exact: HashMap<MsgType, VecDeque<(WaiterId, oneshot::Sender<Envelope>)>>,
    multi: VecDeque<(WaiterId, Vec<MsgType>, oneshot::Sender<Envelope>)>,
}

impl WaiterTable {
    /// Fresh, empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait on a single opcode, returning the receiver and a cancellation handle.
    pub fn register_single(&mut self, opcode: MsgType) -> (WaiterId, oneshot::Receiver<Envelope>) {
        let (tx, rx) = oneshot::channel();
        let id = self.alloc_id();
        self.exact.entry(opcode).or_default().push_back((id, tx));
        (id, rx)
    }

    /// Register a wait matching any opcode in `opcodes`.
    pub fn register_multi(&mut self, opcodes: Vec<MsgType>) -> (WaiterId, oneshot::Receiver<Envelope>) {
        let (tx, rx) = oneshot::channel();
        let id = self.alloc_id();
        self.multi.push_back((id, opcodes, tx));
        (id, rx)
    }

    fn alloc_id(&mut self) -> WaiterId {
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Offer an inbound envelope to the table. Returns `true` if a waiter claimed it.
    pub fn resolve(&mut self, envelope: Envelope) -> bool {
        let msg_type = envelope.msg_type;

        if let Some(queue) = self.exact.get_mut(&msg_type) {
            if let Some((_, tx)) = queue.pop_front() {
                if queue.is_empty() {
                    self.exact.remove(&msg_type);
                }
                let _ = tx.send(envelope);
                return true;
            }
        }

        if let Some(pos) = self.multi.iter().position(|(_, types, _)| types.contains(&msg_type)) {
            let (_, _, tx) = self.multi.remove(pos).expect("position just found");
            let _ = tx.send(envelope);
            return true;
        }

        false
    }

    /// Cancel a previously-registered waiter (called on timeout, before rejecting the caller).
    pub fn cancel(&mut self, id: WaiterId, registration_hint: Option<MsgType>) {
        if let Some(opcode) = registration_hint {
            if let Some(queue) = self.exact.get_mut(&opcode) {
                queue.retain(|(waiter_id, _)| *waiter_id != id);
                if queue.is_empty() {
                    self.exact.remove(&opcode);
                }
                return;
            }
        }
        for queue in self.exact.values_mut() {
            queue.retain(|(waiter_id, _)| *waiter_id != id);
        }
        self.multi.retain(|(waiter_id, _, _)| *waiter_id != id);
    }

    /// Reject every pending waiter by dropping its sender, which resolves the paired receiver
    /// to an error. Called on disconnect.
    pub fn clear(&mut self) {
        self.exact.clear();
        self.multi.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(msg_type: MsgType) -> Envelope {
        Envelope { msg_type, payload: wsh_protocol::Payload::Empty }
    }

    #[tokio::test]
    async fn exact_waiter_resolves_before_multi() {
        let mut table = WaiterTable::new();
        let (_multi_id, mut multi_rx) = table.register_multi(vec![MsgType::OpenOk, MsgType::OpenFail]);
        let (_exact_id, mut exact_rx) = table.register_single(MsgType::OpenOk);

        assert!(table.resolve(envelope(MsgType::OpenOk)));

        assert!(exact_rx.try_recv().is_ok());
        assert!(multi_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn multi_waiter_matches_any_registered_opcode() {
        let mut table = WaiterTable::new();
        let (_id, mut rx) = table.register_multi(vec![MsgType::OpenOk, MsgType::OpenFail]);

        assert!(table.resolve(envelope(MsgType::OpenFail)));
        let resolved = rx.try_recv().unwrap();
        assert_eq!(resolved.msg_type, MsgType::OpenFail);
    }

    #[tokio::test]
    async fn unmatched_opcode_is_not_claimed() {
        let mut table = WaiterTable::new();
        let (_id, _rx) = table.register_single(MsgType::AuthOk);
        assert!(!table.resolve(envelope(MsgType::Ping)));
    }

    #[tokio::test]
    async fn cancel_removes_a_waiter_before_timeout_resolution() {
        let mut table = WaiterTable::new();
        let (id, mut rx) = table.register_single(MsgType::AuthOk);
        table.cancel(id, Some(MsgType::AuthOk));
        assert!(!table.resolve(envelope(MsgType::AuthOk)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fifo_order_within_exact_queue() {
        let mut table = WaiterTable::new();
        let (_id1, mut rx1) = table.register_single(MsgType::Pong);
        let (_id2, mut rx2) = table.register_single(MsgType::Pong);

        assert!(table.resolve(envelope(MsgType::Pong)));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());

        assert!(table.resolve(envelope(MsgType::Pong)));
        assert!(rx2.try_recv().is_ok());
    }
}
