//! Receiver: the synchronization point of one channel endpoint.
//!
//! A receiver records at most one pending get and one pending put. It never
//! decides on its own whether a rendezvous may happen; it only answers the local
//! question "are both sides here?". All access happens under the director lock.

use super::matrix::{ReceiverId, ReceiverMatrix};
use super::status::{ReceiverFlags, ReceiverPhase};
use crate::director::ActorId;
use crate::error::{RendezvousError, Result};
use std::fmt;
use std::sync::Arc;

/// The two sides of a channel endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Side {
    /// The receiving side.
    Get,
    /// The sending side.
    Put,
}

impl Side {
    /// The other side.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Get => Self::Put,
            Self::Put => Self::Get,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("get"),
            Self::Put => f.write_str("put"),
        }
    }
}

/// How a registration relates to the rest of its operation.
#[derive(Clone, Debug)]
pub(crate) enum Linkage {
    /// A plain get or put; the far side is an external channel.
    Simple,
    /// Part of a composite get-then-put operation. `partner` is the matrix on
    /// the other side of the same composite, `conditional` its choice mode.
    Symmetric {
        partner: Arc<ReceiverMatrix>,
        conditional: bool,
    },
}

impl Linkage {
    pub(crate) const fn is_symmetric(&self) -> bool {
        matches!(self, Self::Symmetric { .. })
    }
}

/// One side of an operation, as recorded on each of its receivers.
#[derive(Clone, Debug)]
pub(crate) struct Registration {
    /// The actor waiting on this side.
    pub actor: ActorId,
    /// First-ready-wins rather than all-must-succeed.
    pub conditional: bool,
    /// The full matrix of the operation on this side.
    pub channels: Arc<ReceiverMatrix>,
    /// Which channel of `channels` this receiver belongs to.
    pub channel: usize,
    pub linkage: Linkage,
}

/// Token staged by a pending put.
#[derive(Clone, Debug)]
pub(crate) enum Payload<T> {
    /// Supplied by the putting actor.
    Token(T),
    /// Supplied during the commit by the composite's get side: the token from
    /// input channel `Some(i)`, or from whichever input channel was chosen.
    Forward(Option<usize>),
}

/// State of one channel endpoint.
#[derive(Debug)]
pub(crate) struct Receiver<T> {
    get: Option<Registration>,
    put: Option<Registration>,
    payload: Option<Payload<T>>,
}

impl<T> Default for Receiver<T> {
    fn default() -> Self {
        Self {
            get: None,
            put: None,
            payload: None,
        }
    }
}

impl<T> Receiver<T> {
    /// Create an idle receiver.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail if `side` is held by an actor other than `actor`.
    pub(crate) fn ensure_free(&self, id: ReceiverId, side: Side, actor: ActorId) -> Result<()> {
        match self.registration(side) {
            Some(held) if held.actor != actor => Err(RendezvousError::Busy {
                receiver: id,
                side,
                holder: held.actor,
            }),
            _ => Ok(()),
        }
    }

    /// Record a pending get.
    pub(crate) fn register_get(
        &mut self,
        id: ReceiverId,
        registration: Registration,
    ) -> Result<()> {
        self.ensure_free(id, Side::Get, registration.actor)?;
        self.get = Some(registration);
        Ok(())
    }

    /// Record a pending put together with its payload.
    pub(crate) fn register_put(
        &mut self,
        id: ReceiverId,
        registration: Registration,
        payload: Payload<T>,
    ) -> Result<()> {
        self.ensure_free(id, Side::Put, registration.actor)?;
        self.put = Some(registration);
        self.payload = Some(payload);
        Ok(())
    }

    /// The registration on `side`, if pending.
    pub(crate) const fn registration(&self, side: Side) -> Option<&Registration> {
        match side {
            Side::Get => self.get.as_ref(),
            Side::Put => self.put.as_ref(),
        }
    }

    /// The token staged by the pending put.
    pub(crate) const fn payload(&self) -> Option<&Payload<T>> {
        self.payload.as_ref()
    }

    /// Both sides are pending. Necessary, not sufficient, for a rendezvous.
    #[inline]
    pub(crate) const fn is_ready(&self) -> bool {
        self.get.is_some() && self.put.is_some()
    }

    #[inline]
    pub(crate) const fn is_read_blocked(&self) -> bool {
        self.get.is_some()
    }

    #[inline]
    pub(crate) const fn is_write_blocked(&self) -> bool {
        self.put.is_some()
    }

    pub(crate) fn reset_get(&mut self) {
        self.get = None;
    }

    pub(crate) fn reset_put(&mut self) {
        self.put = None;
        self.payload = None;
    }

    pub(crate) fn reset(&mut self) {
        self.reset_get();
        self.reset_put();
    }

    /// Withdraw whatever `actor` has registered here.
    pub(crate) fn withdraw(&mut self, actor: ActorId) {
        if self.get.as_ref().is_some_and(|g| g.actor == actor) {
            self.reset_get();
        }
        if self.put.as_ref().is_some_and(|p| p.actor == actor) {
            self.reset_put();
        }
    }

    /// Consume both sides for a commit, leaving the receiver idle.
    pub(crate) fn take(&mut self) -> Option<(Registration, Registration, Payload<T>)> {
        if !self.is_ready() {
            return None;
        }
        let get = self.get.take()?;
        let put = self.put.take()?;
        let payload = self.payload.take()?;
        Some((get, put, payload))
    }

    pub(crate) const fn phase(&self) -> ReceiverPhase {
        ReceiverPhase::from_pending(self.get.is_some(), self.put.is_some())
    }

    pub(crate) fn flags(&self) -> ReceiverFlags {
        let mut flags = ReceiverFlags::empty();
        if let Some(get) = &self.get {
            flags |= ReceiverFlags::READ_BLOCKED;
            flags.set(ReceiverFlags::GET_CONDITIONAL, get.conditional);
            flags.set(ReceiverFlags::SYMMETRIC, get.linkage.is_symmetric());
        }
        if let Some(put) = &self.put {
            flags |= ReceiverFlags::WRITE_BLOCKED;
            flags.set(ReceiverFlags::PUT_CONDITIONAL, put.conditional);
            if put.linkage.is_symmetric() {
                flags |= ReceiverFlags::SYMMETRIC;
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(actor: usize, conditional: bool) -> Registration {
        Registration {
            actor: ActorId::new(actor),
            conditional,
            channels: Arc::new(ReceiverMatrix::single(ReceiverId::new(0))),
            channel: 0,
            linkage: Linkage::Simple,
        }
    }

    #[test]
    fn test_receiver_starts_idle() {
        let rx = Receiver::<i32>::new();
        assert_eq!(rx.phase(), ReceiverPhase::Idle);
        assert!(!rx.is_ready());
        assert!(rx.flags().is_empty());
    }

    #[test]
    fn test_receiver_ready_needs_both_sides() {
        let id = ReceiverId::new(0);
        let mut rx = Receiver::new();
        rx.register_get(id, registration(0, false)).unwrap();
        assert!(rx.is_read_blocked());
        assert!(!rx.is_ready());
        assert_eq!(rx.phase(), ReceiverPhase::WaitingGet);

        rx.register_put(id, registration(1, true), Payload::Token(5)).unwrap();
        assert!(rx.is_ready());
        assert_eq!(rx.phase(), ReceiverPhase::Ready);
        assert!(rx.flags().contains(ReceiverFlags::PUT_CONDITIONAL));
        assert!(!rx.flags().contains(ReceiverFlags::GET_CONDITIONAL));
    }

    #[test]
    fn test_receiver_rejects_second_getter() {
        let id = ReceiverId::new(3);
        let mut rx = Receiver::<i32>::new();
        rx.register_get(id, registration(0, false)).unwrap();
        // Same actor may re-register.
        rx.register_get(id, registration(0, true)).unwrap();

        let err = rx.register_get(id, registration(1, false)).unwrap_err();
        assert!(matches!(
            err,
            RendezvousError::Busy { side: Side::Get, .. }
        ));
    }

    #[test]
    fn test_receiver_take_resets() {
        let id = ReceiverId::new(0);
        let mut rx = Receiver::new();
        rx.register_get(id, registration(0, false)).unwrap();
        assert!(rx.take().is_none());
        rx.register_put(id, registration(1, false), Payload::Token("a")).unwrap();

        let (get, put, payload) = rx.take().unwrap();
        assert_eq!(get.actor, ActorId::new(0));
        assert_eq!(put.actor, ActorId::new(1));
        assert!(matches!(payload, Payload::Token("a")));
        assert_eq!(rx.phase(), ReceiverPhase::Idle);
    }

    #[test]
    fn test_receiver_withdraw_only_own_side() {
        let id = ReceiverId::new(0);
        let mut rx = Receiver::new();
        rx.register_get(id, registration(0, false)).unwrap();
        rx.register_put(id, registration(1, false), Payload::Token(1)).unwrap();

        rx.withdraw(ActorId::new(1));
        assert_eq!(rx.phase(), ReceiverPhase::WaitingGet);
        rx.withdraw(ActorId::new(1));
        assert_eq!(rx.phase(), ReceiverPhase::WaitingGet);
        rx.withdraw(ActorId::new(0));
        assert_eq!(rx.phase(), ReceiverPhase::Idle);
    }
}
