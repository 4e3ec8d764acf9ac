//! The director's locked state.
//!
//! Everything in here is only touched with the director mutex held: the receiver
//! arena, the actor registry with its active/blocked counters, and the results
//! of commits waiting for their actors to wake up.

use super::actor::{ActorId, ActorStatus};
use super::commit::Delivery;
use super::deadlock::{BlockedActor, DeadlockReport};
use crate::checker::{Entry, ReadinessChecker};
use crate::error::{RendezvousError, Result};
use crate::receiver::{Linkage, Payload, Receiver, ReceiverId, ReceiverMatrix, Registration, Side};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// One side of a requested operation.
#[derive(Clone, Debug)]
pub(crate) struct OpSide {
    pub matrix: Arc<ReceiverMatrix>,
    pub conditional: bool,
}

impl OpSide {
    pub(crate) fn new(matrix: &ReceiverMatrix, conditional: bool) -> Self {
        Self {
            matrix: Arc::new(matrix.clone()),
            conditional,
        }
    }
}

/// Tokens offered by the put side of an operation.
#[derive(Debug)]
pub(crate) enum PutPayloads<T> {
    /// One token per channel.
    PerChannel(Vec<T>),
    /// The same token on every channel (only one will be taken).
    Same(T),
    /// Composite put: tokens come from the get side during the commit, from
    /// the chosen input (`any`) or input channel `i` to output channel `i`.
    Forward { any: bool },
}

/// A channel operation as submitted by an actor.
#[derive(Debug)]
pub(crate) struct Request<T> {
    pub get: Option<OpSide>,
    pub put: Option<(OpSide, PutPayloads<T>)>,
}

/// The registered, not yet committed, operation of an actor.
#[derive(Clone, Debug, Default)]
pub(crate) struct PendingOp {
    pub get: Option<OpSide>,
    pub put: Option<OpSide>,
}

impl PendingOp {
    /// Every receiver the operation touches.
    fn receivers(&self) -> impl Iterator<Item = ReceiverId> + '_ {
        self.get
            .iter()
            .chain(self.put.iter())
            .flat_map(|side| side.matrix.iter().map(|(_, r)| r))
    }
}

#[derive(Debug)]
pub(crate) struct ActorRecord {
    pub name: String,
    pub status: ActorStatus,
    pub op: Option<PendingOp>,
}

pub(crate) struct DirectorState<T> {
    pub(crate) receivers: Vec<Receiver<T>>,
    pub(crate) actors: Vec<ActorRecord>,
    pub(crate) active: usize,
    pub(crate) blocked: usize,
    pub(crate) results: HashMap<ActorId, Delivery<T>>,
    pub(crate) finish_requested: bool,
    pub(crate) deadlock_reported: bool,
}

impl<T> Default for DirectorState<T> {
    fn default() -> Self {
        Self {
            receivers: Vec::new(),
            actors: Vec::new(),
            active: 0,
            blocked: 0,
            results: HashMap::new(),
            finish_requested: false,
            deadlock_reported: false,
        }
    }
}

impl<T> DirectorState<T> {
    pub(crate) fn add_receiver(&mut self) -> ReceiverId {
        let id = ReceiverId::new(self.receivers.len());
        self.receivers.push(Receiver::new());
        id
    }

    pub(crate) fn receiver(&self, id: ReceiverId) -> Option<&Receiver<T>> {
        self.receivers.get(id.index())
    }

    pub(crate) fn reset_receiver(&mut self, id: ReceiverId) -> Result<()> {
        self.receivers
            .get_mut(id.index())
            .ok_or(RendezvousError::UnknownReceiver(id))?
            .reset();
        Ok(())
    }

    pub(crate) fn register_actor(&mut self, name: String) -> ActorId {
        let id = ActorId::new(self.actors.len());
        debug!(actor = %id, %name, "actor registered");
        self.actors.push(ActorRecord {
            name,
            status: ActorStatus::Active,
            op: None,
        });
        self.active += 1;
        id
    }

    pub(crate) fn actor_status(&self, actor: ActorId) -> Option<ActorStatus> {
        self.actors.get(actor.index()).map(|record| record.status)
    }

    /// Mark an actor as waiting. No-op unless it is active.
    pub(crate) fn thread_blocked(&mut self, actor: ActorId) {
        if let Some(record) = self.actors.get_mut(actor.index()) {
            if record.status == ActorStatus::Active {
                record.status = ActorStatus::Blocked;
                self.blocked += 1;
            }
        }
    }

    /// Mark an actor as running again. Ends the current deadlock episode.
    pub(crate) fn thread_unblocked(&mut self, actor: ActorId) {
        if let Some(record) = self.actors.get_mut(actor.index()) {
            if record.status == ActorStatus::Blocked {
                record.status = ActorStatus::Active;
                self.blocked -= 1;
                self.deadlock_reported = false;
            }
        }
    }

    pub(crate) fn stop_actor(&mut self, actor: ActorId) {
        self.abandon(actor);
        let Some(record) = self.actors.get_mut(actor.index()) else {
            return;
        };
        match record.status {
            ActorStatus::Stopped => return,
            ActorStatus::Blocked => self.blocked -= 1,
            ActorStatus::Active => {}
        }
        record.status = ActorStatus::Stopped;
        self.active -= 1;
        debug!(%actor, name = %record.name, active = self.active, "actor stopped");
    }

    /// Withdraw the actor's pending operation and drop any unclaimed result.
    pub(crate) fn abandon(&mut self, actor: ActorId) {
        self.withdraw(actor);
        self.results.remove(&actor);
    }

    /// Remove the actor's registrations from every receiver of its operation.
    pub(crate) fn withdraw(&mut self, actor: ActorId) {
        let Some(op) = self
            .actors
            .get_mut(actor.index())
            .and_then(|record| record.op.take())
        else {
            return;
        };
        for id in op.receivers() {
            if let Some(receiver) = self.receivers.get_mut(id.index()) {
                receiver.withdraw(actor);
            }
        }
    }

    pub(crate) fn take_result(&mut self, actor: ActorId) -> Option<Delivery<T>> {
        self.results.remove(&actor)
    }

    pub(crate) const fn all_threads_blocked(&self) -> bool {
        self.blocked == self.active
    }

    /// Cancel everything: clear every receiver and pending operation. Results of
    /// commits that already happened are left for their actors to collect.
    pub(crate) fn request_finish(&mut self) {
        self.finish_requested = true;
        for receiver in &mut self.receivers {
            receiver.reset();
        }
        for record in &mut self.actors {
            record.op = None;
        }
        debug!(active = self.active, blocked = self.blocked, "finish requested");
    }

    /// Build a report if this is the start of a deadlock episode.
    pub(crate) fn deadlock_report(&mut self) -> Option<DeadlockReport> {
        if self.active == 0
            || !self.all_threads_blocked()
            || self.finish_requested
            || self.deadlock_reported
        {
            return None;
        }
        self.deadlock_reported = true;

        let ids = |side: &Option<OpSide>| -> Vec<ReceiverId> {
            side.iter()
                .flat_map(|s| s.matrix.iter().map(|(_, r)| r))
                .collect()
        };
        let actors = self
            .actors
            .iter()
            .enumerate()
            .filter(|(_, record)| record.status == ActorStatus::Blocked)
            .map(|(index, record)| {
                let op = record.op.clone().unwrap_or_default();
                BlockedActor {
                    id: ActorId::new(index),
                    name: record.name.clone(),
                    reading: ids(&op.get),
                    writing: ids(&op.put),
                }
            })
            .collect();
        Some(DeadlockReport {
            active: self.active,
            blocked: self.blocked,
            actors,
        })
    }

    /// Validate one side of a request against the arena.
    fn validate_side(
        &self,
        side: &OpSide,
        which: Side,
        actor: ActorId,
        seen: &mut HashSet<ReceiverId>,
    ) -> Result<()> {
        if side.conditional && side.matrix.is_empty() {
            return Err(RendezvousError::EmptyChoice);
        }
        for (index, channel) in side.matrix.channels().enumerate() {
            if channel.is_empty() {
                return Err(RendezvousError::EmptyChannel { channel: index });
            }
            for &id in channel {
                let receiver = self
                    .receiver(id)
                    .ok_or(RendezvousError::UnknownReceiver(id))?;
                if !seen.insert(id) {
                    return Err(RendezvousError::DuplicateReceiver(id));
                }
                receiver.ensure_free(id, which, actor)?;
            }
        }
        Ok(())
    }
}

impl<T: Clone> DirectorState<T> {
    /// Record `request` as the actor's pending operation.
    ///
    /// The request is validated in full before any receiver is touched.
    pub(crate) fn register(&mut self, actor: ActorId, request: Request<T>) -> Result<()> {
        let mut seen = HashSet::new();
        if let Some(get) = &request.get {
            self.validate_side(get, Side::Get, actor, &mut seen)?;
        }
        if let Some((put, payloads)) = &request.put {
            self.validate_side(put, Side::Put, actor, &mut seen)?;
            if let PutPayloads::PerChannel(tokens) = payloads {
                if tokens.len() != put.matrix.channel_count() {
                    return Err(RendezvousError::TokenCount {
                        expected: put.matrix.channel_count(),
                        actual: tokens.len(),
                    });
                }
            }
        }
        if request.get.is_none() && request.put.is_none() {
            return Err(RendezvousError::Internal(
                "operation with neither a get nor a put side".to_string(),
            ));
        }

        // Replace whatever a previous, abandoned operation left behind.
        self.withdraw(actor);

        let put_side = request.put.as_ref().map(|(side, _)| side.clone());
        let (get_linkage, put_linkage) = match (&request.get, &put_side) {
            (Some(get), Some(put)) => (
                Linkage::Symmetric {
                    partner: Arc::clone(&put.matrix),
                    conditional: put.conditional,
                },
                Linkage::Symmetric {
                    partner: Arc::clone(&get.matrix),
                    conditional: get.conditional,
                },
            ),
            _ => (Linkage::Simple, Linkage::Simple),
        };

        if let Some(get) = &request.get {
            for (channel, id) in get.matrix.iter() {
                let registration = Registration {
                    actor,
                    conditional: get.conditional,
                    channels: Arc::clone(&get.matrix),
                    channel,
                    linkage: get_linkage.clone(),
                };
                self.receivers[id.index()].register_get(id, registration)?;
            }
        }
        if let Some((put, payloads)) = request.put {
            for (channel, id) in put.matrix.iter() {
                let payload = match &payloads {
                    PutPayloads::PerChannel(tokens) => Payload::Token(tokens[channel].clone()),
                    PutPayloads::Same(token) => Payload::Token(token.clone()),
                    PutPayloads::Forward { any: true } => Payload::Forward(None),
                    PutPayloads::Forward { any: false } => Payload::Forward(Some(channel)),
                };
                let registration = Registration {
                    actor,
                    conditional: put.conditional,
                    channels: Arc::clone(&put.matrix),
                    channel,
                    linkage: put_linkage.clone(),
                };
                self.receivers[id.index()].register_put(id, registration, payload)?;
            }
        }

        debug!(
            %actor,
            get = ?request.get.as_ref().map(|g| g.matrix.channel_count()),
            put = ?put_side.as_ref().map(|p| p.matrix.channel_count()),
            "operation registered"
        );
        if let Some(record) = self.actors.get_mut(actor.index()) {
            record.op = Some(PendingOp {
                get: request.get,
                put: put_side,
            });
        }
        Ok(())
    }

    /// Check whether the actor's operation can complete now and, if so, commit
    /// the rendezvous and return the actor's share of it.
    pub(crate) fn attempt(&mut self, actor: ActorId) -> Result<Option<Delivery<T>>> {
        let Some(op) = self
            .actors
            .get(actor.index())
            .and_then(|record| record.op.clone())
        else {
            return Ok(None);
        };
        let entry = match (&op.get, &op.put) {
            (Some(get), _) => Entry {
                matrix: &get.matrix,
                side: Side::Get,
                conditional: get.conditional,
            },
            (None, Some(put)) => Entry {
                matrix: &put.matrix,
                side: Side::Put,
                conditional: put.conditional,
            },
            (None, None) => return Ok(None),
        };
        let Some(ready) = ReadinessChecker::new(&self.receivers).check(entry) else {
            return Ok(None);
        };

        self.commit(&ready)?;
        self.take_result(actor).map(Some).ok_or_else(|| {
            RendezvousError::Internal(format!("actor {actor} committed without a delivery"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(receivers: usize, actors: usize) -> DirectorState<i32> {
        let mut state = DirectorState::default();
        for _ in 0..receivers {
            state.add_receiver();
        }
        for i in 0..actors {
            state.register_actor(format!("actor{i}"));
        }
        state
    }

    fn get(matrix: ReceiverMatrix, conditional: bool) -> Request<i32> {
        Request {
            get: Some(OpSide::new(&matrix, conditional)),
            put: None,
        }
    }

    fn put(matrix: ReceiverMatrix, tokens: Vec<i32>) -> Request<i32> {
        Request {
            get: None,
            put: Some((OpSide::new(&matrix, false), PutPayloads::PerChannel(tokens))),
        }
    }

    #[test]
    fn test_register_rejects_bad_shapes() {
        let mut st = state(2, 1);
        let a = ActorId::new(0);
        let (r0, r1) = (ReceiverId::new(0), ReceiverId::new(1));

        let err = st
            .register(a, get(ReceiverMatrix::single(ReceiverId::new(9)), false))
            .unwrap_err();
        assert!(matches!(err, RendezvousError::UnknownReceiver(_)));

        let err = st
            .register(a, get(ReceiverMatrix::new(vec![vec![r0], vec![]]), false))
            .unwrap_err();
        assert!(matches!(err, RendezvousError::EmptyChannel { channel: 1 }));

        let err = st
            .register(a, get(ReceiverMatrix::from_receivers([r0, r0]), false))
            .unwrap_err();
        assert!(matches!(err, RendezvousError::DuplicateReceiver(r) if r == r0));

        let err = st
            .register(a, get(ReceiverMatrix::new(Vec::new()), true))
            .unwrap_err();
        assert!(matches!(err, RendezvousError::EmptyChoice));

        let err = st
            .register(a, put(ReceiverMatrix::from_receivers([r0, r1]), vec![1]))
            .unwrap_err();
        assert!(matches!(
            err,
            RendezvousError::TokenCount {
                expected: 2,
                actual: 1
            }
        ));

        // Nothing was left behind by the failed registrations.
        assert!(st.receivers.iter().all(|r| !r.is_read_blocked() && !r.is_write_blocked()));
    }

    #[test]
    fn test_register_busy_leaves_no_partial_state() {
        let mut st = state(2, 2);
        let (r0, r1) = (ReceiverId::new(0), ReceiverId::new(1));
        st.register(ActorId::new(0), get(ReceiverMatrix::single(r1), false))
            .unwrap();

        let err = st
            .register(
                ActorId::new(1),
                get(ReceiverMatrix::from_receivers([r0, r1]), false),
            )
            .unwrap_err();
        assert!(matches!(err, RendezvousError::Busy { receiver, .. } if receiver == r1));
        assert!(!st.receivers[0].is_read_blocked());
    }

    #[test]
    fn test_attempt_commits_and_delivers() {
        let mut st = state(1, 2);
        let r = ReceiverId::new(0);
        let (getter, putter) = (ActorId::new(0), ActorId::new(1));

        st.register(getter, get(ReceiverMatrix::single(r), false)).unwrap();
        assert!(st.attempt(getter).unwrap().is_none());
        st.thread_blocked(getter);

        st.register(putter, put(ReceiverMatrix::single(r), vec![5])).unwrap();
        let sent = st.attempt(putter).unwrap().unwrap();
        assert_eq!(sent.sent_channel().unwrap(), 0);

        // The getter was unblocked by the commit and its token is waiting.
        assert_eq!(st.blocked, 0);
        assert_eq!(st.actor_status(getter), Some(ActorStatus::Active));
        let received = st.take_result(getter).unwrap();
        assert_eq!(received.into_tokens(&ReceiverMatrix::single(r)).unwrap(), vec![5]);
        assert!(st.receivers[0].phase() == crate::receiver::ReceiverPhase::Idle);
    }

    #[test]
    fn test_deadlock_report_once_per_episode() {
        let mut st = state(2, 2);
        let (a, b) = (ActorId::new(0), ActorId::new(1));
        st.register(a, get(ReceiverMatrix::single(ReceiverId::new(0)), false))
            .unwrap();
        st.thread_blocked(a);
        assert!(st.deadlock_report().is_none());

        st.register(b, get(ReceiverMatrix::single(ReceiverId::new(1)), false))
            .unwrap();
        st.thread_blocked(b);
        let report = st.deadlock_report().unwrap();
        assert_eq!(report.blocked, 2);
        assert_eq!(report.actors[0].reading, vec![ReceiverId::new(0)]);
        assert!(st.deadlock_report().is_none());

        // Leaving the wait starts a new episode.
        st.thread_unblocked(b);
        st.thread_blocked(b);
        assert!(st.deadlock_report().is_some());
    }

    #[test]
    fn test_stop_actor_updates_counts() {
        let mut st = state(1, 2);
        let (a, b) = (ActorId::new(0), ActorId::new(1));
        st.register(a, get(ReceiverMatrix::single(ReceiverId::new(0)), false))
            .unwrap();
        st.thread_blocked(a);

        st.stop_actor(b);
        assert_eq!((st.active, st.blocked), (1, 1));
        assert!(st.all_threads_blocked());

        st.stop_actor(a);
        st.stop_actor(a);
        assert_eq!((st.active, st.blocked), (0, 0));
        assert!(!st.receivers[0].is_read_blocked());
        assert!(st.deadlock_report().is_none());
    }

    #[test]
    fn test_request_finish_clears_receivers() {
        let mut st = state(1, 1);
        let a = ActorId::new(0);
        st.register(a, get(ReceiverMatrix::single(ReceiverId::new(0)), false))
            .unwrap();
        st.request_finish();
        assert!(st.finish_requested);
        assert!(!st.receivers[0].is_read_blocked());
        assert!(st.actors[0].op.is_none());
    }
}
