//! Atomic commit of a ready set.
//!
//! Runs with the director lock held, so no actor can observe a partial
//! hand-off. Receivers are consumed in dependency order: a composite's output
//! receivers come after the inputs whose tokens they forward.

use super::actor::{ActorId, ActorStatus, Choice};
use super::state::DirectorState;
use crate::checker::dependency_order;
use crate::error::{RendezvousError, Result};
use crate::receiver::{Linkage, Payload, ReceiverId, ReceiverMatrix, Side};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error};

/// A token handed to a getter through one receiver.
#[derive(Clone, Debug)]
pub(crate) struct Handoff<T> {
    pub receiver: ReceiverId,
    pub channel: usize,
    pub token: T,
}

/// One actor's share of a commit.
#[derive(Debug)]
pub(crate) struct Delivery<T> {
    /// Tokens received on the get side.
    pub received: Vec<Handoff<T>>,
    /// `(receiver, channel)` pairs consumed on the put side.
    pub sent: Vec<(ReceiverId, usize)>,
}

impl<T> Default for Delivery<T> {
    fn default() -> Self {
        Self {
            received: Vec::new(),
            sent: Vec::new(),
        }
    }
}

fn missing(what: &str) -> RendezvousError {
    let err = RendezvousError::Internal(format!("commit delivered no {what}"));
    error!(%err, "incomplete delivery");
    err
}

impl<T> Delivery<T> {
    /// One token per channel of `matrix`, taken from the first receiver of
    /// each channel.
    pub(crate) fn into_tokens(self, matrix: &ReceiverMatrix) -> Result<Vec<T>> {
        let mut by_receiver: HashMap<ReceiverId, T> = self
            .received
            .into_iter()
            .map(|handoff| (handoff.receiver, handoff.token))
            .collect();
        matrix
            .channels()
            .map(|channel| {
                channel
                    .first()
                    .and_then(|first| by_receiver.remove(first))
                    .ok_or_else(|| missing("token for a channel"))
            })
            .collect()
    }

    /// The selected channel of a conditional get and its token.
    pub(crate) fn into_choice(self, matrix: &ReceiverMatrix) -> Result<Choice<T>> {
        let channel = self
            .received
            .first()
            .map(|handoff| handoff.channel)
            .ok_or_else(|| missing("token"))?;
        let first = matrix.channel(channel).first().copied();
        let mut received = self.received;
        let index = received
            .iter()
            .position(|handoff| Some(handoff.receiver) == first)
            .unwrap_or(0);
        let handoff = received.swap_remove(index);
        Ok(Choice {
            channel,
            receiver: handoff.receiver,
            token: handoff.token,
        })
    }

    /// The channel a put went out on.
    pub(crate) fn sent_channel(&self) -> Result<usize> {
        self.sent
            .first()
            .map(|&(_, channel)| channel)
            .ok_or_else(|| missing("put"))
    }
}

fn invariant(message: String) -> RendezvousError {
    let err = RendezvousError::Internal(message);
    error!(%err, "commit aborted");
    err
}

impl<T> DirectorState<T> {
    /// Check that every receiver of `order` can be consumed and every forward
    /// has its source before any of them is touched.
    fn validate_commit(&self, order: &[ReceiverId]) -> Result<()> {
        // (composite, input channel) pairs filled so far.
        let mut filled: HashSet<(ActorId, usize)> = HashSet::new();
        for &id in order {
            let receiver = self
                .receivers
                .get(id.index())
                .ok_or_else(|| invariant(format!("receiver {id} missing at commit")))?;
            let (Some(get), Some(put), Some(payload)) = (
                receiver.registration(Side::Get),
                receiver.registration(Side::Put),
                receiver.payload(),
            ) else {
                return Err(invariant(format!("receiver {id} not ready at commit")));
            };
            if let Payload::Forward(selector) = payload {
                let sourced = match selector {
                    Some(channel) => filled.contains(&(put.actor, *channel)),
                    None => filled.iter().any(|&(actor, _)| actor == put.actor),
                };
                if !sourced {
                    return Err(invariant(format!(
                        "nothing to forward through {id} for actor {}",
                        put.actor
                    )));
                }
            }
            if get.linkage.is_symmetric() {
                filled.insert((get.actor, get.channel));
            }
        }
        Ok(())
    }
}

impl<T: Clone> DirectorState<T> {
    /// Consume every receiver of `ready`, hand tokens to the getters, and
    /// release all participating actors.
    ///
    /// Either the whole set commits or nothing is touched.
    pub(crate) fn commit(&mut self, ready: &[ReceiverId]) -> Result<()> {
        let order = dependency_order(&self.receivers, ready).map_err(|cycle| {
            invariant(format!("no receiver without dependencies among {cycle:?}"))
        })?;
        self.validate_commit(&order)?;

        // Tokens received by composites, by input channel.
        let mut forwarded: HashMap<ActorId, Vec<Option<T>>> = HashMap::new();
        let mut participants: HashSet<ActorId> = HashSet::new();

        for id in order {
            let (get, put, payload) = self.receivers[id.index()]
                .take()
                .ok_or_else(|| invariant(format!("receiver {id} not ready at commit")))?;

            let token = match payload {
                Payload::Token(token) => token,
                Payload::Forward(selector) => {
                    let inputs = forwarded.get(&put.actor).map_or(&[][..], Vec::as_slice);
                    let token = match selector {
                        Some(channel) => inputs.get(channel).cloned().flatten(),
                        None => inputs.iter().flatten().next().cloned(),
                    };
                    token.ok_or_else(|| {
                        invariant(format!(
                            "nothing to forward through {id} for actor {}",
                            put.actor
                        ))
                    })?
                }
            };

            if let Linkage::Symmetric { .. } = get.linkage {
                let slots = forwarded
                    .entry(get.actor)
                    .or_insert_with(|| vec![None; get.channels.channel_count()]);
                if let Some(slot) = slots.get_mut(get.channel) {
                    slot.get_or_insert_with(|| token.clone());
                }
            }

            self.results
                .entry(put.actor)
                .or_default()
                .sent
                .push((id, put.channel));
            self.results
                .entry(get.actor)
                .or_default()
                .received
                .push(Handoff {
                    receiver: id,
                    channel: get.channel,
                    token,
                });
            participants.insert(get.actor);
            participants.insert(put.actor);
        }

        // Losing branches of conditional operations go back to idle.
        for &actor in &participants {
            self.withdraw(actor);
            if let Some(record) = self.actors.get_mut(actor.index()) {
                if record.status == ActorStatus::Blocked {
                    record.status = ActorStatus::Active;
                    self.blocked -= 1;
                }
            }
        }
        self.deadlock_reported = false;

        debug!(
            receivers = ready.len(),
            actors = participants.len(),
            "rendezvous committed"
        );
        Ok(())
    }
}
