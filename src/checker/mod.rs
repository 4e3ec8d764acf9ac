//! Readiness Checker: can a consistent rendezvous commit right now?
//!
//! Starting from one side of the calling operation, the checker walks the
//! receiver network depth-first. A receiver is ready when both of its sides are
//! pending and everything those sides depend on is ready too:
//!
//! - the **far side**: the other operation on the channel, which may span more
//!   channels (`get_from_all`, `put_to_all`, ...)
//! - the **symmetric partner**: for composite (merge/barrier) operations, the
//!   matrix on the other side of the same composite
//!
//! "All" matrices need every channel ready. "Any" matrices need one channel, and
//! once a channel of a matrix is selected no other channel of it may be. A
//! branch that fails is rolled back before the next one is tried, so the ready
//! list at the end is exactly the set of receivers to commit.
//!
//! Candidates whose symmetric links form a loop (a composite feeding itself
//! with no actor in between) are never ready.
//!
//! The checker never fails; anything unresolved is simply "not ready".

mod marks;
mod order;

#[cfg(test)]
pub(crate) mod fixture;

pub(crate) use order::dependency_order;

use crate::receiver::{Linkage, Receiver, ReceiverId, ReceiverMatrix, Side};
use marks::{Mark, Marks};
use order::has_zero_delay_cycle;
use tracing::trace;

/// The side of the calling operation the check starts from.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Entry<'m> {
    pub matrix: &'m ReceiverMatrix,
    pub side: Side,
    pub conditional: bool,
}

/// How the walk reached a matrix.
#[derive(Clone, Copy, Debug)]
struct Arrival {
    /// Side of the operation that owns the matrix.
    side: Side,
    /// Reached through a composite's symmetric link rather than across a channel.
    symmetric: bool,
}

/// One run of the readiness check over a snapshot of the receivers.
pub(crate) struct ReadinessChecker<'a, T> {
    receivers: &'a [Receiver<T>],
    marks: Marks,
}

impl<'a, T> ReadinessChecker<'a, T> {
    pub(crate) fn new(receivers: &'a [Receiver<T>]) -> Self {
        Self {
            receivers,
            marks: Marks::new(receivers.len()),
        }
    }

    /// Run the check. Returns the receivers to commit, in confirmation order.
    pub(crate) fn check(mut self, entry: Entry<'_>) -> Option<Vec<ReceiverId>> {
        let arrival = Arrival {
            side: entry.side,
            symmetric: false,
        };
        if !self.check_matrix(entry.matrix, arrival, entry.conditional, None) {
            return None;
        }
        if has_zero_delay_cycle(self.receivers, self.marks.ready()) {
            trace!(ready = ?self.marks.ready(), "rejecting candidate with zero-delay cycle");
            return None;
        }
        Some(self.marks.into_ready())
    }

    /// Check a matrix. `via` is the receiver of `matrix` the walk crossed a
    /// channel from, if any; a conditional matrix may then only pick its channel.
    fn check_matrix(
        &mut self,
        matrix: &ReceiverMatrix,
        arrival: Arrival,
        conditional: bool,
        via: Option<ReceiverId>,
    ) -> bool {
        if !conditional {
            return matrix
                .channels()
                .all(|channel| self.check_channel(channel, arrival));
        }

        let via_channel = via
            .and_then(|r| self.receivers.get(r.index()))
            .and_then(|r| r.registration(arrival.side))
            .map(|registration| registration.channel);
        let selected = self.selected_channels(matrix);

        let channel = match (via_channel, selected.as_slice()) {
            (_, [_, _, ..]) => {
                trace!(?selected, "conditional matrix has several branches selected");
                return false;
            }
            (Some(wanted), [chosen]) if wanted != *chosen => {
                trace!(wanted, chosen, "branch already selected");
                return false;
            }
            (Some(wanted), _) => wanted,
            (None, [chosen]) => *chosen,
            (None, []) => return self.try_branches(matrix, arrival),
        };
        self.check_channel(matrix.channel(channel), arrival)
    }

    /// No branch selected yet: take the first channel that resolves.
    fn try_branches(&mut self, matrix: &ReceiverMatrix, arrival: Arrival) -> bool {
        for (index, channel) in matrix.channels().enumerate() {
            let checkpoint = self.marks.checkpoint();
            if self.check_channel(channel, arrival)
                && !has_zero_delay_cycle(self.receivers, self.marks.ready())
            {
                trace!(branch = index, "conditional branch selected");
                return true;
            }
            trace!(branch = index, "conditional branch rolled back");
            self.marks.rollback(checkpoint);
        }
        false
    }

    /// Channels of `matrix` that already hold a confirmed or in-progress receiver.
    fn selected_channels(&self, matrix: &ReceiverMatrix) -> Vec<usize> {
        matrix
            .channels()
            .enumerate()
            .filter(|(_, receivers)| {
                receivers.iter().any(|&r| {
                    matches!(self.marks.get(r), Mark::BeingChecked | Mark::Ready)
                })
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn check_channel(&mut self, channel: &[ReceiverId], arrival: Arrival) -> bool {
        channel.iter().all(|&r| self.check_receiver(r, arrival))
    }

    fn check_receiver(&mut self, id: ReceiverId, arrival: Arrival) -> bool {
        match self.marks.get(id) {
            // Either confirmed, or an ancestor on the current path that will be.
            Mark::Ready | Mark::BeingChecked => return true,
            Mark::NotReady => return false,
            Mark::Unvisited => {}
        }

        let receivers = self.receivers;
        let Some(receiver) = receivers.get(id.index()) else {
            return false;
        };
        if !receiver.is_ready() {
            self.marks.set(id, Mark::NotReady);
            return false;
        }

        self.marks.set(id, Mark::BeingChecked);
        let ready = self.explore(id, receiver, arrival);
        self.marks
            .set(id, if ready { Mark::Ready } else { Mark::NotReady });
        ready
    }

    /// Check what a locally ready receiver depends on.
    fn explore(&mut self, id: ReceiverId, receiver: &'a Receiver<T>, arrival: Arrival) -> bool {
        let (Some(get), Some(put)) = (
            receiver.registration(Side::Get),
            receiver.registration(Side::Put),
        ) else {
            return false;
        };

        for (side, registration) in [(Side::Get, get), (Side::Put, put)] {
            let Linkage::Symmetric {
                partner,
                conditional,
            } = &registration.linkage
            else {
                continue;
            };
            // Don't walk back into the composite we came from.
            if arrival.symmetric && arrival.side == side {
                continue;
            }
            let partner_arrival = Arrival {
                side: side.opposite(),
                symmetric: true,
            };
            if !self.check_matrix(partner, partner_arrival, *conditional, None) {
                return false;
            }
        }

        let far = match arrival.side {
            Side::Get => put,
            Side::Put => get,
        };
        let far_arrival = Arrival {
            side: arrival.side.opposite(),
            symmetric: false,
        };
        self.check_matrix(&far.channels, far_arrival, far.conditional, Some(id))
    }
}
