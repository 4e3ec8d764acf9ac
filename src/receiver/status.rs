//! Receiver status as seen by schedulers and tests.

use bitflags::bitflags;
use std::fmt;

/// Where a receiver stands in the rendezvous protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ReceiverPhase {
    /// No pending get or put.
    Idle,
    /// A get is pending, no put yet.
    WaitingGet,
    /// A put is pending, no get yet.
    WaitingPut,
    /// Both sides are pending. Locally ready; the readiness check decides
    /// whether the rendezvous can actually commit.
    Ready,
}

impl ReceiverPhase {
    /// Phase from the two pending sides.
    pub const fn from_pending(get: bool, put: bool) -> Self {
        match (get, put) {
            (false, false) => Self::Idle,
            (true, false) => Self::WaitingGet,
            (false, true) => Self::WaitingPut,
            (true, true) => Self::Ready,
        }
    }
}

bitflags! {
    /// Snapshot of a receiver's pending state.
    ///
    /// # Example
    /// ```
    /// use rendezvous::ReceiverFlags;
    /// let flags = ReceiverFlags::READ_BLOCKED | ReceiverFlags::GET_CONDITIONAL;
    /// assert!(flags.contains(ReceiverFlags::READ_BLOCKED));
    /// ```
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReceiverFlags: u8 {
        /// A get is pending.
        const READ_BLOCKED = 0b0000_0001;
        /// A put is pending.
        const WRITE_BLOCKED = 0b0000_0010;
        /// The pending get is a first-ready-wins choice.
        const GET_CONDITIONAL = 0b0000_0100;
        /// The pending put is a first-ready-wins choice.
        const PUT_CONDITIONAL = 0b0000_1000;
        /// One of the pending sides belongs to a composite (merge/barrier) operation.
        const SYMMETRIC = 0b0001_0000;
    }
}

impl fmt::Debug for ReceiverFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

impl ReceiverFlags {
    /// The phase implied by the blocked bits.
    pub const fn phase(self) -> ReceiverPhase {
        ReceiverPhase::from_pending(
            self.contains(Self::READ_BLOCKED),
            self.contains(Self::WRITE_BLOCKED),
        )
    }
}
