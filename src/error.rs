//! Error types for the rendezvous engine.

use crate::director::ActorId;
use crate::receiver::{ReceiverId, Side};
use std::io;
use thiserror::Error;

/// Result type alias for rendezvous operations.
pub type Result<T> = std::result::Result<T, RendezvousError>;

/// Errors returned by channel operations and director calls.
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// A finish was requested while the actor was blocked or about to block.
    ///
    /// This is the normal shutdown path. The operation did not complete and must
    /// not be retried.
    #[error("actor terminated: finish requested")]
    Terminated,

    /// The receiver does not belong to this director.
    #[error("unknown receiver {0}")]
    UnknownReceiver(ReceiverId),

    /// A channel of the matrix has no receivers.
    #[error("channel {channel} has no receivers")]
    EmptyChannel {
        /// Index of the empty channel.
        channel: usize,
    },

    /// The same receiver appears twice in one operation.
    #[error("receiver {0} appears more than once in the operation")]
    DuplicateReceiver(ReceiverId),

    /// A first-ready-wins operation was given no channels to choose from.
    #[error("conditional operation has no channels to choose from")]
    EmptyChoice,

    /// The number of tokens does not match the number of channels.
    #[error("expected {expected} tokens (one per channel), got {actual}")]
    TokenCount {
        /// Number of channels in the matrix.
        expected: usize,
        /// Number of tokens supplied.
        actual: usize,
    },

    /// A barrier operation needs as many output channels as input channels.
    #[error("channel count mismatch: {get} input channels, {put} output channels")]
    ChannelCount {
        /// Input channel count.
        get: usize,
        /// Output channel count.
        put: usize,
    },

    /// A get or put is already registered on the receiver by another actor.
    #[error("receiver {receiver} already has a pending {side} from actor {holder}")]
    Busy {
        /// The contended receiver.
        receiver: ReceiverId,
        /// Which side is taken.
        side: Side,
        /// The actor holding the registration.
        holder: ActorId,
    },

    /// An engine invariant was violated. Not recoverable.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// The OS refused to spawn an actor thread.
    #[error("failed to spawn actor thread: {0}")]
    Spawn(#[from] io::Error),
}

impl RendezvousError {
    /// Whether this is the cooperative-shutdown signal rather than a failure.
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}
