//! Receiver identifiers and the channel matrix passed to multi-channel operations.

use std::fmt;

/// Identifier of a receiver (one channel endpoint) owned by a director.
///
/// Receivers live in an arena inside the director; the id is an index into it.
/// An id only means something to the director that created it. Every director
/// numbers its receivers from zero, so an id from another director is either
/// rejected as unknown or names an unrelated receiver.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ReceiverId(pub(crate) usize);

impl ReceiverId {
    /// Create a receiver id from a raw arena index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw arena index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Receivers grouped by channel: `channels[i]` lists the receivers of channel `i`.
///
/// On the put side every receiver of a channel gets a copy of that channel's
/// token. On the get side a channel is ready only when all of its receivers are,
/// and the token of its first receiver is the one reported.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ReceiverMatrix {
    channels: Vec<Vec<ReceiverId>>,
}

impl ReceiverMatrix {
    /// Create a matrix from explicit channels.
    pub const fn new(channels: Vec<Vec<ReceiverId>>) -> Self {
        Self { channels }
    }

    /// A matrix with one channel holding one receiver.
    pub fn single(receiver: ReceiverId) -> Self {
        Self {
            channels: vec![vec![receiver]],
        }
    }

    /// One channel per receiver, in iteration order.
    pub fn from_receivers(receivers: impl IntoIterator<Item = ReceiverId>) -> Self {
        Self {
            channels: receivers.into_iter().map(|r| vec![r]).collect(),
        }
    }

    /// Number of channels.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether the matrix has no channels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Receivers of channel `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[inline]
    pub fn channel(&self, index: usize) -> &[ReceiverId] {
        &self.channels[index]
    }

    /// Iterate over the channels.
    pub fn channels(&self) -> impl Iterator<Item = &[ReceiverId]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Iterate over `(channel, receiver)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, ReceiverId)> + '_ {
        self.channels
            .iter()
            .enumerate()
            .flat_map(|(channel, receivers)| receivers.iter().map(move |&r| (channel, r)))
    }

    /// Whether `receiver` is part of this matrix.
    pub fn contains(&self, receiver: ReceiverId) -> bool {
        self.channel_of(receiver).is_some()
    }

    /// The channel holding `receiver`, if any.
    pub fn channel_of(&self, receiver: ReceiverId) -> Option<usize> {
        self.iter().find(|&(_, r)| r == receiver).map(|(c, _)| c)
    }
}

impl From<Vec<Vec<ReceiverId>>> for ReceiverMatrix {
    fn from(channels: Vec<Vec<ReceiverId>>) -> Self {
        Self::new(channels)
    }
}
