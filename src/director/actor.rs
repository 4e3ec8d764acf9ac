//! Actors: the threads that take part in rendezvous.
//!
//! An [`Actor`] is the identity of one thread inside a director. Every channel
//! operation goes through it, and dropping it tells the director the thread is
//! gone. Actors spawned with [`Director::spawn`] run on a dedicated, named OS
//! thread.

use super::commit::Delivery;
use super::state::{OpSide, PutPayloads, Request};
use super::Director;
use crate::error::{RendezvousError, Result};
use crate::receiver::{ReceiverId, ReceiverMatrix};
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::thread::JoinHandle;

/// Identifier of an actor registered with a director.
///
/// A ticket handed out at registration, used to key blocked-thread bookkeeping
/// and results. Never a thread handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ActorId(pub(crate) usize);

impl ActorId {
    /// Create an actor id from a raw registry index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw registry index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// Lifecycle of a registered actor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ActorStatus {
    /// Running, or inside a channel operation that has not had to wait.
    Active,
    /// Waiting in a channel operation for a partner.
    Blocked,
    /// The actor has been dropped.
    Stopped,
}

/// The token chosen by a first-ready-wins get.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Choice<T> {
    /// Index of the channel that was selected.
    pub channel: usize,
    /// The receiver the token was taken from (first receiver of the channel).
    pub receiver: ReceiverId,
    /// The token.
    pub token: T,
}

/// One actor's handle on the director.
///
/// `Send` so it can move onto the actor's thread, but not `Sync`: one actor
/// waits in at most one operation at a time.
pub struct Actor<T> {
    id: ActorId,
    name: String,
    director: Director<T>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> fmt::Debug for Actor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T> Actor<T> {
    pub(crate) const fn new(id: ActorId, name: String, director: Director<T>) -> Self {
        Self {
            id,
            name,
            director,
            _not_sync: PhantomData,
        }
    }

    /// This actor's id.
    pub const fn id(&self) -> ActorId {
        self.id
    }

    /// This actor's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The director this actor belongs to.
    pub const fn director(&self) -> &Director<T> {
        &self.director
    }
}

impl<T: Clone + Send + 'static> Actor<T> {
    fn perform(&self, request: Request<T>) -> Result<Delivery<T>> {
        self.director.perform(self.id, request)
    }

    /// Receive one token from `receiver`, blocking until a sender meets us.
    pub fn get(&self, receiver: ReceiverId) -> Result<T> {
        let matrix = ReceiverMatrix::single(receiver);
        let request = Request {
            get: Some(OpSide::new(&matrix, false)),
            put: None,
        };
        Ok(self.perform(request)?.into_choice(&matrix)?.token)
    }

    /// Send `token` to `receiver`, blocking until a receiver meets us.
    pub fn put(&self, receiver: ReceiverId, token: T) -> Result<()> {
        let matrix = ReceiverMatrix::single(receiver);
        let request = Request {
            get: None,
            put: Some((OpSide::new(&matrix, false), PutPayloads::PerChannel(vec![token]))),
        };
        self.perform(request).map(drop)
    }

    /// Receive one token from every channel of `matrix` in a single rendezvous.
    ///
    /// Returns the tokens by channel.
    pub fn get_from_all(&self, matrix: &ReceiverMatrix) -> Result<Vec<T>> {
        if matrix.is_empty() {
            return Ok(Vec::new());
        }
        let request = Request {
            get: Some(OpSide::new(matrix, false)),
            put: None,
        };
        self.perform(request)?.into_tokens(matrix)
    }

    /// Send `tokens[i]` to every receiver of channel `i`, all in one rendezvous.
    pub fn put_to_all(&self, matrix: &ReceiverMatrix, tokens: Vec<T>) -> Result<()> {
        if tokens.len() != matrix.channel_count() {
            return Err(RendezvousError::TokenCount {
                expected: matrix.channel_count(),
                actual: tokens.len(),
            });
        }
        if matrix.is_empty() {
            return Ok(());
        }
        let request = Request {
            get: None,
            put: Some((OpSide::new(matrix, false), PutPayloads::PerChannel(tokens))),
        };
        self.perform(request).map(drop)
    }

    /// Receive from whichever channel of `matrix` is ready first.
    pub fn get_from_any(&self, matrix: &ReceiverMatrix) -> Result<Choice<T>> {
        let request = Request {
            get: Some(OpSide::new(matrix, true)),
            put: None,
        };
        self.perform(request)?.into_choice(matrix)
    }

    /// Send `token` to whichever channel of `matrix` is ready first.
    ///
    /// Returns the index of the channel that took it.
    pub fn put_to_any(&self, token: T, matrix: &ReceiverMatrix) -> Result<usize> {
        let request = Request {
            get: None,
            put: Some((OpSide::new(matrix, true), PutPayloads::Same(token))),
        };
        self.perform(request)?.sent_channel()
    }

    /// Merge: receive from whichever channel of `get` is ready first and, in
    /// the same rendezvous, pass that token to every channel of `put`.
    pub fn get_from_any_put_to_all(
        &self,
        get: &ReceiverMatrix,
        put: &ReceiverMatrix,
    ) -> Result<Choice<T>> {
        let request = Request {
            get: Some(OpSide::new(get, true)),
            put: (!put.is_empty())
                .then(|| (OpSide::new(put, false), PutPayloads::Forward { any: true })),
        };
        self.perform(request)?.into_choice(get)
    }

    /// Barrier: receive from every channel of `get` and, in the same
    /// rendezvous, pass channel `i`'s token to channel `i` of `put`.
    pub fn get_from_all_put_to_all(
        &self,
        get: &ReceiverMatrix,
        put: &ReceiverMatrix,
    ) -> Result<Vec<T>> {
        if get.channel_count() != put.channel_count() {
            return Err(RendezvousError::ChannelCount {
                get: get.channel_count(),
                put: put.channel_count(),
            });
        }
        if get.is_empty() {
            return Ok(Vec::new());
        }
        let request = Request {
            get: Some(OpSide::new(get, false)),
            put: Some((OpSide::new(put, false), PutPayloads::Forward { any: false })),
        };
        self.perform(request)?.into_tokens(get)
    }
}

impl<T> Drop for Actor<T> {
    fn drop(&mut self) {
        self.director.stop_actor(self.id);
    }
}

/// Handle to an actor running on its own thread.
#[derive(Debug)]
pub struct ActorHandle<R> {
    id: ActorId,
    name: String,
    handle: JoinHandle<R>,
}

impl<R> ActorHandle<R> {
    pub(crate) const fn new(id: ActorId, name: String, handle: JoinHandle<R>) -> Self {
        Self { id, name, handle }
    }

    /// The actor's id.
    pub const fn id(&self) -> ActorId {
        self.id
    }

    /// The actor's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the actor's thread has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the actor's thread and return what its body returned.
    pub fn join(self) -> std::thread::Result<R> {
        self.handle.join()
    }
}
