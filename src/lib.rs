//! # Rendezvous
//!
//! CSP-style synchronous message passing between thread-per-actor processes.
//!
//! Actors never buffer: a token moves only when sender and receiver are both
//! waiting on the same channel endpoint, and then it moves atomically together
//! with every other endpoint the participating operations span.
//!
//! ## Core Concepts
//!
//! - **Receivers**: one synchronization point per channel endpoint, holding at
//!   most one pending get and one pending put
//! - **Receiver matrices**: the channels an operation spans; each channel lists
//!   the receivers it broadcasts to
//! - **All / any**: barrier operations need every channel, choice operations
//!   take the first that can complete
//! - **Composites**: merge and barrier actors get and put in one rendezvous,
//!   forwarding tokens without a delay
//! - **Deadlock detection**: when every active actor is blocked the director
//!   reports it once and leaves the decision to the caller
//!
//! ## Example
//!
//! ```rust,no_run
//! use rendezvous::{Director, DirectorConfig};
//!
//! let director = Director::<u32>::new(DirectorConfig::default());
//! let r = director.add_receiver();
//!
//! let getter = director.spawn("getter", move |actor| actor.get(r)).unwrap();
//! let putter = director.spawn("putter", move |actor| actor.put(r, 5)).unwrap();
//!
//! putter.join().unwrap().unwrap();
//! assert_eq!(getter.join().unwrap().unwrap(), 5);
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod checker;
pub mod director;
pub mod error;
pub mod receiver;

// Re-exports for convenience
pub use director::{
    Actor, ActorHandle, ActorId, ActorStatus, BlockedActor, ChannelReporter, Choice, DeadlockReport,
    DeadlockReporter, Director, DirectorConfig, TracingReporter,
};
pub use error::{RendezvousError, Result};
pub use receiver::{ReceiverFlags, ReceiverId, ReceiverMatrix, ReceiverPhase, Side};
