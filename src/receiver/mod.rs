//! Receivers: one synchronization point per channel endpoint.
//!
//! - **`ReceiverId`**: arena index handed out by the director
//! - **`ReceiverMatrix`**: channel → receivers, the shape of a multi-channel operation
//! - **`Receiver`**: pending get/put state, staged token, links to the rest of
//!   the operation
//!
//! Receivers hold no lock of their own. The director's lock guards every field.

mod endpoint;
mod matrix;
mod status;

pub use endpoint::Side;
pub use matrix::{ReceiverId, ReceiverMatrix};
pub use status::{ReceiverFlags, ReceiverPhase};

pub(crate) use endpoint::{Linkage, Payload, Receiver, Registration};
