//! Deadlock reports and the sinks that receive them.
//!
//! A deadlock is an expected terminal state, not an error: every active actor
//! is blocked in a channel operation and none of them can make progress. The
//! director reports it once per episode and leaves the actors blocked unless
//! configured to finish.

use super::actor::ActorId;
use crate::receiver::ReceiverId;
use crossbeam_channel::Sender;
use std::fmt;
use tracing::warn;

/// An actor that was blocked when the deadlock was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedActor {
    /// Actor id.
    pub id: ActorId,
    /// Actor name.
    pub name: String,
    /// Receivers the actor is waiting to get from.
    pub reading: Vec<ReceiverId>,
    /// Receivers the actor is waiting to put to.
    pub writing: Vec<ReceiverId>,
}

/// Snapshot taken when every active actor is blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockReport {
    /// Actors not yet stopped.
    pub active: usize,
    /// Actors blocked in a channel operation.
    pub blocked: usize,
    /// What each blocked actor is waiting on.
    pub actors: Vec<BlockedActor>,
}

fn write_ids(f: &mut fmt::Formatter<'_>, ids: &[ReceiverId]) -> fmt::Result {
    f.write_str("[")?;
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{id}")?;
    }
    f.write_str("]")
}

impl fmt::Display for DeadlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deadlock: {} of {} active actors blocked",
            self.blocked, self.active
        )?;
        for actor in &self.actors {
            write!(f, "\n  {} ({})", actor.name, actor.id)?;
            if !actor.reading.is_empty() {
                f.write_str(" reading ")?;
                write_ids(f, &actor.reading)?;
            }
            if !actor.writing.is_empty() {
                f.write_str(" writing ")?;
                write_ids(f, &actor.writing)?;
            }
        }
        Ok(())
    }
}

/// Sink for deadlock reports.
///
/// Called with the director lock held; implementations must not call back into
/// the director.
pub trait DeadlockReporter: Send + Sync {
    /// Receive one report.
    fn report(&self, report: &DeadlockReport);
}

/// Logs reports at `warn` level. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl DeadlockReporter for TracingReporter {
    fn report(&self, report: &DeadlockReport) {
        warn!(
            active = report.active,
            blocked = report.blocked,
            "{report}"
        );
    }
}

/// Forwards reports over a channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: Sender<DeadlockReport>,
}

impl ChannelReporter {
    /// Create a reporter that sends to `sender`.
    pub const fn new(sender: Sender<DeadlockReport>) -> Self {
        Self { sender }
    }
}

impl DeadlockReporter for ChannelReporter {
    fn report(&self, report: &DeadlockReport) {
        // Nobody listening is fine.
        let _ = self.sender.try_send(report.clone());
    }
}

impl<F> DeadlockReporter for F
where
    F: Fn(&DeadlockReport) + Send + Sync,
{
    fn report(&self, report: &DeadlockReport) {
        self(report);
    }
}
