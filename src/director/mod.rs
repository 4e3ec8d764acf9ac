//! Director: the process-wide rendezvous coordinator.
//!
//! One mutex guards every receiver and the actor registry; one condition
//! variable wakes waiting actors. An actor entering a channel operation:
//!
//! 1. registers its get and/or put on every receiver of the operation,
//! 2. asks the readiness checker whether a consistent rendezvous exists,
//! 3. commits it (hand-off, withdraw losing branches, release participants)
//!    and wakes everybody, or
//! 4. marks itself blocked, checks for a global deadlock, and waits.
//!
//! Woken actors first look for a delivery left for them by somebody else's
//! commit, then for a finish request, then retry the check.

mod actor;
mod commit;
mod config;
mod deadlock;
mod state;

pub use actor::{Actor, ActorHandle, ActorId, ActorStatus, Choice};
pub use config::DirectorConfig;
pub use deadlock::{
    BlockedActor, ChannelReporter, DeadlockReport, DeadlockReporter, TracingReporter,
};

use crate::error::{RendezvousError, Result};
use crate::receiver::{ReceiverFlags, ReceiverId, ReceiverPhase};
use commit::Delivery;
use parking_lot::{Condvar, Mutex, MutexGuard};
use state::{DirectorState, Request};
use std::fmt;
use std::sync::Arc;
use std::thread;
use tracing::debug;

struct Shared<T> {
    state: Mutex<DirectorState<T>>,
    wakeup: Condvar,
    config: DirectorConfig,
    reporter: Box<dyn DeadlockReporter>,
}

/// Coordinator for a network of receivers and the actors that use them.
///
/// Cheap to clone; all clones share the same lock and state.
pub struct Director<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Director<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Director<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Director")
            .field("receivers", &state.receivers.len())
            .field("active", &state.active)
            .field("blocked", &state.blocked)
            .field("finish_requested", &state.finish_requested)
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<T> Default for Director<T> {
    fn default() -> Self {
        Self::new(DirectorConfig::default())
    }
}

impl<T> Director<T> {
    /// Create a director that reports deadlocks through [`TracingReporter`].
    pub fn new(config: DirectorConfig) -> Self {
        Self::with_reporter(config, TracingReporter)
    }

    /// Create a director with a custom deadlock sink.
    pub fn with_reporter(
        config: DirectorConfig,
        reporter: impl DeadlockReporter + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DirectorState::default()),
                wakeup: Condvar::new(),
                config,
                reporter: Box::new(reporter),
            }),
        }
    }

    /// The configuration this director was built with.
    pub fn config(&self) -> &DirectorConfig {
        &self.shared.config
    }

    /// Create a new idle receiver.
    ///
    /// The id is only valid with this director.
    pub fn add_receiver(&self) -> ReceiverId {
        self.shared.state.lock().add_receiver()
    }

    /// Create `count` idle receivers.
    pub fn add_receivers(&self, count: usize) -> Vec<ReceiverId> {
        let mut state = self.shared.state.lock();
        (0..count).map(|_| state.add_receiver()).collect()
    }

    /// Register the calling thread as an actor.
    ///
    /// The actor counts as active until the returned handle is dropped.
    pub fn register_actor(&self, name: impl Into<String>) -> Actor<T> {
        let name = name.into();
        let id = self.shared.state.lock().register_actor(name.clone());
        Actor::new(id, name, self.clone())
    }

    /// Whether a get is pending on `receiver`.
    pub fn is_read_blocked(&self, receiver: ReceiverId) -> bool {
        self.shared
            .state
            .lock()
            .receiver(receiver)
            .is_some_and(|r| r.is_read_blocked())
    }

    /// Whether a put is pending on `receiver`.
    pub fn is_write_blocked(&self, receiver: ReceiverId) -> bool {
        self.shared
            .state
            .lock()
            .receiver(receiver)
            .is_some_and(|r| r.is_write_blocked())
    }

    /// Status flags of `receiver`, or `None` if it does not exist.
    pub fn status(&self, receiver: ReceiverId) -> Option<ReceiverFlags> {
        self.shared.state.lock().receiver(receiver).map(|r| r.flags())
    }

    /// Phase of `receiver`, or `None` if it does not exist.
    pub fn phase(&self, receiver: ReceiverId) -> Option<ReceiverPhase> {
        self.shared.state.lock().receiver(receiver).map(|r| r.phase())
    }

    /// Clear any pending get and put on `receiver`.
    ///
    /// Meant for restarting a network; an actor whose registration is cleared
    /// keeps waiting until a finish is requested.
    pub fn reset(&self, receiver: ReceiverId) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.reset_receiver(receiver)?;
        debug!(%receiver, "receiver reset");
        self.shared.wakeup.notify_all();
        Ok(())
    }

    /// Cancel the run: every waiting actor, and every actor that tries to start
    /// an operation from now on, gets [`RendezvousError::Terminated`].
    pub fn request_finish(&self) {
        self.shared.state.lock().request_finish();
        self.shared.wakeup.notify_all();
    }

    /// Whether a finish has been requested.
    pub fn is_finish_requested(&self) -> bool {
        self.shared.state.lock().finish_requested
    }

    /// Number of actors not yet stopped.
    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active
    }

    /// Number of actors waiting in a channel operation.
    pub fn blocked_count(&self) -> usize {
        self.shared.state.lock().blocked
    }

    /// Whether every active actor is blocked.
    pub fn all_threads_blocked(&self) -> bool {
        self.shared.state.lock().all_threads_blocked()
    }

    /// Lifecycle status of `actor`.
    pub fn actor_status(&self, actor: ActorId) -> Option<ActorStatus> {
        self.shared.state.lock().actor_status(actor)
    }

    pub(crate) fn stop_actor(&self, actor: ActorId) {
        let mut state = self.shared.state.lock();
        state.stop_actor(actor);
        self.detect_deadlock(&mut state);
        self.shared.wakeup.notify_all();
    }

    /// Report a deadlock if every active actor is blocked, at most once per
    /// episode, and finish the run if so configured.
    fn detect_deadlock(&self, state: &mut MutexGuard<'_, DirectorState<T>>) {
        let config = &self.shared.config;
        if !config.report_deadlock && !config.finish_on_deadlock {
            return;
        }
        let Some(report) = state.deadlock_report() else {
            return;
        };
        if config.report_deadlock {
            self.shared.reporter.report(&report);
        }
        if config.finish_on_deadlock {
            state.request_finish();
            self.shared.wakeup.notify_all();
        }
    }
}

impl<T: Send + 'static> Director<T> {
    /// Register an actor and run `body` on a dedicated named thread.
    ///
    /// The actor counts as active from the moment this returns, before the
    /// thread gets scheduled. It stops when `body` returns or unwinds.
    pub fn spawn<F, R>(&self, name: impl Into<String>, body: F) -> Result<ActorHandle<R>>
    where
        F: FnOnce(&Actor<T>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let actor = self.register_actor(name);
        let (id, name) = (actor.id(), actor.name().to_string());
        let handle = thread::Builder::new()
            .name(self.shared.config.thread_name(&name))
            .spawn(move || body(&actor))?;
        debug!(actor = %id, %name, "actor thread spawned");
        Ok(ActorHandle::new(id, name, handle))
    }
}

impl<T: Clone> Director<T> {
    /// Run one channel operation for `actor`, blocking until it commits or a
    /// finish is requested.
    pub(crate) fn perform(&self, actor: ActorId, request: Request<T>) -> Result<Delivery<T>> {
        let mut state = self.shared.state.lock();
        if state.finish_requested {
            return Err(RendezvousError::Terminated);
        }
        state.register(actor, request)?;
        // New registrations can complete somebody else's rendezvous.
        self.shared.wakeup.notify_all();

        let mut blocked = false;
        loop {
            if let Some(delivery) = state.take_result(actor) {
                state.thread_unblocked(actor);
                debug!(%actor, "woken by commit");
                return Ok(delivery);
            }
            if state.finish_requested {
                state.abandon(actor);
                state.thread_unblocked(actor);
                debug!(%actor, "terminated while waiting");
                return Err(RendezvousError::Terminated);
            }
            match state.attempt(actor) {
                Ok(Some(delivery)) => {
                    state.thread_unblocked(actor);
                    self.shared.wakeup.notify_all();
                    return Ok(delivery);
                }
                Ok(None) => {}
                Err(err) => {
                    state.abandon(actor);
                    state.thread_unblocked(actor);
                    self.shared.wakeup.notify_all();
                    return Err(err);
                }
            }
            if !blocked {
                blocked = true;
                state.thread_blocked(actor);
                self.detect_deadlock(&mut state);
                if state.finish_requested {
                    continue;
                }
            }
            self.shared.wakeup.wait(&mut state);
        }
    }
}
