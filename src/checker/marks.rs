//! Working sets of the readiness check, with an undo trail.

use crate::receiver::ReceiverId;

/// Where a receiver stands in the current check.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Mark {
    Unvisited,
    /// On the current DFS path.
    BeingChecked,
    Ready,
    NotReady,
}

/// Restore point for [`Marks::rollback`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct Checkpoint {
    trail: usize,
    ready: usize,
}

/// Marks indexed by receiver, plus the ready list in the order receivers were
/// confirmed.
#[derive(Debug)]
pub(crate) struct Marks {
    marks: Vec<Mark>,
    trail: Vec<(ReceiverId, Mark)>,
    ready: Vec<ReceiverId>,
}

impl Marks {
    pub(crate) fn new(receiver_count: usize) -> Self {
        Self {
            marks: vec![Mark::Unvisited; receiver_count],
            trail: Vec::new(),
            ready: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: ReceiverId) -> Mark {
        self.marks[id.index()]
    }

    pub(crate) fn set(&mut self, id: ReceiverId, mark: Mark) {
        let previous = std::mem::replace(&mut self.marks[id.index()], mark);
        self.trail.push((id, previous));
        if mark == Mark::Ready {
            self.ready.push(id);
        }
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            trail: self.trail.len(),
            ready: self.ready.len(),
        }
    }

    /// Undo every mark set since `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.trail.len() > checkpoint.trail {
            if let Some((id, previous)) = self.trail.pop() {
                self.marks[id.index()] = previous;
            }
        }
        self.ready.truncate(checkpoint.ready);
    }

    pub(crate) fn ready(&self) -> &[ReceiverId] {
        &self.ready
    }

    pub(crate) fn into_ready(self) -> Vec<ReceiverId> {
        self.ready
    }
}
