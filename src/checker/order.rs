//! Commit order for a ready set.
//!
//! A composite put receiver takes its token from the composite's get side, so
//! it depends on every ready receiver of its partner matrix. Kahn's algorithm
//! over those edges gives the hand-off order; receivers left over form a
//! zero-delay cycle.

use crate::receiver::{Linkage, Receiver, ReceiverId, Side};
use std::collections::{HashMap, HashSet, VecDeque};

/// Order `ready` so every receiver comes after the receivers its token depends on.
///
/// On failure returns the receivers that could not be ordered (the cycle and
/// everything downstream of it).
pub(crate) fn dependency_order<T>(
    receivers: &[Receiver<T>],
    ready: &[ReceiverId],
) -> Result<Vec<ReceiverId>, Vec<ReceiverId>> {
    let members: HashSet<ReceiverId> = ready.iter().copied().collect();
    let mut in_degree: HashMap<ReceiverId, usize> = HashMap::with_capacity(ready.len());
    let mut dependents: HashMap<ReceiverId, Vec<ReceiverId>> = HashMap::new();

    for &id in ready {
        let mut degree = 0;
        let put = receivers
            .get(id.index())
            .and_then(|r| r.registration(Side::Put));
        if let Some(Linkage::Symmetric { partner, .. }) = put.map(|p| &p.linkage) {
            for (_, source) in partner.iter().filter(|(_, s)| members.contains(s)) {
                degree += 1;
                dependents.entry(source).or_default().push(id);
            }
        }
        in_degree.insert(id, degree);
    }

    let mut queue: VecDeque<ReceiverId> = ready
        .iter()
        .copied()
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(ready.len());

    while let Some(id) = queue.pop_front() {
        order.push(id);
        for &next in dependents.get(&id).map_or(&[][..], Vec::as_slice) {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    if order.len() == ready.len() {
        Ok(order)
    } else {
        let placed: HashSet<ReceiverId> = order.into_iter().collect();
        Err(ready.iter().copied().filter(|id| !placed.contains(id)).collect())
    }
}

/// Whether the symmetric links among `ready` contain a cycle.
pub(crate) fn has_zero_delay_cycle<T>(receivers: &[Receiver<T>], ready: &[ReceiverId]) -> bool {
    dependency_order(receivers, ready).is_err()
}
