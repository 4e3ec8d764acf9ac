//! Hand-built receiver networks for checker tests.

use super::{Entry, ReadinessChecker};
use crate::director::ActorId;
use crate::receiver::{Linkage, Payload, Receiver, ReceiverId, ReceiverMatrix, Registration, Side};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct Network<T> {
    pub receivers: Vec<Receiver<T>>,
    gets: HashMap<usize, (Arc<ReceiverMatrix>, bool)>,
    puts: HashMap<usize, Arc<ReceiverMatrix>>,
}

impl<T: Clone> Network<T> {
    pub fn new(receiver_count: usize) -> Self {
        Self {
            receivers: (0..receiver_count).map(|_| Receiver::new()).collect(),
            gets: HashMap::new(),
            puts: HashMap::new(),
        }
    }

    pub fn id(&self, index: usize) -> ReceiverId {
        assert!(index < self.receivers.len());
        ReceiverId::new(index)
    }

    pub fn ids(&self) -> Vec<ReceiverId> {
        (0..self.receivers.len()).map(ReceiverId::new).collect()
    }

    fn register_get(
        &mut self,
        actor: usize,
        matrix: &Arc<ReceiverMatrix>,
        conditional: bool,
        linkage: &Linkage,
    ) {
        for (channel, r) in matrix.iter() {
            let registration = Registration {
                actor: ActorId::new(actor),
                conditional,
                channels: Arc::clone(matrix),
                channel,
                linkage: linkage.clone(),
            };
            self.receivers[r.index()].register_get(r, registration).unwrap();
        }
        self.gets.insert(actor, (Arc::clone(matrix), conditional));
    }

    fn register_put(
        &mut self,
        actor: usize,
        matrix: &Arc<ReceiverMatrix>,
        conditional: bool,
        linkage: &Linkage,
        payload: impl Fn(usize) -> Payload<T>,
    ) {
        for (channel, r) in matrix.iter() {
            let registration = Registration {
                actor: ActorId::new(actor),
                conditional,
                channels: Arc::clone(matrix),
                channel,
                linkage: linkage.clone(),
            };
            self.receivers[r.index()]
                .register_put(r, registration, payload(channel))
                .unwrap();
        }
        self.puts.insert(actor, Arc::clone(matrix));
    }

    pub fn get(&mut self, actor: usize, matrix: ReceiverMatrix, conditional: bool) {
        self.register_get(actor, &Arc::new(matrix), conditional, &Linkage::Simple);
    }

    pub fn put(&mut self, actor: usize, matrix: ReceiverMatrix, conditional: bool, token: T) {
        self.register_put(actor, &Arc::new(matrix), conditional, &Linkage::Simple, |_| {
            Payload::Token(token.clone())
        });
    }

    /// Merge (`get_conditional`) or barrier composite.
    pub fn composite(
        &mut self,
        actor: usize,
        get: ReceiverMatrix,
        get_conditional: bool,
        put: ReceiverMatrix,
    ) {
        let get = Arc::new(get);
        let put = Arc::new(put);
        let to_put = Linkage::Symmetric {
            partner: Arc::clone(&put),
            conditional: false,
        };
        let to_get = Linkage::Symmetric {
            partner: Arc::clone(&get),
            conditional: get_conditional,
        };
        self.register_get(actor, &get, get_conditional, &to_put);
        self.register_put(actor, &put, false, &to_get, |channel| {
            Payload::Forward((!get_conditional).then_some(channel))
        });
    }

    pub fn check_get(&self, actor: usize) -> Option<Vec<ReceiverId>> {
        let (matrix, conditional) = &self.gets[&actor];
        ReadinessChecker::new(&self.receivers).check(Entry {
            matrix,
            side: Side::Get,
            conditional: *conditional,
        })
    }

    pub fn check_put(&self, actor: usize) -> Option<Vec<ReceiverId>> {
        let matrix = &self.puts[&actor];
        let conditional = matrix
            .iter()
            .next()
            .and_then(|(_, r)| self.receivers[r.index()].registration(Side::Put))
            .is_some_and(|p| p.conditional);
        ReadinessChecker::new(&self.receivers).check(Entry {
            matrix,
            side: Side::Put,
            conditional,
        })
    }
}
