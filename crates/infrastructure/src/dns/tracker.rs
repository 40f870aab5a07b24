use super::query::{LookupId, Protocol, Query};
use ferrous_resolv_domain::{DomainError, Question};
use rustc_hash::FxHashMap;
use tracing::debug;

const RANDOM_PROBES: usize = 32;
const ID_SPACE: usize = u16::MAX as usize + 1;

/// In-flight queries keyed by message id.
pub struct QueryTracker {
    pending: FxHashMap<u16, Query>,
    rng: fastrand::Rng,
}

impl Default for QueryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTracker {
    pub fn new() -> Self {
        Self {
            pending: FxHashMap::default(),
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            pending: FxHashMap::default(),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Assigns an unused random id and takes ownership of the query.
    pub fn register(&mut self, mut query: Query) -> Result<u16, DomainError> {
        let id = self.allocate_id().ok_or(DomainError::ResourceExhausted)?;
        query.set_id(id);
        debug!(id, question = %query.question, "Query registered");
        self.pending.insert(id, query);
        Ok(id)
    }

    fn allocate_id(&mut self) -> Option<u16> {
        if self.pending.len() >= ID_SPACE {
            return None;
        }

        for _ in 0..RANDOM_PROBES {
            let id = self.rng.u16(..);
            if !self.pending.contains_key(&id) {
                return Some(id);
            }
        }

        let start = self.rng.u16(..);
        (0..=u16::MAX)
            .map(|offset| start.wrapping_add(offset))
            .find(|id| !self.pending.contains_key(id))
    }

    /// The pending query for `id`, provided it asked `question`.
    pub fn match_response(&mut self, id: u16, question: &Question) -> Option<&mut Query> {
        let query = self.pending.get_mut(&id)?;
        if query.question.matches(question) {
            Some(query)
        } else {
            debug!(id, expected = %query.question, got = %question, "Question mismatch");
            None
        }
    }

    pub fn get(&self, id: u16) -> Option<&Query> {
        self.pending.get(&id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut Query> {
        self.pending.get_mut(&id)
    }

    pub fn remove(&mut self, id: u16) -> Option<Query> {
        self.pending.remove(&id)
    }

    pub fn ids_for_lookup(&self, lookup: LookupId) -> Vec<u16> {
        self.pending
            .values()
            .filter(|q| q.lookup == lookup)
            .map(|q| q.id)
            .collect()
    }

    /// Queries currently waiting on `server` over `protocol`.
    pub fn ids_on(&self, server: usize, protocol: Protocol) -> Vec<u16> {
        let mut ids: Vec<u16> = self
            .pending
            .values()
            .filter(|q| q.server() == Some(server) && q.protocol == protocol)
            .map(|q| q.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn uses(&self, server: usize, protocol: Protocol) -> bool {
        self.pending
            .values()
            .any(|q| q.server() == Some(server) && q.protocol == protocol)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
