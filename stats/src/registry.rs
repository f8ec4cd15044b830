use std::sync::Arc;

use crate::queue::StatQueue;

/// Queues ordered by configured weight, highest first after `sort`.
#[derive(Debug, Default)]
pub struct StatQueues {
    queues: Vec<Arc<StatQueue>>,
}

impl StatQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, queue: Arc<StatQueue>) {
        self.queues.push(queue);
    }

    /// Stable sort, descending weight.
    pub fn sort(&mut self) {
        self.queues
            .sort_by(|a, b| b.config().weight.total_cmp(&a.config().weight));
    }

    /// Removes the queue with `queue_id`, keeping the order of the rest.
    pub fn remove_by_id(&mut self, queue_id: &str) -> Option<Arc<StatQueue>> {
        let idx = self.queues.iter().position(|q| q.id() == queue_id)?;
        Some(self.queues.remove(idx))
    }

    pub fn get(&self, queue_id: &str) -> Option<Arc<StatQueue>> {
        self.queues.iter().find(|q| q.id() == queue_id).cloned()
    }

    pub fn contains(&self, queue_id: &str) -> bool {
        self.queues.iter().any(|q| q.id() == queue_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.queues.iter().map(|q| q.id().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<StatQueue>> {
        self.queues.iter()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
