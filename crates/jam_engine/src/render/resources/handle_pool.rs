//! Growable pools of raw GPU names

use crate::render::backend::{RawHandle, ResourceKind};

/// Ordered batches of live names of one resource kind
///
/// Every `create_*` call appends one batch. Batches are only dropped as a
/// whole by [`HandlePool::take_all`] or trimmed by [`HandlePool::remove`].
#[derive(Debug, Clone)]
pub struct HandlePool {
    kind: ResourceKind,
    batches: Vec<Vec<RawHandle>>,
    count: usize,
}

impl HandlePool {
    /// Create an empty pool for a kind
    pub const fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            batches: Vec::new(),
            count: 0,
        }
    }

    /// Resource kind stored in the pool
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Number of live names across all batches
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Whether the pool holds no names
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of batches
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Append a batch and return it
    pub fn push_batch(&mut self, batch: Vec<RawHandle>) -> &[RawHandle] {
        let index = self.batches.len();
        self.count += batch.len();
        self.batches.push(batch);
        &self.batches[index]
    }

    /// Whether a name belongs to the pool
    pub fn contains(&self, handle: RawHandle) -> bool {
        self.iter().any(|h| h == handle)
    }

    /// All names in creation order
    pub fn iter(&self) -> impl Iterator<Item = RawHandle> + '_ {
        self.batches.iter().flatten().copied()
    }

    /// Remove specific names, returning the ones that were present
    pub fn remove(&mut self, handles: &[RawHandle]) -> Vec<RawHandle> {
        let mut removed = Vec::new();
        for batch in &mut self.batches {
            batch.retain(|handle| {
                if handles.contains(handle) {
                    removed.push(*handle);
                    false
                } else {
                    true
                }
            });
        }
        self.batches.retain(|batch| !batch.is_empty());
        self.count -= removed.len();
        removed
    }

    /// Empty the pool, returning every name it held
    pub fn take_all(&mut self) -> Vec<RawHandle> {
        self.count = 0;
        std::mem::take(&mut self.batches).into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_and_count() {
        let mut pool = HandlePool::new(ResourceKind::Texture);
        assert_eq!(pool.push_batch(vec![1, 2, 3]), &[1, 2, 3]);
        pool.push_batch(vec![4]);

        assert_eq!(pool.len(), 4);
        assert_eq!(pool.batch_count(), 2);
        assert!(pool.contains(4));
        assert_eq!(pool.kind(), ResourceKind::Texture);
    }

    #[test]
    fn test_remove_drops_empty_batches() {
        let mut pool = HandlePool::new(ResourceKind::FrameBuffer);
        pool.push_batch(vec![1, 2]);
        pool.push_batch(vec![3]);

        assert_eq!(pool.remove(&[3, 2, 99]), vec![2, 3]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.batch_count(), 1);

        assert_eq!(pool.take_all(), vec![1]);
        assert!(pool.is_empty());
        assert_eq!(pool.batch_count(), 0);
    }
}
