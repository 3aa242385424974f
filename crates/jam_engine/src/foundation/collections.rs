//! Specialized collection types

/// Fixed-capacity arena indexed by a small integer id
///
/// Every slot may hold a value and carries an independent active bit. A value
/// survives deactivation so that slots can be reused without reallocating
/// whatever the value refers to (a framebuffer handle, a light record).
/// Indices at or beyond `N` are rejected by every accessor.
#[derive(Debug, Clone)]
pub struct FixedArena<T, const N: usize> {
    items: [Option<T>; N],
    active: u64,
}

impl<T, const N: usize> FixedArena<T, N> {
    const CAPACITY_FITS_MASK: () = assert!(N <= 64, "FixedArena supports at most 64 slots");

    /// Create an empty arena
    pub fn new() -> Self {
        let () = Self::CAPACITY_FITS_MASK;
        Self {
            items: std::array::from_fn(|_| None),
            active: 0,
        }
    }

    /// Number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Store a value in a slot and mark it active
    ///
    /// Returns the previous value if the slot was occupied, or `Err(value)`
    /// when the index is out of range.
    pub fn insert(&mut self, index: usize, value: T) -> Result<Option<T>, T> {
        if index >= N {
            return Err(value);
        }
        self.active |= 1 << index;
        Ok(self.items[index].replace(value))
    }

    /// Get the value stored in a slot, active or not
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)?.as_ref()
    }

    /// Get a mutable reference to the value stored in a slot
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)?.as_mut()
    }

    /// Get the value of a slot only if it is active
    pub fn get_active(&self, index: usize) -> Option<&T> {
        if self.is_active(index) {
            self.get(index)
        } else {
            None
        }
    }

    /// Check whether a slot is active
    pub const fn is_active(&self, index: usize) -> bool {
        index < N && self.active & (1 << index) != 0
    }

    /// Mark an occupied slot active again
    pub fn activate(&mut self, index: usize) -> bool {
        if self.get(index).is_none() {
            return false;
        }
        self.active |= 1 << index;
        true
    }

    /// Clear the active bit of a slot, keeping its value
    ///
    /// Returns whether the slot was active.
    pub fn deactivate(&mut self, index: usize) -> bool {
        let was_active = self.is_active(index);
        if was_active {
            self.active &= !(1 << index);
        }
        was_active
    }

    /// Remove the value of a slot and deactivate it
    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.deactivate(index);
        self.items.get_mut(index)?.take()
    }

    /// Deactivate every slot, keeping their values
    pub fn deactivate_all(&mut self) {
        self.active = 0;
    }

    /// Remove every value and deactivate every slot
    pub fn clear(&mut self) {
        self.active = 0;
        for item in &mut self.items {
            *item = None;
        }
    }

    /// Number of active slots
    pub const fn active_count(&self) -> usize {
        self.active.count_ones() as usize
    }

    /// Indices of the active slots in ascending order
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..N).filter(move |&index| self.is_active(index))
    }

    /// Active slots with their values in ascending index order
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter(move |(index, _)| self.is_active(*index))
            .filter_map(|(index, item)| item.as_ref().map(|value| (index, value)))
    }
}

impl<T, const N: usize> Default for FixedArena<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_deactivate_keeps_value() {
        let mut arena: FixedArena<u32, 16> = FixedArena::new();

        assert_eq!(arena.insert(3, 42), Ok(None));
        assert!(arena.is_active(3));
        assert!(arena.deactivate(3));
        assert!(!arena.is_active(3));
        assert_eq!(arena.get(3), Some(&42));
        assert_eq!(arena.get_active(3), None);
        assert!(arena.activate(3));
        assert_eq!(arena.get_active(3), Some(&42));
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut arena: FixedArena<u32, 16> = FixedArena::new();

        assert_eq!(arena.insert(16, 7), Err(7));
        assert!(!arena.is_active(16));
        assert!(!arena.activate(16));
        assert!(!arena.deactivate(99));
        assert_eq!(arena.get(16), None);
        assert_eq!(arena.active_count(), 0);
    }

    #[test]
    fn test_active_iteration_order() {
        let mut arena: FixedArena<&str, 8> = FixedArena::default();
        arena.insert(5, "five").ok();
        arena.insert(1, "one").ok();
        arena.insert(3, "three").ok();
        arena.deactivate(3);

        assert_eq!(arena.active_indices().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(
            arena.iter_active().map(|(_, v)| *v).collect::<Vec<_>>(),
            vec!["one", "five"]
        );

        arena.clear();
        assert_eq!(arena.get(5), None);
        assert_eq!(arena.capacity(), 8);
    }
}
