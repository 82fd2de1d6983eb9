//! Append-only arena with stable indices and reverse-order teardown.

/// Owns a sequence of values addressed by the index they were inserted at.
///
/// Values are never removed individually, so an index stays valid for the
/// arena's whole life. Clearing or dropping the arena drops values newest
/// first.
#[derive(Debug)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Stores `value` and returns its index.
    pub fn insert(&mut self, value: T) -> usize {
        self.items.push(value);
        self.items.len() - 1
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops every value, newest first.
    pub fn clear(&mut self) {
        while self.items.pop().is_some() {}
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Arena<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        id: u32,
        log: Rc<RefCell<Vec<u32>>>,
    }

    impl Drop for Recorder {
        fn drop(&mut self) {
            self.log.borrow_mut().push(self.id);
        }
    }

    fn filled(log: &Rc<RefCell<Vec<u32>>>, count: u32) -> Arena<Recorder> {
        let mut arena = Arena::new();
        for id in 0..count {
            arena.insert(Recorder {
                id,
                log: log.clone(),
            });
        }
        arena
    }

    #[test]
    fn test_insert_returns_stable_indices() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.get(2), None);
    }

    #[test]
    fn test_drop_is_reverse_creation_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        drop(filled(&log, 4));

        assert_eq!(*log.borrow(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_clear_is_reverse_creation_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut arena = filled(&log, 3);

        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(*log.borrow(), vec![2, 1, 0]);

        drop(arena);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_iter_mut_visits_in_insertion_order() {
        let mut arena = Arena::new();
        for value in [1, 2, 3] {
            arena.insert(value);
        }
        for value in arena.iter_mut() {
            *value *= 10;
        }

        assert_eq!(arena.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(arena.len(), 3);
    }
}
