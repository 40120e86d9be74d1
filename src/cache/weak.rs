use std::{
    fmt,
    sync::{Arc, Weak},
};

/// An ordered list of weak references.
///
/// Entries keep their insertion order. Dead entries stay in the list, and count towards
/// [`WeakList::weak_count`], until [`WeakList::compact`] removes them.
pub struct WeakList<T> {
    items: Vec<Weak<T>>,
}

impl<T> WeakList<T> {
    /// Create an empty list
    #[must_use]
    pub fn new() -> Self {
        WeakList { items: Vec::new() }
    }

    /// Append a weak reference to `item`
    pub fn add(&mut self, item: &Arc<T>) {
        self.items.push(Arc::downgrade(item));
    }

    /// Number of entries, dead ones included
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.items.len()
    }

    /// The entry at `index`
    #[must_use]
    pub fn get_weak_reference(&self, index: usize) -> Option<&Weak<T>> {
        self.items.get(index)
    }

    /// Strong references to all live entries, in insertion order
    #[must_use]
    pub fn live(&self) -> Vec<Arc<T>> {
        self.items.iter().filter_map(Weak::upgrade).collect()
    }

    /// The first live entry matching `predicate`
    pub fn find<F>(&self, mut predicate: F) -> Option<Arc<T>>
    where
        F: FnMut(&Arc<T>) -> bool,
    {
        self.items
            .iter()
            .filter_map(Weak::upgrade)
            .find(|item| predicate(item))
    }

    /// Remove dead entries, returning how many were removed
    pub fn compact(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.strong_count() > 0);
        before - self.items.len()
    }

    /// Whether no entry is alive
    #[must_use]
    pub fn is_empty_of_live(&self) -> bool {
        self.items.iter().all(|item| item.strong_count() == 0)
    }
}

impl<T> Default for WeakList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for WeakList<T> {
    fn clone(&self) -> Self {
        WeakList {
            items: self.items.clone(),
        }
    }
}

impl<T> fmt::Debug for WeakList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakList")
            .field("weak_count", &self.items.len())
            .field(
                "live",
                &self.items.iter().filter(|item| item.strong_count() > 0).count(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_and_liveness() {
        let first = Arc::new(1);
        let second = Arc::new(2);
        let third = Arc::new(3);

        let mut list = WeakList::new();
        list.add(&first);
        list.add(&second);
        list.add(&third);

        assert_eq!(list.weak_count(), 3);
        let live: Vec<i32> = list.live().iter().map(|item| **item).collect();
        assert_eq!(live, [1, 2, 3]);

        drop(second);
        assert_eq!(list.weak_count(), 3);
        assert!(list.get_weak_reference(1).unwrap().upgrade().is_none());
        let live: Vec<i32> = list.live().iter().map(|item| **item).collect();
        assert_eq!(live, [1, 3]);

        assert_eq!(list.compact(), 1);
        assert_eq!(list.weak_count(), 2);
        assert!(!list.is_empty_of_live());
    }

    #[test]
    fn find_first_live_match() {
        let a = Arc::new(10);
        let b = Arc::new(20);
        let c = Arc::new(30);

        let mut list = WeakList::new();
        list.add(&a);
        list.add(&b);
        list.add(&c);
        drop(b);

        let found = list.find(|item| **item > 5).unwrap();
        assert!(Arc::ptr_eq(&found, &a));
        let found = list.find(|item| **item > 10).unwrap();
        assert!(Arc::ptr_eq(&found, &c));
        assert!(list.find(|item| **item > 30).is_none());
    }

    #[test]
    fn all_dead() {
        let mut list = WeakList::new();
        list.add(&Arc::new("gone"));

        assert!(list.is_empty_of_live());
        assert_eq!(list.weak_count(), 1);
        assert_eq!(list.compact(), 1);
        assert_eq!(list.weak_count(), 0);
        assert!(list.is_empty_of_live());
    }
}
