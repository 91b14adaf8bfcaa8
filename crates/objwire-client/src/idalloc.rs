//! Dense object-id allocation.
//!
//! Ids stay compact: allocation always returns the smallest id not currently
//! reserved, so released ids are reused before the range grows.

/// Allocates object ids for one session, starting at a fixed base.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    base: u64,
    /// Currently reserved ids, kept sorted.
    reserved: Vec<u64>,
}

impl IdAllocator {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            reserved: Vec::new(),
        }
    }

    /// Reserve and return the smallest free id at or above the base.
    ///
    /// Fills the first gap in the reserved list; with no gap the list is
    /// extended by one.
    pub fn allocate(&mut self) -> u64 {
        let mut candidate = self.base;
        for (index, &id) in self.reserved.iter().enumerate() {
            if id > candidate {
                self.reserved.insert(index, candidate);
                return candidate;
            }
            candidate = id + 1;
        }
        self.reserved.push(candidate);
        candidate
    }

    /// Reserve a specific id. Returns false when it is already taken.
    pub fn reserve(&mut self, id: u64) -> bool {
        match self.reserved.binary_search(&id) {
            Ok(_) => false,
            Err(index) => {
                self.reserved.insert(index, id);
                true
            }
        }
    }

    /// Release a reserved id, making it reusable by a later allocation.
    pub fn release(&mut self, id: u64) {
        if let Ok(index) = self.reserved.binary_search(&id) {
            self.reserved.remove(index);
        }
    }

    /// Release every reserved id.
    pub fn release_all(&mut self) {
        self.reserved.clear();
    }

    /// Number of ids currently reserved.
    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_from_the_base_upwards() {
        let mut ids = IdAllocator::new(1);
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 2);
        assert_eq!(ids.allocate(), 3);
    }

    #[test]
    fn fills_gaps_instead_of_growing() {
        let mut ids = IdAllocator::new(1);
        let a = ids.allocate();
        let b = ids.allocate();
        let c = ids.allocate();
        assert_eq!((a, b, c), (1, 2, 3));

        ids.release(b);
        assert_eq!(ids.allocate(), 2, "gap must be reused, not skipped");
        assert_eq!(ids.allocate(), 4);
    }

    #[test]
    fn releasing_the_lowest_id_reopens_the_base() {
        let mut ids = IdAllocator::new(100);
        assert_eq!(ids.allocate(), 100);
        assert_eq!(ids.allocate(), 101);
        ids.release(100);
        assert_eq!(ids.allocate(), 100);
    }

    #[test]
    fn reserving_an_explicit_id_steers_allocation_around_it() {
        let mut ids = IdAllocator::new(1);
        assert!(ids.reserve(2));
        assert!(!ids.reserve(2), "double reservation must fail");
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 3);
    }

    #[test]
    fn release_of_unknown_id_is_a_no_op() {
        let mut ids = IdAllocator::new(1);
        ids.allocate();
        ids.release(999);
        assert_eq!(ids.reserved_count(), 1);
    }

    #[test]
    fn release_all_resets_to_the_base() {
        let mut ids = IdAllocator::new(1);
        ids.allocate();
        ids.allocate();
        ids.release_all();
        assert_eq!(ids.allocate(), 1);
    }
}
