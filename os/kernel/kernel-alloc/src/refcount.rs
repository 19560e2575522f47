/// Per-page reference counts, indexed by page number within the managed range.
///
/// The storage is carved out of the managed physical range itself, so the
/// table borrows it for the allocator's whole life.
pub(crate) struct RefcountTable {
    counts: &'static mut [u32],
}

impl RefcountTable {
    pub(crate) const fn new(counts: &'static mut [u32]) -> Self {
        Self { counts }
    }

    pub(crate) fn fill(&mut self, value: u32) {
        self.counts.fill(value);
    }

    pub(crate) const fn get(&self, index: usize) -> u32 {
        self.counts[index]
    }

    pub(crate) fn set(&mut self, index: usize, value: u32) {
        self.counts[index] = value;
    }

    /// Add one and return the new count.
    pub(crate) fn increment(&mut self, index: usize) -> u32 {
        self.counts[index] += 1;
        self.counts[index]
    }

    /// Subtract one and return the new count. `None` if already zero.
    pub(crate) fn decrement(&mut self, index: usize) -> Option<u32> {
        match self.counts[index].checked_sub(1) {
            Some(n) => {
                self.counts[index] = n;
                Some(n)
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(len: usize) -> RefcountTable {
        RefcountTable::new(Vec::leak(vec![0; len]))
    }

    #[test]
    fn decrement_stops_at_zero() {
        let mut t = table(2);
        t.set(1, 1);
        assert_eq!(t.decrement(1), Some(0));
        assert_eq!(t.decrement(1), None);
        assert_eq!(t.get(1), 0);
    }

    #[test]
    fn increment_returns_new_count() {
        let mut t = table(1);
        t.fill(1);
        assert_eq!(t.increment(0), 2);
        assert_eq!(t.increment(0), 3);
    }
}
