use crate::block::BlockId;

/// A slot's membership record in a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry {
    /// Index into the cache's slot array.
    pub(crate) slot: usize,
    /// `None` until the slot is first used.
    pub(crate) block: Option<BlockId>,
    /// Active holders plus pins.
    pub(crate) refcnt: u32,
}

impl Entry {
    pub(crate) const fn unused(slot: usize) -> Self {
        Self {
            slot,
            block: None,
            refcnt: 0,
        }
    }
}

/// Fixed-capacity chain of slot entries, ordered head to tail by the time
/// they were last released (head is the coldest).
pub(crate) struct Bucket<const N: usize> {
    entries: [Entry; N],
    len: usize,
}

impl<const N: usize> Bucket<N> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: [Entry::unused(0); N],
            len: 0,
        }
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries[..self.len]
    }

    pub(crate) fn get_mut(&mut self, pos: usize) -> &mut Entry {
        &mut self.entries[..self.len][pos]
    }

    /// Position of the entry caching `block`.
    pub(crate) fn find(&self, block: BlockId) -> Option<usize> {
        self.entries().iter().position(|e| e.block == Some(block))
    }

    /// Position of the first idle entry, scanning from the head.
    pub(crate) fn first_free(&self) -> Option<usize> {
        self.entries().iter().position(|e| e.refcnt == 0)
    }

    pub(crate) fn position_of_slot(&self, slot: usize) -> Option<usize> {
        self.entries().iter().position(|e| e.slot == slot)
    }

    /// Unlink the entry at `pos`, keeping the order of the others.
    pub(crate) fn remove(&mut self, pos: usize) -> Entry {
        let entry = self.entries()[pos];
        self.entries.copy_within(pos + 1..self.len, pos);
        self.len -= 1;
        entry
    }

    pub(crate) fn push_back(&mut self, entry: Entry) {
        // Every bucket can hold the whole pool.
        assert!(self.len < N, "bcache: bucket overflow");
        self.entries[self.len] = entry;
        self.len += 1;
    }

    pub(crate) fn move_to_back(&mut self, pos: usize) {
        let entry = self.remove(pos);
        self.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_with(slots: &[usize]) -> Bucket<8> {
        let mut b = Bucket::new();
        for &s in slots {
            b.push_back(Entry::unused(s));
        }
        b
    }

    fn order(b: &Bucket<8>) -> Vec<usize> {
        b.entries().iter().map(|e| e.slot).collect()
    }

    #[test]
    fn remove_keeps_order() {
        let mut b = bucket_with(&[3, 1, 4, 5]);
        let e = b.remove(1);
        assert_eq!(e.slot, 1);
        assert_eq!(order(&b), [3, 4, 5]);
    }

    #[test]
    fn move_to_back_makes_entry_hottest() {
        let mut b = bucket_with(&[0, 1, 2]);
        b.move_to_back(0);
        assert_eq!(order(&b), [1, 2, 0]);
    }

    #[test]
    fn first_free_scans_from_head() {
        let mut b = bucket_with(&[7, 8, 9]);
        b.get_mut(0).refcnt = 1;
        assert_eq!(b.first_free(), Some(1));
        b.get_mut(1).refcnt = 2;
        b.get_mut(2).refcnt = 1;
        assert_eq!(b.first_free(), None);
    }

    #[test]
    fn find_matches_identity_not_slot() {
        let mut b = bucket_with(&[0, 1]);
        let block = BlockId::new(1, 42);
        b.get_mut(1).block = Some(block);
        assert_eq!(b.find(block), Some(1));
        assert_eq!(b.find(BlockId::new(2, 42)), None);
        assert_eq!(b.position_of_slot(0), Some(0));
    }

    #[test]
    #[should_panic(expected = "bucket overflow")]
    fn push_beyond_capacity_panics() {
        let mut b = Bucket::<1>::new();
        b.push_back(Entry::unused(0));
        b.push_back(Entry::unused(1));
    }
}
