use wzl::{constants::SPRITE_HEADER_LENGTH, ArchiveIndex};

/// Which slots are done, which failed, and where the next read goes.
pub(super) struct Schedule {
    index: ArchiveIndex,
    loaded: Vec<bool>,
    failed: Vec<bool>,
    remaining: usize,
    // every slot below is loaded
    cursor: usize,
}

impl Schedule {
    pub fn new(index: ArchiveIndex) -> Self {
        let slot_count = index.slot_count();

        Self {
            index,
            loaded: vec![false; slot_count],
            failed: vec![false; slot_count],
            remaining: slot_count,
            cursor: 0,
        }
    }

    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    pub fn slot_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    pub fn is_loaded(&self, slot: usize) -> bool {
        self.loaded.get(slot).copied().unwrap_or(false)
    }

    /// In range and not loaded yet.
    pub fn wants(&self, slot: usize) -> bool {
        slot < self.slot_count() && !self.loaded[slot]
    }

    /// Returns false if the slot was already loaded.
    pub fn mark_loaded(&mut self, slot: usize) -> bool {
        if !self.wants(slot) {
            return false;
        }

        self.loaded[slot] = true;
        self.failed[slot] = false;
        self.remaining -= 1;

        true
    }

    pub fn mark_failed(&mut self, slot: usize) {
        if self.wants(slot) {
            self.failed[slot] = true;
        }
    }

    pub fn has_failed(&self, slot: usize) -> bool {
        self.failed.get(slot).copied().unwrap_or(false)
    }

    /// Lowest unloaded slot, skipping failed ones unless nothing else is left.
    pub fn next_sequential(&mut self) -> Option<usize> {
        while self.cursor < self.slot_count() && self.loaded[self.cursor] {
            self.cursor += 1;
        }

        if self.cursor == self.slot_count() {
            return None;
        }

        (self.cursor..self.slot_count())
            .find(|&slot| !self.loaded[slot] && !self.failed[slot])
            .or(Some(self.cursor))
    }

    /// Byte range to read for `slot`: from its offset, at least `chunk_size`
    /// and one sprite header long, always reaching the next non-empty slot.
    /// Capped by `data_length` unless that is 0.
    ///
    /// `None` for empty slots and offsets past the end of data.
    pub fn window(&self, slot: usize, chunk_size: u64, data_length: u64) -> Option<(u64, u64)> {
        let start = self.index.offset(slot).filter(|&offset| offset != 0)? as u64;

        let span = self
            .index
            .next_non_empty_offset(slot)
            .map(|next| next as u64)
            .filter(|&next| next > start)
            .map(|next| next - start)
            .unwrap_or(0);

        let mut len = chunk_size.max(span).max(SPRITE_HEADER_LENGTH as u64);

        if data_length != 0 {
            if start >= data_length {
                return None;
            }

            len = len.min(data_length - start);
        }

        Some((start, len))
    }
}
