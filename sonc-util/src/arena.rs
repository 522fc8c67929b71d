//! Bump-allocated scratch regions and a bitset helper.
//!
//! A fixed pool of two arenas, acquired in a stack discipline with a
//! conflict set so that no pass ever needs more than two simultaneous
//! scratch lifetimes. Rather than carving raw bytes out of a `malloc`'d
//! region (as sb.c does), each arena here is a bump-allocated `Vec<u32>`
//! word pool; a [`Bitset`] is simply a range of words within one arena,
//! so `acquire` marks the high-water mark and `release` truncates back
//! to it.

const SCRATCH_ARENA_COUNT: usize = 2;

#[derive(Default)]
struct WordArena {
    words: Vec<u32>,
}

impl WordArena {
    fn with_capacity(word_count: usize) -> Self {
        WordArena {
            words: Vec::with_capacity(word_count),
        }
    }

    fn mark(&self) -> usize {
        self.words.len()
    }

    fn truncate(&mut self, mark: usize) {
        self.words.truncate(mark);
    }

    fn alloc_zeroed(&mut self, word_count: usize) -> usize {
        let offset = self.words.len();
        self.words.resize(offset + word_count, 0);
        offset
    }
}

/// A pool of fixed-size scratch arenas, borrowed with a conflict set.
pub struct ScratchPool {
    arenas: [WordArena; SCRATCH_ARENA_COUNT],
}

impl Default for ScratchPool {
    fn default() -> Self {
        ScratchPool {
            arenas: Default::default(),
        }
    }
}

/// A handle to a borrowed arena slot; `release` rewinds to the mark
/// captured at `acquire` time. Acquires must nest strictly.
pub struct Scratch {
    slot: usize,
    mark: usize,
}

impl Scratch {
    /// The arena slot this scratch occupies, usable as a conflict entry for
    /// a nested `acquire`.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-reserves `bytes_per_arena` worth of words in each arena up front,
    /// so a caller who knows roughly how large its graphs run (the driver's
    /// `--arena-size`) can avoid the `Vec` growth path entirely.
    pub fn with_capacity(bytes_per_arena: usize) -> Self {
        let words = bytes_per_arena.div_ceil(4);
        ScratchPool {
            arenas: std::array::from_fn(|_| WordArena::with_capacity(words)),
        }
    }

    /// Returns an arena not listed in `conflicts`. Panics if every arena
    /// conflicts: no pass in this compiler ever needs more than two
    /// simultaneous scratches.
    pub fn acquire(&self, conflicts: &[usize]) -> Scratch {
        for slot in 0..SCRATCH_ARENA_COUNT {
            if !conflicts.contains(&slot) {
                return Scratch {
                    slot,
                    mark: self.arenas[slot].mark(),
                };
            }
        }
        panic!("no available scratch arenas");
    }

    pub fn release(&mut self, scratch: Scratch) {
        self.arenas[scratch.slot].truncate(scratch.mark);
    }

    /// Allocates a fresh, zeroed [`Bitset`] of `bit_count` bits out of
    /// `scratch`'s arena.
    pub fn bitset(&mut self, scratch: &Scratch, bit_count: usize) -> Bitset {
        let word_count = bit_count.div_ceil(32);
        let offset = self.arenas[scratch.slot].alloc_zeroed(word_count);
        Bitset {
            slot: scratch.slot,
            offset,
            bit_count,
            word_count,
        }
    }

    fn words_mut(&mut self, bitset: &Bitset) -> &mut [u32] {
        &mut self.arenas[bitset.slot].words[bitset.offset..bitset.offset + bitset.word_count]
    }

    fn words(&self, bitset: &Bitset) -> &[u32] {
        &self.arenas[bitset.slot].words[bitset.offset..bitset.offset + bitset.word_count]
    }

    pub fn bitset_set(&mut self, bitset: &Bitset, index: usize) {
        debug_assert!(index < bitset.bit_count);
        self.words_mut(bitset)[index / 32] |= 1 << (index % 32);
    }

    pub fn bitset_unset(&mut self, bitset: &Bitset, index: usize) {
        debug_assert!(index < bitset.bit_count);
        self.words_mut(bitset)[index / 32] &= !(1 << (index % 32));
    }

    pub fn bitset_get(&self, bitset: &Bitset, index: usize) -> bool {
        debug_assert!(index < bitset.bit_count);
        (self.words(bitset)[index / 32] >> (index % 32)) & 1 != 0
    }

    pub fn bitset_clear(&mut self, bitset: &Bitset) {
        for w in self.words_mut(bitset) {
            *w = 0;
        }
    }
}

/// A fixed-size bit vector living inside a [`ScratchPool`] arena.
#[derive(Clone, Copy)]
pub struct Bitset {
    slot: usize,
    offset: usize,
    bit_count: usize,
    word_count: usize,
}

impl Bitset {
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }
}
