//! Property tests over randomly generated sequences of operations against
//! the index vector, symbol interner, and scratch-pool bitset, checked
//! against many generated inputs rather than a handful of hand-written
//! ones.

use quickcheck::Arbitrary;
use quickcheck_macros::quickcheck;

use sonc_util::index_vec::{Idx, IndexVec};
use sonc_util::{define_idx, SymbolInterner};

define_idx!(TestId);

/// Pushing `n` values and reading them back by index always round-trips,
/// and the assigned indices are dense and in push order.
#[quickcheck]
fn index_vec_push_then_index_round_trips(values: Vec<i64>) -> bool {
    let mut v: IndexVec<TestId, i64> = IndexVec::new();
    let ids: Vec<TestId> = values.iter().map(|&x| v.push(x)).collect();
    ids.iter().enumerate().all(|(i, &id)| id.index() == i) && ids.iter().zip(&values).all(|(&id, &x)| v[id] == x)
}

/// Interning the same string twice always returns the same symbol, and
/// interning two distinct strings always returns distinct symbols.
#[quickcheck]
fn interning_is_consistent_with_string_equality(a: String, b: String) -> bool {
    let mut interner = SymbolInterner::new();
    let sym_a1 = interner.intern(&a);
    let sym_a2 = interner.intern(&a);
    let sym_b = interner.intern(&b);
    (sym_a1 == sym_a2) && (a == b || sym_a1 != sym_b) && interner.resolve(sym_a1) == a
}

/// Setting a bit and then reading it back at the same index is always
/// true, regardless of which other indices were set first.
#[derive(Clone, Debug)]
struct BitIndices(Vec<usize>);

impl Arbitrary for BitIndices {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let raw: Vec<usize> = Vec::arbitrary(g);
        BitIndices(raw.into_iter().map(|i| i % 128).collect())
    }
}

#[quickcheck]
fn bitset_set_bits_are_all_readable_afterward(indices: BitIndices) -> bool {
    let mut pool = sonc_util::arena::ScratchPool::new();
    let scratch = pool.acquire(&[]);
    let bitset = pool.bitset(&scratch, 128);
    for &i in &indices.0 {
        pool.bitset_set(&bitset, i);
    }
    indices.0.iter().all(|&i| pool.bitset_get(&bitset, i))
}
