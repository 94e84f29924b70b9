//! Named eviction strategy — a tagged choice rather than a virtual dispatch
//! table (spec.md §9 "Polymorphism via callbacks": variants are a tagged
//! choice, matching the teacher's own preference for enums over trait
//! objects in `dbs::Write`/`dbs::Wr`).

/// Which entry a cache evicts first once it is over a configured cap
/// (spec.md §4.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Evictor {
    /// Oldest by insertion order.
    Fifo,
    /// Oldest by last successful `get`.
    Lru,
    /// Uniform over the current set.
    Random,
}
