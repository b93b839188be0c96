//! Containers with strongly typed indices used throughout the solver.

mod key_value_heap;
mod keyed_vec;

pub use key_value_heap::KeyValueHeap;
pub use keyed_vec::KeyedVec;
pub use keyed_vec::StorageKey;
