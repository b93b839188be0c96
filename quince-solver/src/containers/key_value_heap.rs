use std::marker::PhantomData;

use super::StorageKey;
use crate::quince_assert_moderate;

/// A max-heap over [`StorageKey`]s `[0, n)` with nonnegative floating point
/// values.
///
/// The heap reports the key with the maximum value and supports incrementing
/// values as well as temporarily removing and later restoring keys, which is
/// how the variable order keeps assigned variables out of consideration
/// without forgetting their activities. Keys are strongly typed; the heap is
/// instantiated with the propositional variable type so that activity
/// bookkeeping never deals in raw indices.
#[derive(Debug, Clone)]
pub struct KeyValueHeap<Key> {
    /// Contains the values stored as a heap; the value of key `k` is in
    /// position `map_key_to_position[k]`.
    values: Vec<f64>,
    /// `map_key_to_position[k]` is the location of the value of key `k` in
    /// the `values` array.
    map_key_to_position: Vec<u32>,
    /// `map_position_to_key[i]` is the key associated with `values[i]`.
    map_position_to_key: Vec<u32>,
    /// The index past the last element in the heap.
    end_position: u32,
    /// [`PhantomData`] to bind the heap to its key type.
    key: PhantomData<Key>,
}

// We explicitly implement Default and not as a derive, because we want to
// avoid imposing Default on the key type.
impl<Key> Default for KeyValueHeap<Key> {
    fn default() -> Self {
        KeyValueHeap {
            values: Vec::default(),
            map_key_to_position: Vec::default(),
            map_position_to_key: Vec::default(),
            end_position: 0,
            key: PhantomData,
        }
    }
}

impl<Key: StorageKey> KeyValueHeap<Key> {
    /// Return the key with maximum value, or `None` if the heap is empty.
    /// The key is not deleted, see [`KeyValueHeap::delete_key`].
    pub fn peek_max(&self) -> Option<Key> {
        if self.is_empty() {
            None
        } else {
            Some(Key::create_from_index(self.map_position_to_key[0] as usize))
        }
    }

    pub fn get_value(&self, key: Key) -> f64 {
        quince_assert_moderate!(key.index() < self.map_key_to_position.len());
        self.values[self.map_key_to_position[key.index()] as usize]
    }

    /// Increments the value of the element of `key` by `increment`.
    ///
    /// The increment may be applied to a key that is not present, in which
    /// case the stored value changes but the heap structure is untouched.
    pub fn increment(&mut self, key: Key, increment: f64) {
        let position = self.map_key_to_position[key.index()];
        self.values[position as usize] += increment;
        if self.is_key_present(&key) {
            self.sift_up(position);
        }
    }

    /// Restores the entry with key `key` to the heap if it is not present,
    /// otherwise does nothing. Its value is the value recorded before
    /// [`KeyValueHeap::delete_key`] was called.
    pub fn restore_key(&mut self, key: Key) {
        if !self.is_key_present(&key) {
            // The key is somewhere in the range [end_position, num_keys).
            // Place it at the end of the heap, grow the heap, and sift up.
            let position = self.map_key_to_position[key.index()];
            quince_assert_moderate!(position >= self.end_position);
            self.swap_positions(position, self.end_position);
            self.end_position += 1;
            self.sift_up(self.end_position - 1);
        }
    }

    /// Removes the entry with key `key` (temporarily) from the heap if it is
    /// present, otherwise does nothing. Its value remains recorded and is
    /// still subject to [`KeyValueHeap::divide_values`].
    pub fn delete_key(&mut self, key: Key) {
        if self.is_key_present(&key) {
            let position = self.map_key_to_position[key.index()];
            self.swap_positions(position, self.end_position - 1);
            self.end_position -= 1;
            if position < self.end_position {
                self.sift_down(position);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end_position == 0
    }

    pub fn is_key_present(&self, key: &Key) -> bool {
        self.map_key_to_position[key.index()] < self.end_position
    }

    /// Increases the size of the heap by one, assigning the initial value to
    /// the fresh key. Keys are handed out densely in index order, matching
    /// the order in which variables are created.
    pub fn grow(&mut self, value: f64) {
        let new_key = self.values.len() as u32;
        self.values.push(value);
        self.map_key_to_position.push(new_key);
        self.map_position_to_key.push(new_key);
        self.swap_positions(self.end_position, new_key);
        self.end_position += 1;
        self.sift_up(self.end_position - 1);
    }

    /// Divides all values in the heap by `divisor`, including the values of
    /// keys that have been removed.
    pub fn divide_values(&mut self, divisor: f64) {
        for value in self.values.iter_mut() {
            *value /= divisor;
        }
    }

    fn swap_positions(&mut self, a: u32, b: u32) {
        let a = a as usize;
        let b = b as usize;

        let key_a = self.map_position_to_key[a] as usize;
        let key_b = self.map_position_to_key[b] as usize;

        self.values.swap(a, b);
        self.map_position_to_key.swap(a, b);
        self.map_key_to_position.swap(key_a, key_b);
    }

    fn sift_up(&mut self, position: u32) {
        if position > 0 {
            let parent_position = Self::get_parent_position(position);
            if self.values[parent_position as usize] < self.values[position as usize] {
                self.swap_positions(parent_position, position);
                self.sift_up(parent_position);
            }
        }
    }

    fn sift_down(&mut self, position: u32) {
        quince_assert_moderate!(position < self.end_position);

        if !self.is_heap_locally(position) {
            let largest_child_position = self.get_largest_child_position(position);
            self.swap_positions(largest_child_position, position);
            self.sift_down(largest_child_position);
        }
    }

    fn is_heap_locally(&self, position: u32) -> bool {
        let left_child_position = Self::get_left_child_position(position);
        let right_child_position = Self::get_right_child_position(position);

        if self.is_leaf(position) {
            return true;
        }

        if self.values[position as usize] < self.values[left_child_position as usize] {
            return false;
        }

        right_child_position >= self.end_position
            || self.values[position as usize] >= self.values[right_child_position as usize]
    }

    fn is_leaf(&self, position: u32) -> bool {
        Self::get_left_child_position(position) >= self.end_position
    }

    fn get_largest_child_position(&self, position: u32) -> u32 {
        quince_assert_moderate!(!self.is_leaf(position));

        let left_child_position = Self::get_left_child_position(position);
        let right_child_position = Self::get_right_child_position(position);

        if right_child_position < self.end_position
            && self.values[right_child_position as usize]
                > self.values[left_child_position as usize]
        {
            right_child_position
        } else {
            left_child_position
        }
    }

    fn get_parent_position(child_position: u32) -> u32 {
        quince_assert_moderate!(child_position > 0, "Root has no parent.");
        (child_position - 1) / 2
    }

    fn get_left_child_position(position: u32) -> u32 {
        2 * position + 1
    }

    fn get_right_child_position(position: u32) -> u32 {
        2 * position + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peeking_an_empty_heap_returns_none() {
        let heap: KeyValueHeap<u32> = KeyValueHeap::default();
        assert_eq!(heap.peek_max(), None);
    }

    #[test]
    fn the_key_with_the_largest_value_is_on_top() {
        let mut heap: KeyValueHeap<u32> = KeyValueHeap::default();
        heap.grow(1.0);
        heap.grow(5.0);
        heap.grow(3.0);

        assert_eq!(heap.peek_max(), Some(1));
    }

    #[test]
    fn incrementing_a_value_moves_the_key_up() {
        let mut heap: KeyValueHeap<u32> = KeyValueHeap::default();
        heap.grow(1.0);
        heap.grow(5.0);
        heap.grow(3.0);

        heap.increment(2, 10.0);
        assert_eq!(heap.peek_max(), Some(2));
        assert_eq!(heap.get_value(2), 13.0);
    }

    #[test]
    fn deleted_keys_are_restored_with_their_previous_value() {
        let mut heap: KeyValueHeap<u32> = KeyValueHeap::default();
        heap.grow(1.0);
        heap.grow(5.0);

        heap.delete_key(1);
        assert!(!heap.is_key_present(&1));
        assert_eq!(heap.peek_max(), Some(0));

        heap.restore_key(1);
        assert!(heap.is_key_present(&1));
        assert_eq!(heap.peek_max(), Some(1));
    }

    #[test]
    fn incrementing_an_absent_key_is_observed_on_restore() {
        let mut heap: KeyValueHeap<u32> = KeyValueHeap::default();
        heap.grow(2.0);
        heap.grow(1.0);

        heap.delete_key(1);
        heap.increment(1, 10.0);
        heap.restore_key(1);

        assert_eq!(heap.peek_max(), Some(1));
    }

    #[test]
    fn dividing_values_rescales_absent_keys_as_well() {
        let mut heap: KeyValueHeap<u32> = KeyValueHeap::default();
        heap.grow(10.0);
        heap.grow(20.0);

        heap.delete_key(1);
        heap.divide_values(10.0);

        assert_eq!(heap.get_value(0), 1.0);
        assert_eq!(heap.get_value(1), 2.0);
    }
}
