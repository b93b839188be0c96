use std::iter::Rev;
use std::ops::Deref;
use std::vec::Drain;

use crate::quince_assert_simple;

/// An append-only sequence partitioned into decision levels.
///
/// Level boundaries are recorded as delimiters; backtracking truncates the
/// sequence to a previous boundary and hands back the removed entries in
/// reverse (LIFO) order so that callers can undo per-entry state.
///
/// The trail additionally carries a synchronisation watermark for a consumer
/// that mirrors it incrementally, which is how the theory side learns about
/// new assignments without rescanning: [`Trail::unsynchronised`] exposes the
/// entries appended since [`Trail::mark_synchronised`] was last called, and
/// backtracking clamps the watermark so that re-grown portions of the trail
/// are presented again while consumed prefixes are not.
#[derive(Clone, Debug)]
pub struct Trail<T> {
    current_decision_level: usize,
    /// At index i is the position where the i-th decision level ends
    /// (exclusive) on the trail.
    trail_delimiter: Vec<usize>,
    trail: Vec<T>,
    /// The position up to which the synchronising consumer has seen the
    /// trail; never beyond the trail length.
    synchronised_until: usize,
}

// We explicitly implement Default and not as a derive, because we want to
// avoid imposing Default on the generic type T.
impl<T> Default for Trail<T> {
    fn default() -> Self {
        Trail {
            current_decision_level: Default::default(),
            trail_delimiter: Default::default(),
            trail: Default::default(),
            synchronised_until: Default::default(),
        }
    }
}

impl<T> Trail<T> {
    pub fn increase_decision_level(&mut self) {
        self.current_decision_level += 1;
        self.trail_delimiter.push(self.trail.len());
    }

    pub fn get_decision_level(&self) -> usize {
        self.current_decision_level
    }

    pub fn values_at_decision_level(&self, decision_level: usize) -> &[T] {
        assert!(decision_level <= self.current_decision_level);

        let start = if decision_level == 0 {
            0
        } else {
            self.trail_delimiter[decision_level - 1]
        };

        let end = if decision_level == self.current_decision_level {
            self.trail.len()
        } else {
            self.trail_delimiter[decision_level]
        };

        &self.trail[start..end]
    }

    /// The entries appended since the watermark was last advanced.
    pub fn unsynchronised(&self) -> &[T] {
        &self.trail[self.synchronised_until..]
    }

    /// Advances the synchronisation watermark to the end of the trail.
    pub fn mark_synchronised(&mut self) {
        self.synchronised_until = self.trail.len();
    }

    /// Truncates the trail to the given decision level, draining the removed
    /// entries in reverse order. The synchronisation watermark is clamped to
    /// the remaining length, so entries assigned again after the backtrack
    /// are presented to the consumer once more.
    pub fn synchronise(&mut self, new_decision_level: usize) -> Rev<Drain<'_, T>> {
        quince_assert_simple!(new_decision_level < self.current_decision_level);

        let new_trail_len = self.trail_delimiter[new_decision_level];

        self.current_decision_level = new_decision_level;
        self.trail_delimiter.truncate(new_decision_level);
        self.synchronised_until = self.synchronised_until.min(new_trail_len);
        self.trail.drain(new_trail_len..).rev()
    }

    pub fn push(&mut self, elem: T) {
        self.trail.push(elem)
    }
}

impl<T> Deref for Trail<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.trail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushed_values_are_observed_through_indexing() {
        let mut trail = Trail::default();

        let expected = [1, 2, 3, 4];
        for &elem in expected.iter() {
            trail.push(elem);
        }

        assert_eq!(&expected, trail.deref());
    }

    #[test]
    fn backtracking_removes_elements_beyond_the_level() {
        let mut trail = Trail::default();

        trail.increase_decision_level();
        trail.push(1);
        let _ = trail.synchronise(0);

        assert!(trail.is_empty());
    }

    #[test]
    fn backtracking_is_nonchronological() {
        let mut trail = Trail::default();
        trail.push(1);

        trail.increase_decision_level();
        trail.push(2);
        trail.increase_decision_level();
        trail.push(3);
        trail.increase_decision_level();
        trail.push(4);

        let _ = trail.synchronise(1);

        assert_eq!(&[1, 2], trail.deref());
    }

    #[test]
    fn popped_elements_are_given_in_reverse_order_when_backtracking() {
        let mut trail = Trail::default();
        trail.push(1);

        trail.increase_decision_level();
        trail.push(2);
        trail.increase_decision_level();
        trail.push(3);
        trail.increase_decision_level();
        trail.push(4);

        let popped = trail.synchronise(0).collect::<Vec<_>>();
        assert_eq!(vec![4, 3, 2], popped);
    }

    #[test]
    fn elements_at_current_decision_level() {
        let mut trail = Trail::default();
        trail.push(1);
        trail.push(2);

        trail.increase_decision_level();
        trail.push(3);
        trail.increase_decision_level();
        trail.push(4);
        trail.push(5);

        assert_eq!(&[1, 2], trail.values_at_decision_level(0));
        assert_eq!(&[3], trail.values_at_decision_level(1));
        assert_eq!(&[4, 5], trail.values_at_decision_level(2));
    }

    #[test]
    fn the_watermark_exposes_only_unconsumed_entries() {
        let mut trail = Trail::default();
        trail.push(1);
        trail.push(2);
        assert_eq!(trail.unsynchronised(), &[1, 2]);

        trail.mark_synchronised();
        assert!(trail.unsynchronised().is_empty());

        trail.push(3);
        assert_eq!(trail.unsynchronised(), &[3]);
    }

    #[test]
    fn backtracking_clamps_the_watermark() {
        let mut trail = Trail::default();
        trail.push(1);

        trail.increase_decision_level();
        trail.push(2);
        trail.push(3);
        trail.mark_synchronised();

        let _ = trail.synchronise(0);
        assert!(trail.unsynchronised().is_empty());

        // Entries assigned after the backtrack are presented again even
        // though the positions they occupy had been consumed before.
        trail.increase_decision_level();
        trail.push(4);
        assert_eq!(trail.unsynchronised(), &[4]);
    }
}
